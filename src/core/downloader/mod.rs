mod cache;
mod client;
mod service;

pub use cache::DownloadCache;
pub use client::{sha1_hex, Downloader};
pub use service::{DownloadService, FetchSource};
