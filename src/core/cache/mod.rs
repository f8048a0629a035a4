mod entry;
mod locks;
mod store;

pub use entry::CacheEntry;
pub use locks::KeyedLocks;
pub use store::CacheStore;
