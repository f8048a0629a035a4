//! In-memory fakes and archive builders shared by the unit tests.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::core::downloader::{DownloadService, FetchSource};
use crate::core::error::{RepoError, RepoResult};
use crate::core::maven::ArtifactCoordinate;

/// Zip bytes holding `entries` in the given order.
pub fn jar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// `(name, data)` of every file entry, in archive order.
pub fn read_jar(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut zip = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            (file.name().to_string(), data)
        })
        .collect()
}

/// Minimal class file for `name` with one `int` field and one method that
/// carries a single opaque attribute.
pub fn class_file(name: &str, class_flags: u16, field: (&str, u16), method: (&str, &str, u16)) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 52]);

    // #1..#5 UTF-8, #6 Class(#1)
    let utf8 = [name, field.0, "I", method.0, method.1];
    out.extend_from_slice(&(utf8.len() as u16 + 2).to_be_bytes());
    for s in utf8 {
        out.push(1);
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }
    out.extend_from_slice(&[7, 0, 1]);

    out.extend_from_slice(&class_flags.to_be_bytes());
    out.extend_from_slice(&[0, 6, 0, 0, 0, 0]);

    out.extend_from_slice(&[0, 1]);
    out.extend_from_slice(&field.1.to_be_bytes());
    out.extend_from_slice(&[0, 2, 0, 3, 0, 0]);

    out.extend_from_slice(&[0, 1]);
    out.extend_from_slice(&method.2.to_be_bytes());
    out.extend_from_slice(&[0, 4, 0, 5, 0, 1, 0, 1, 0, 0, 0, 4, 1, 2, 3, 4]);

    out.extend_from_slice(&[0, 0]);
    out
}

/// Userdev archive with `config.json`, `binary.jar` and optionally
/// `sources.jar` (referenced from the config only when the JSON says so).
pub fn userdev_archive(
    config_json: &str,
    binary: &[(&str, &[u8])],
    sources: Option<&[(&str, &[u8])]>,
) -> Vec<u8> {
    let binary = jar(binary);
    let mut entries: Vec<(&str, Vec<u8>)> = vec![("binary.jar", binary)];

    let config = match sources {
        Some(sources) => {
            entries.push(("sources.jar", jar(sources)));
            let mut value: serde_json::Value = serde_json::from_str(config_json).unwrap();
            value["sources"] = "sources.jar".into();
            value.to_string()
        }
        None => config_json.to_string(),
    };
    entries.push(("config.json", config.into_bytes()));

    let borrowed: Vec<(&str, &[u8])> = entries.iter().map(|(n, d)| (*n, d.as_slice())).collect();
    jar(&borrowed)
}

/// [`DownloadService`] serving fixed bytes keyed by source.
#[derive(Default)]
pub struct FakeDownloads {
    files: HashMap<FetchSource, Vec<u8>>,
    calls: AtomicUsize,
    sealed: AtomicBool,
}

impl FakeDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(mut self, coordinate: &ArtifactCoordinate, data: Vec<u8>) -> Self {
        self.files
            .insert(FetchSource::Artifact(coordinate.clone()), data);
        self
    }

    pub fn with_url(mut self, url: &str, data: Vec<u8>) -> Self {
        self.files.insert(FetchSource::Url(url.to_string()), data);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Any fetch after this panics.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DownloadService for FakeDownloads {
    async fn fetch(&self, source: &FetchSource, dest: &Path) -> RepoResult<()> {
        assert!(!self.sealed.load(Ordering::SeqCst), "unexpected fetch of {}", source);
        self.calls.fetch_add(1, Ordering::SeqCst);

        let data = self.files.get(source).ok_or_else(|| RepoError::DownloadFailed {
            target: source.to_string(),
            reason: "HTTP 404".to_string(),
        })?;
        tokio::fs::write(dest, data)
            .await
            .map_err(|e| RepoError::io(dest, e))
    }
}
