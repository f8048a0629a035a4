use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::service::{DownloadService, FetchSource};
use crate::core::cache::KeyedLocks;
use crate::core::error::{RepoError, RepoResult};

const STAGING_DIR: &str = ".staging";

/// Shared cache of raw upstream files, distinct from the artifact store.
///
/// Keyed by [`FetchSource`]: Maven coordinates keep their repository layout
/// under `maven/`, plain URLs live under `url/<sha256 prefix>/`. Files are
/// renamed into place only once complete, so existence means complete.
pub struct DownloadCache {
    root: PathBuf,
    staging: PathBuf,
    locks: KeyedLocks<FetchSource>,
    service: Arc<dyn DownloadService>,
}

impl DownloadCache {
    pub fn new(root: impl Into<PathBuf>, service: Arc<dyn DownloadService>) -> Self {
        let root = root.into();
        Self {
            staging: root.join(STAGING_DIR),
            root,
            locks: KeyedLocks::new(),
            service,
        }
    }

    pub fn path_for(&self, source: &FetchSource) -> PathBuf {
        match source {
            FetchSource::Artifact(coordinate) => self.root.join("maven").join(coordinate.local_path()),
            FetchSource::Url(url) => {
                let digest = hex::encode(Sha256::digest(url.as_bytes()));
                self.root
                    .join("url")
                    .join(&digest[..16])
                    .join(url_file_name(url))
            }
        }
    }

    /// Local copy of `source`, downloading it on first use.
    pub async fn fetch(&self, source: &FetchSource) -> RepoResult<PathBuf> {
        let target = self.path_for(source);
        if is_file(&target).await {
            debug!("Download cache hit: {}", source);
            return Ok(target);
        }

        let _guard = self.locks.lock(source).await;
        if is_file(&target).await {
            return Ok(target);
        }

        tokio::fs::create_dir_all(&self.staging)
            .await
            .map_err(|e| RepoError::io(&self.staging, e))?;
        let staging = tempfile::Builder::new()
            .prefix("fetch-")
            .tempdir_in(&self.staging)
            .map_err(|e| RepoError::io(&self.staging, e))?;
        let file_name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "download".into());
        let dest = staging.path().join(file_name);

        self.service
            .fetch(source, &dest)
            .await
            .map_err(|e| as_download_failure(source, e))?;

        if !is_file(&dest).await {
            return Err(RepoError::DownloadFailed {
                target: source.to_string(),
                reason: "download service produced no file".to_string(),
            });
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RepoError::io(parent, e))?;
        }
        tokio::fs::rename(&dest, &target)
            .await
            .map_err(|e| RepoError::io(&target, e))?;

        Ok(target)
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn url_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let candidate = without_query.rsplit('/').next().unwrap_or_default();
    let safe = !candidate.is_empty()
        && candidate != "."
        && candidate != ".."
        && !candidate.contains(['\\', ':']);
    if safe {
        candidate.to_string()
    } else {
        "download".to_string()
    }
}

fn as_download_failure(source: &FetchSource, err: RepoError) -> RepoError {
    match err {
        e @ RepoError::DownloadFailed { .. } => e,
        other => RepoError::DownloadFailed {
            target: source.to_string(),
            reason: other.to_string(),
        },
    }
}
