use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::artifact::ArtifactCoordinate;
use crate::core::downloader::{DownloadService, Downloader, FetchSource};
use crate::core::error::{RepoError, RepoResult};

/// [`DownloadService`] over HTTP: URLs are fetched directly, coordinates are
/// looked up in each repository in order until one serves them.
pub struct MavenDownloadService {
    /// Ordered list of repository base URLs to search.
    pub repositories: Vec<String>,
    downloader: Downloader,
}

impl MavenDownloadService {
    pub fn new(repositories: Vec<String>, downloader: Downloader) -> Self {
        Self {
            repositories,
            downloader,
        }
    }

    /// Try each repository until a successful download occurs.
    async fn try_download(&self, artifact: &ArtifactCoordinate, dest: &Path) -> RepoResult<()> {
        let mut last_err: Option<RepoError> = None;

        for repo in &self.repositories {
            let url = artifact.url(repo);
            let checksum = self.published_sha1(&url).await;
            match self
                .downloader
                .download_file(&url, dest, checksum.as_deref())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("Repository {} failed for {}: {}", repo, artifact, e);
                    last_err = Some(e);
                }
            }
        }

        Err(RepoError::DownloadFailed {
            target: artifact.to_string(),
            reason: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no repositories configured".to_string()),
        })
    }

    /// The repository's `.sha1` companion, when it publishes one.
    async fn published_sha1(&self, url: &str) -> Option<String> {
        match self.downloader.fetch_text(&format!("{}.sha1", url)).await {
            Ok(Some(text)) => text
                .split_whitespace()
                .next()
                .filter(|h| h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()))
                .map(str::to_ascii_lowercase),
            Ok(None) => None,
            Err(e) => {
                warn!("Checksum lookup failed for {}: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl DownloadService for MavenDownloadService {
    async fn fetch(&self, source: &FetchSource, dest: &Path) -> RepoResult<()> {
        match source {
            FetchSource::Url(url) => self.downloader.download_file(url, dest, None).await,
            FetchSource::Artifact(artifact) => self.try_download(artifact, dest).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_repositories_is_a_download_failure() {
        let service = MavenDownloadService::new(Vec::new(), Downloader::new("test").unwrap());
        let dir = tempfile::tempdir().unwrap();
        let artifact = ArtifactCoordinate::parse("com.example:game:1.0").unwrap();

        let err = service
            .fetch(&FetchSource::Artifact(artifact), &dir.path().join("game.jar"))
            .await
            .unwrap_err();
        match err {
            RepoError::DownloadFailed { target, reason } => {
                assert_eq!(target, "com.example:game:1.0@jar");
                assert!(reason.contains("no repositories"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
