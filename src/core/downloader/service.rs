use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::core::error::RepoResult;
use crate::core::maven::ArtifactCoordinate;

/// Where an upstream input comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchSource {
    Url(String),
    Artifact(ArtifactCoordinate),
}

impl fmt::Display for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchSource::Url(url) => write!(f, "{}", url),
            FetchSource::Artifact(coordinate) => write!(f, "{}", coordinate),
        }
    }
}

/// Retrieves upstream files. Implementations write the complete file to
/// `dest` or fail with [`RepoError::DownloadFailed`](crate::RepoError::DownloadFailed).
#[async_trait]
pub trait DownloadService: Send + Sync {
    async fn fetch(&self, source: &FetchSource, dest: &Path) -> RepoResult<()>;
}
