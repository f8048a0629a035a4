pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::access::AccessTransformers;
pub use crate::core::cache::{CacheEntry, CacheStore};
pub use crate::core::config::RepoConfig;
pub use crate::core::downloader::{DownloadService, FetchSource};
pub use crate::core::error::{RepoError, RepoResult};
pub use crate::core::mapping::{Mapping, MappingService, SrgDirectoryMappings, StaticMappings};
pub use crate::core::maven::ArtifactCoordinate;
pub use crate::core::producers::{DeclarationKind, DependencyDeclaration, ProducerChain};
pub use crate::core::session::{
    BuildProperties, DiscoveredFacts, ExpansionReport, ResolutionSession, Services, SessionPhase,
};

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `info,userdev=debug`. Does nothing if a subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,userdev=debug")),
        )
        .try_init();
}
