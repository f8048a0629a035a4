mod table;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::core::cache::KeyedLocks;
use crate::core::error::{RepoError, RepoResult};

pub use table::Mapping;

/// Source of remapping tables, keyed by an opaque version token.
#[async_trait]
pub trait MappingService: Send + Sync {
    async fn lookup(&self, version: &str) -> RepoResult<Mapping>;
}

/// Fixed in-memory tables.
#[derive(Debug, Default, Clone)]
pub struct StaticMappings {
    tables: HashMap<String, Mapping>,
}

impl StaticMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, version: impl Into<String>, mapping: Mapping) -> Self {
        self.tables.insert(version.into(), mapping);
        self
    }
}

#[async_trait]
impl MappingService for StaticMappings {
    async fn lookup(&self, version: &str) -> RepoResult<Mapping> {
        self.tables
            .get(version)
            .cloned()
            .ok_or_else(|| RepoError::MappingUnavailable {
                version: version.to_string(),
                reason: "no table registered".to_string(),
            })
    }
}

/// Reads `<dir>/<version>.srg` or `<dir>/<version>.tsrg`.
#[derive(Debug, Clone)]
pub struct SrgDirectoryMappings {
    dir: PathBuf,
}

impl SrgDirectoryMappings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl MappingService for SrgDirectoryMappings {
    async fn lookup(&self, version: &str) -> RepoResult<Mapping> {
        let unavailable = |reason: String| RepoError::MappingUnavailable {
            version: version.to_string(),
            reason,
        };

        if version.contains(['/', '\\']) || version.starts_with('.') {
            return Err(unavailable("invalid version token".to_string()));
        }

        for ext in ["srg", "tsrg"] {
            let path = self.dir.join(format!("{}.{}", version, ext));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => return Mapping::parse_srg(&text).map_err(unavailable),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(RepoError::io(path, e)),
            }
        }

        Err(unavailable(format!("no mapping file in {:?}", self.dir)))
    }
}

/// Per-session memo in front of a [`MappingService`]; each version is looked
/// up once and shared by every producer. Lookups of different versions run
/// concurrently.
pub struct MappingResolver {
    service: Arc<dyn MappingService>,
    memo: Mutex<HashMap<String, Arc<Mapping>>>,
    locks: KeyedLocks<String>,
}

impl MappingResolver {
    pub fn new(service: Arc<dyn MappingService>) -> Self {
        Self {
            service,
            memo: Mutex::new(HashMap::new()),
            locks: KeyedLocks::new(),
        }
    }

    /// Table for `version`; failures are reported against `coordinate`.
    pub async fn resolve(&self, version: &str, coordinate: &str) -> RepoResult<Arc<Mapping>> {
        if let Some(mapping) = self.memoized(version) {
            return Ok(mapping);
        }

        let _guard = self.locks.lock(&version.to_string()).await;
        if let Some(mapping) = self.memoized(version) {
            return Ok(mapping);
        }

        let mapping = self
            .service
            .lookup(version)
            .await
            .map(Arc::new)
            .map_err(|e| RepoError::RemapFailed {
                coordinate: coordinate.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Loaded {} class mappings for {}", mapping.len(), version);
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(version.to_string(), mapping.clone());
        Ok(mapping)
    }

    fn memoized(&self, version: &str) -> Option<Arc<Mapping>> {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(version)
            .cloned()
    }
}
