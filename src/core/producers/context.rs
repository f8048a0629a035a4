use std::sync::Arc;

use super::declaration::DependencyDeclaration;
use crate::core::access::AccessTransformers;
use crate::core::cache::{CacheEntry, CacheStore};
use crate::core::config::RepoConfig;
use crate::core::downloader::{sha1_hex, DownloadCache};
use crate::core::error::{RepoError, RepoResult};
use crate::core::mapping::MappingResolver;
use crate::core::session::DiscoveredFacts;

/// Inputs that decide which coordinate a declaration is synthesized as.
/// Everything that changes a derived artifact's bytes must be reflected here.
#[derive(Clone, Copy)]
pub struct ClaimScope<'a> {
    pub config: &'a RepoConfig,
    /// Primary game declaration of the session, once known.
    pub primary: Option<&'a DependencyDeclaration>,
    /// Fingerprint of the configured access transformers.
    pub access: Option<&'a str>,
}

impl<'a> ClaimScope<'a> {
    pub fn new(config: &'a RepoConfig) -> Self {
        Self {
            config,
            primary: None,
            access: None,
        }
    }

    pub fn with_primary(self, primary: &'a DependencyDeclaration) -> Self {
        Self {
            primary: Some(primary),
            ..self
        }
    }

    pub fn with_access(self, fingerprint: Option<&'a str>) -> Self {
        Self {
            access: fingerprint,
            ..self
        }
    }

    /// `<version>[_mapped_<mappings>][_at_<fingerprint>]`
    pub fn primary_version(&self, version: &str) -> String {
        let mapped = self.config.mapped_version(version);
        match self.access {
            Some(fingerprint) => format!("{}_at_{}", mapped, fingerprint),
            None => mapped,
        }
    }

    /// Version of a remapped mod. With a mapping override that override is
    /// the whole key; otherwise the mappings come from the primary, so the
    /// primary's version and a hash of its notation are folded in.
    pub fn mod_version(&self, version: &str) -> Option<String> {
        if self.config.mappings.is_some() {
            return Some(self.config.mapped_version(version));
        }
        let primary = self.primary?;
        let digest = sha1_hex(primary.notation().as_bytes());
        Some(format!("{}_mapped_{}-{}", version, primary.version, &digest[..8]))
    }
}

/// Everything a producer may touch while materializing a claim.
/// Borrowed from the session for the duration of one expansion or serve.
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    pub config: &'a RepoConfig,
    pub store: &'a CacheStore,
    pub downloads: &'a DownloadCache,
    pub mappings: &'a MappingResolver,
    pub access: &'a Arc<AccessTransformers>,
    /// Facts reported by the primary claim; `None` while it is still running.
    pub facts: Option<&'a DiscoveredFacts>,
}

impl<'a> PipelineContext<'a> {
    pub fn require_facts(&self) -> RepoResult<&'a DiscoveredFacts> {
        self.facts.ok_or(RepoError::MissingFact("MCP_VERSION"))
    }
}

/// What materializing one claim produced.
#[derive(Debug, Clone, Default)]
pub struct ProduceOutcome {
    pub entries: Vec<CacheEntry>,
    /// Set only by producers that discover build facts.
    pub facts: Option<DiscoveredFacts>,
}
