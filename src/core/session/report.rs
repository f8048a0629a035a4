use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use super::facts::DiscoveredFacts;
use crate::core::cache::CacheEntry;
use crate::core::error::{RepoError, RepoResult};
use crate::core::maven::ArtifactCoordinate;
use crate::core::producers::DependencyDeclaration;

/// One declaration and the synthesized coordinate the build should use instead.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Rewrite {
    pub declaration: DependencyDeclaration,
    pub coordinate: ArtifactCoordinate,
}

/// Outcome of a successful expansion.
#[derive(Debug, Clone, Serialize)]
pub struct ExpansionReport {
    pub session_id: Uuid,
    pub rewrites: Vec<Rewrite>,
    /// Every published closure member, sorted by coordinate.
    pub synthesized: Vec<CacheEntry>,
    pub facts: DiscoveredFacts,
}

impl ExpansionReport {
    pub fn synthesized_coordinates(&self) -> Vec<&ArtifactCoordinate> {
        self.synthesized.iter().map(|e| &e.coordinate).collect()
    }

    pub fn rewrite_for(&self, declaration: &DependencyDeclaration) -> Option<&ArtifactCoordinate> {
        self.rewrites
            .iter()
            .find(|r| &r.declaration == declaration)
            .map(|r| &r.coordinate)
    }

    /// Dump the report as pretty JSON.
    pub fn write_manifest(&self, path: &Path) -> RepoResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RepoError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| RepoError::io(path, e))
    }
}
