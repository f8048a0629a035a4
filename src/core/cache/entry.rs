use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::maven::ArtifactCoordinate;

/// Record persisted next to every published artifact as `<file>.entry.json`.
///
/// A readable record whose size and checksum match the artifact file is what
/// makes an artifact "present" in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub coordinate: ArtifactCoordinate,
    pub path: PathBuf,
    #[serde(default)]
    pub sha1: Option<String>,
    pub size: u64,
    pub produced_at: DateTime<Utc>,
}
