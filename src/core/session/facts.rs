use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{RepoError, RepoResult};

pub const MC_VERSION: &str = "MC_VERSION";
pub const MCP_VERSION: &str = "MCP_VERSION";

/// Build facts learned while deriving the primary artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFacts {
    pub minecraft_version: String,
    pub mappings_version: String,
}

impl DiscoveredFacts {
    pub fn publish_to(&self, sink: &BuildProperties) -> RepoResult<()> {
        sink.set(MC_VERSION, &self.minecraft_version)?;
        sink.set(MCP_VERSION, &self.mappings_version)
    }
}

/// Write-once string properties visible to the surrounding build.
///
/// Re-setting a key to the value it already holds is a no-op; any other
/// value is a [`RepoError::PropertyConflict`].
#[derive(Debug, Default)]
pub struct BuildProperties {
    values: RwLock<BTreeMap<String, String>>,
}

impl BuildProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        let mut values = self
            .values
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match values.get(key) {
            Some(existing) if existing == value => Ok(()),
            Some(existing) => Err(RepoError::PropertyConflict {
                key: key.to_string(),
                existing: existing.clone(),
                attempted: value.to_string(),
            }),
            None => {
                debug!("{} = {}", key, value);
                values.insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_are_write_once() {
        let props = BuildProperties::new();
        props.set(MC_VERSION, "1.12.2").unwrap();
        props.set(MC_VERSION, "1.12.2").unwrap();

        let err = props.set(MC_VERSION, "1.13").unwrap_err();
        assert!(matches!(err, RepoError::PropertyConflict { .. }));
        assert_eq!(props.get(MC_VERSION).as_deref(), Some("1.12.2"));
        assert_eq!(props.get(MCP_VERSION), None);
    }

    #[test]
    fn facts_publish_both_keys() {
        let props = BuildProperties::new();
        let facts = DiscoveredFacts {
            minecraft_version: "1.12.2".to_string(),
            mappings_version: "snapshot_20180814".to_string(),
        };
        facts.publish_to(&props).unwrap();

        let snapshot = props.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[MCP_VERSION], "snapshot_20180814");
    }
}
