use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{RepoError, RepoResult};
use crate::core::http::DEFAULT_USER_AGENT;
use crate::core::maven::{FORGE_MAVEN, MAVEN_CENTRAL, MOJANG_LIBRARIES};

const APP_DIR_NAME: &str = "userdev";

/// Explicit configuration for one resolution session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepoConfig {
    /// Root of the artifact store and the download cache.
    pub cache_dir: PathBuf,
    /// Ordered repository base URLs for upstream artifacts.
    pub repositories: Vec<String>,
    /// Mapping version override (e.g. `snapshot_20180814`). When set it is
    /// also appended to synthesized versions as `_mapped_<mappings>`.
    pub mappings: Option<String>,
    /// Access transformer files applied to the primary game jar, in order.
    /// Their content is folded into the primary's version as `_at_<hash>`.
    pub access_transformers: Vec<PathBuf>,
    pub userdev_classifier: String,
    pub userdev_extension: String,
    /// Maximum number of claims materialized in parallel.
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            repositories: vec![
                FORGE_MAVEN.to_string(),
                MOJANG_LIBRARIES.to_string(),
                MAVEN_CENTRAL.to_string(),
            ],
            mappings: None,
            access_transformers: Vec::new(),
            userdev_classifier: "userdev".to_string(),
            userdev_extension: "jar".to_string(),
            concurrency: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RepoConfig {
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.cache_dir.join("artifacts")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.cache_dir.join("downloads")
    }

    /// Synthesized version for an upstream version under these settings.
    pub fn mapped_version(&self, version: &str) -> String {
        match &self.mappings {
            Some(mappings) => format!("{}_mapped_{}", version, mappings),
            None => version.to_string(),
        }
    }

    pub fn load(path: &Path) -> RepoResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| RepoError::io(path, e))?;
        let config: RepoConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> RepoResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RepoError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| RepoError::io(path, e))
    }

    pub fn validate(&self) -> RepoResult<()> {
        if self.concurrency == 0 {
            return Err(RepoError::Other("concurrency must be at least 1".to_string()));
        }
        for (label, value) in [
            ("userdev_classifier", &self.userdev_classifier),
            ("userdev_extension", &self.userdev_extension),
        ] {
            if value.is_empty() || value.contains([':', '@', '/', '\\']) {
                return Err(RepoError::Other(format!("invalid {}: {:?}", label, value)));
            }
        }
        if let Some(mappings) = &self.mappings {
            if mappings.is_empty() || mappings.contains([':', '@', '/', '\\']) {
                return Err(RepoError::Other(format!("invalid mappings: {:?}", mappings)));
            }
        }
        Ok(())
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("userdev.json");
        std::fs::write(
            &path,
            r#"{ "mappings": "snapshot_20180814", "concurrency": 2, "access_transformers": ["a_at.cfg"] }"#,
        )
        .unwrap();

        let config = RepoConfig::load(&path).unwrap();
        assert_eq!(config.mappings.as_deref(), Some("snapshot_20180814"));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.access_transformers, vec![PathBuf::from("a_at.cfg")]);
        assert_eq!(config.userdev_classifier, "userdev");
        assert_eq!(config.repositories.len(), 3);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("userdev.json");
        let config = RepoConfig::with_cache_dir(dir.path().join("cache"));

        config.save(&path).unwrap();
        assert_eq!(RepoConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("userdev.json");
        std::fs::write(&path, r#"{ "concurrency": 0 }"#).unwrap();
        assert!(RepoConfig::load(&path).is_err());
        assert_eq!(RepoConfig::load_or_default(&path).concurrency, 4);
    }

    #[test]
    fn mapped_version_suffix() {
        let mut config = RepoConfig::with_cache_dir("/tmp/x");
        assert_eq!(config.mapped_version("1.0"), "1.0");
        config.mappings = Some("stable_39".to_string());
        assert_eq!(config.mapped_version("1.0"), "1.0_mapped_stable_39");
    }
}
