use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::chain::{ArtifactProducer, Claim};
use super::context::{ClaimScope, PipelineContext, ProduceOutcome};
use super::declaration::{DeclarationKind, DependencyDeclaration};
use super::pipeline::{self, Archive};
use crate::core::access::AccessTransformers;
use crate::core::config::RepoConfig;
use crate::core::downloader::FetchSource;
use crate::core::error::{RepoError, RepoResult};
use crate::core::maven::ArtifactCoordinate;
use crate::core::session::DiscoveredFacts;

const CONFIG_ENTRY: &str = "config.json";
const SOURCES_CLASSIFIER: &str = "sources";

fn default_binary() -> String {
    "binary.jar".to_string()
}

/// `config.json` at the root of a userdev archive.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDevProfile {
    pub mc_version: String,
    #[serde(default)]
    pub mcp_version: Option<String>,
    /// Entry holding the patched game jar.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Entry holding the matching sources jar, if shipped.
    #[serde(default)]
    pub sources: Option<String>,
    /// Maven notations of the runtime libraries.
    #[serde(default)]
    pub libraries: Vec<String>,
}

impl UserDevProfile {
    pub fn read(archive: &Path, coordinate: &str) -> RepoResult<Self> {
        let raw = pipeline::read_entry(archive, CONFIG_ENTRY, coordinate)?;
        let profile: UserDevProfile =
            serde_json::from_slice(&raw).map_err(|e| RepoError::ExtractionFailed {
                coordinate: coordinate.to_string(),
                reason: format!("{}: {}", CONFIG_ENTRY, e),
            })?;

        if profile.mc_version.trim().is_empty() || profile.mc_version.contains([':', '/', '\\']) {
            return Err(RepoError::ExtractionFailed {
                coordinate: coordinate.to_string(),
                reason: format!("{} has an invalid mcVersion {:?}", CONFIG_ENTRY, profile.mc_version),
            });
        }
        Ok(profile)
    }

    pub fn facts(&self, config: &RepoConfig) -> DiscoveredFacts {
        let mappings_version = config
            .mappings
            .clone()
            .or_else(|| self.mcp_version.clone())
            .unwrap_or_else(|| self.mc_version.clone());
        DiscoveredFacts {
            minecraft_version: self.mc_version.clone(),
            mappings_version,
        }
    }

    pub fn library_coordinates(&self, coordinate: &str) -> RepoResult<Vec<ArtifactCoordinate>> {
        self.libraries
            .iter()
            .map(|lib| {
                ArtifactCoordinate::parse(lib).map_err(|e| RepoError::ExtractionFailed {
                    coordinate: coordinate.to_string(),
                    reason: format!("library {:?}: {}", lib, e),
                })
            })
            .collect()
    }
}

/// Game artifacts published as a userdev archive (config, patched binary,
/// sources), e.g. `net.minecraftforge:forge`.
pub struct UserDevProducer;

impl UserDevProducer {
    pub fn upstream(declaration: &DependencyDeclaration, config: &RepoConfig) -> ArtifactCoordinate {
        declaration
            .coordinate()
            .with_classifier(&config.userdev_classifier)
            .with_extension(&config.userdev_extension)
    }
}

#[async_trait]
impl ArtifactProducer for UserDevProducer {
    fn name(&self) -> &'static str {
        "userdev"
    }

    fn claim(
        &self,
        declaration: &DependencyDeclaration,
        scope: &ClaimScope<'_>,
    ) -> Option<ArtifactCoordinate> {
        (declaration.kind == DeclarationKind::Primary).then(|| {
            declaration
                .coordinate()
                .with_version(&scope.primary_version(&declaration.version))
        })
    }

    fn closure(&self, synthesized: &ArtifactCoordinate) -> Vec<ArtifactCoordinate> {
        vec![
            synthesized.clone(),
            synthesized.with_classifier(SOURCES_CLASSIFIER),
            synthesized.with_extension("pom"),
        ]
    }

    async fn produce(&self, claim: &Claim, ctx: &PipelineContext<'_>) -> RepoResult<ProduceOutcome> {
        let upstream = FetchSource::Artifact(Self::upstream(&claim.declaration, ctx.config));
        let target = claim.coordinate.to_string();
        let raw = ctx.downloads.fetch(&upstream).await?;

        // Facts are read even on a warm cache.
        let profile = {
            let (raw, target) = (raw.clone(), target.clone());
            pipeline::blocking(move || UserDevProfile::read(&raw, &target)).await?
        };
        let facts = profile.facts(ctx.config);
        let libraries = profile.library_coordinates(&target)?;
        debug!(
            "{}: minecraft {}, mappings {}, {} libraries",
            upstream,
            facts.minecraft_version,
            facts.mappings_version,
            libraries.len()
        );
        info!("Deriving {} from {}", claim.coordinate, upstream);

        let jar = &claim.coordinate;
        let sources = jar.with_classifier(SOURCES_CLASSIFIER);
        let mappings = facts.mappings_version.as_str();

        let mut entries = Vec::with_capacity(3);
        entries.push(
            ctx.store
                .publish(jar, |staging| {
                    let embedded = Embedded {
                        raw: raw.clone(),
                        entry: Some(profile.binary.clone()),
                        access: Some(ctx.access.clone()),
                    };
                    derive_embedded(ctx, embedded, mappings, jar, staging)
                })
                .await?,
        );
        entries.push(
            ctx.store
                .publish(&sources, |staging| {
                    let embedded = Embedded {
                        raw: raw.clone(),
                        entry: profile.sources.clone(),
                        access: None,
                    };
                    derive_embedded(ctx, embedded, mappings, &sources, staging)
                })
                .await?,
        );
        entries.push(
            ctx.store
                .publish(&jar.with_extension("pom"), |staging| {
                    pipeline::derive_descriptor(jar, libraries, staging)
                })
                .await?,
        );

        Ok(ProduceOutcome {
            entries,
            facts: Some(facts),
        })
    }
}

/// A jar nested inside the userdev archive at `raw`.
struct Embedded {
    raw: PathBuf,
    /// `None` yields an empty jar.
    entry: Option<String>,
    /// Applied after remapping when set.
    access: Option<Arc<AccessTransformers>>,
}

async fn derive_embedded(
    ctx: &PipelineContext<'_>,
    embedded: Embedded,
    mapping_version: &str,
    coordinate: &ArtifactCoordinate,
    staging: PathBuf,
) -> RepoResult<PathBuf> {
    let target = coordinate.to_string();
    let mapping = ctx.mappings.resolve(mapping_version, &target).await?;
    let dest = staging.join(coordinate.filename());

    let Embedded { raw, entry, access } = embedded;

    pipeline::blocking(move || {
        let archive = match entry {
            Some(name) => {
                let nested = pipeline::read_entry(&raw, &name, &target)?;
                pipeline::read_archive_bytes(nested, &target)?
            }
            None => Archive::new(),
        };
        let mut remapped = pipeline::remap(pipeline::strip_signatures(archive), &mapping, &target)?;
        if let Some(access) = access {
            remapped = pipeline::apply_access(remapped, &access, &target)?;
        }
        pipeline::repackage(&remapped, &dest, &target)?;
        Ok(dest)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::jar;

    #[test]
    fn profile_defaults_and_facts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("userdev.jar");
        std::fs::write(
            &path,
            jar(&[(
                CONFIG_ENTRY,
                br#"{ "mcVersion": "1.12.2", "mcpVersion": "20180814", "libraries": ["org.ow2.asm:asm:6.2"] }"#,
            )]),
        )
        .unwrap();

        let profile = UserDevProfile::read(&path, "c").unwrap();
        assert_eq!(profile.binary, "binary.jar");
        assert_eq!(profile.sources, None);

        let mut config = RepoConfig::with_cache_dir("/nonexistent");
        let facts = profile.facts(&config);
        assert_eq!(facts.minecraft_version, "1.12.2");
        assert_eq!(facts.mappings_version, "20180814");

        config.mappings = Some("stable_39".to_string());
        assert_eq!(profile.facts(&config).mappings_version, "stable_39");

        let libs = profile.library_coordinates("c").unwrap();
        assert_eq!(libs[0].to_string(), "org.ow2.asm:asm:6.2@jar");
    }

    #[test]
    fn broken_profiles_are_extraction_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("userdev.jar");

        std::fs::write(&path, jar(&[("binary.jar", b"")])).unwrap();
        let err = UserDevProfile::read(&path, "c").unwrap_err();
        assert!(matches!(err, RepoError::ExtractionFailed { .. }));

        std::fs::write(&path, jar(&[(CONFIG_ENTRY, br#"{ "mcVersion": "" }"#)])).unwrap();
        assert!(UserDevProfile::read(&path, "c").is_err());
    }

    #[test]
    fn upstream_uses_configured_classifier() {
        let decl = DependencyDeclaration::primary("net.minecraftforge:forge:1.12.2-14.23.5").unwrap();
        let mut config = RepoConfig::with_cache_dir("/nonexistent");
        assert_eq!(
            UserDevProducer::upstream(&decl, &config).to_string(),
            "net.minecraftforge:forge:1.12.2-14.23.5:userdev@jar"
        );

        config.userdev_classifier = "userdev3".to_string();
        config.userdev_extension = "zip".to_string();
        assert_eq!(
            UserDevProducer::upstream(&decl, &config).to_string(),
            "net.minecraftforge:forge:1.12.2-14.23.5:userdev3@zip"
        );
    }
}
