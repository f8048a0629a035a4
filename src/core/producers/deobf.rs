use async_trait::async_trait;
use tracing::info;

use super::chain::{ArtifactProducer, Claim};
use super::context::{ClaimScope, PipelineContext, ProduceOutcome};
use super::declaration::{DeclarationKind, DependencyDeclaration};
use super::pipeline;
use crate::core::downloader::FetchSource;
use crate::core::error::RepoResult;
use crate::core::maven::ArtifactCoordinate;

pub const DEOBF_GROUP_PREFIX: &str = "deobf.";

/// Mods built against obfuscated names, remapped with the mappings the
/// primary claim discovered. Published under `deobf.<group>` so they never
/// shadow the original artifact, with a version that names the mappings
/// (or the primary they come from).
pub struct DeobfProducer;

#[async_trait]
impl ArtifactProducer for DeobfProducer {
    fn name(&self) -> &'static str {
        "deobf"
    }

    fn claim(
        &self,
        declaration: &DependencyDeclaration,
        scope: &ClaimScope<'_>,
    ) -> Option<ArtifactCoordinate> {
        if declaration.kind != DeclarationKind::Mod {
            return None;
        }
        let version = scope.mod_version(&declaration.version)?;
        Some(
            declaration
                .coordinate()
                .with_group(&format!("{}{}", DEOBF_GROUP_PREFIX, declaration.group))
                .with_version(&version),
        )
    }

    fn closure(&self, synthesized: &ArtifactCoordinate) -> Vec<ArtifactCoordinate> {
        vec![synthesized.clone(), synthesized.with_extension("pom")]
    }

    async fn produce(&self, claim: &Claim, ctx: &PipelineContext<'_>) -> RepoResult<ProduceOutcome> {
        let facts = ctx.require_facts()?;
        let upstream = FetchSource::Artifact(claim.declaration.coordinate());
        let jar = &claim.coordinate;
        info!("Deriving {} from {}", jar, upstream);

        let remapped = ctx
            .store
            .publish(jar, |staging| {
                pipeline::derive_archive(
                    ctx,
                    &upstream,
                    &facts.mappings_version,
                    jar,
                    staging,
                    |archive, mapping, target| {
                        pipeline::remap(pipeline::strip_signatures(archive), mapping, target)
                    },
                )
            })
            .await?;
        let pom = ctx
            .store
            .publish(&jar.with_extension("pom"), |staging| {
                pipeline::derive_descriptor(jar, Vec::new(), staging)
            })
            .await?;

        Ok(ProduceOutcome {
            entries: vec![remapped, pom],
            facts: None,
        })
    }
}
