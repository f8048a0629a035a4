use async_trait::async_trait;
use tracing::info;

use super::chain::{ArtifactProducer, Claim};
use super::context::{ClaimScope, PipelineContext, ProduceOutcome};
use super::declaration::{DeclarationKind, DependencyDeclaration};
use super::pipeline::{self, is_class};
use crate::core::downloader::FetchSource;
use crate::core::error::RepoResult;
use crate::core::maven::ArtifactCoordinate;
use crate::core::session::DiscoveredFacts;

pub const VANILLA_GROUP: &str = "net.minecraft";
const EXTRA_CLASSIFIER: &str = "extra";
const SOURCES_CLASSIFIER: &str = "sources";

/// Plain game jars (`net.minecraft:<side>:<version>`): classes are remapped,
/// non-class resources are split into the `extra` artifact. Vanilla jars ship
/// no sources, so `sources` is an empty jar.
pub struct VanillaProducer;

#[async_trait]
impl ArtifactProducer for VanillaProducer {
    fn name(&self) -> &'static str {
        "vanilla"
    }

    fn claim(
        &self,
        declaration: &DependencyDeclaration,
        scope: &ClaimScope<'_>,
    ) -> Option<ArtifactCoordinate> {
        (declaration.kind == DeclarationKind::Primary && declaration.group == VANILLA_GROUP).then(
            || {
                declaration
                    .coordinate()
                    .with_version(&scope.primary_version(&declaration.version))
            },
        )
    }

    fn closure(&self, synthesized: &ArtifactCoordinate) -> Vec<ArtifactCoordinate> {
        vec![
            synthesized.clone(),
            synthesized.with_classifier(EXTRA_CLASSIFIER),
            synthesized.with_classifier(SOURCES_CLASSIFIER),
            synthesized.with_extension("pom"),
        ]
    }

    async fn produce(&self, claim: &Claim, ctx: &PipelineContext<'_>) -> RepoResult<ProduceOutcome> {
        let decl = &claim.declaration;
        let facts = DiscoveredFacts {
            minecraft_version: decl.version.clone(),
            mappings_version: ctx
                .config
                .mappings
                .clone()
                .unwrap_or_else(|| decl.version.clone()),
        };
        info!("Deriving {} from {}", claim.coordinate, decl.notation());

        let upstream = FetchSource::Artifact(decl.coordinate());
        let jar = &claim.coordinate;
        let extra = jar.with_classifier(EXTRA_CLASSIFIER);
        let sources = jar.with_classifier(SOURCES_CLASSIFIER);
        let mappings = facts.mappings_version.as_str();
        let access = ctx.access.clone();

        let mut entries = Vec::with_capacity(4);
        entries.push(
            ctx.store
                .publish(jar, |staging| {
                    pipeline::derive_archive(ctx, &upstream, mappings, jar, staging, move |archive, mapping, target| {
                        let (classes, _) = pipeline::strip_signatures(archive).partition(is_class);
                        let remapped = pipeline::remap(classes, mapping, target)?;
                        pipeline::apply_access(remapped, &access, target)
                    })
                })
                .await?,
        );
        entries.push(
            ctx.store
                .publish(&extra, |staging| {
                    pipeline::derive_archive(ctx, &upstream, mappings, &extra, staging, |archive, _, _| {
                        let (_, resources) = pipeline::strip_signatures(archive).partition(is_class);
                        Ok(resources)
                    })
                })
                .await?,
        );
        entries.push(
            ctx.store
                .publish(&sources, |staging| pipeline::derive_empty_jar(&sources, staging))
                .await?,
        );
        entries.push(
            ctx.store
                .publish(&jar.with_extension("pom"), |staging| {
                    pipeline::derive_descriptor(jar, Vec::new(), staging)
                })
                .await?,
        );

        Ok(ProduceOutcome {
            entries,
            facts: Some(facts),
        })
    }
}
