use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use super::context::{ClaimScope, PipelineContext, ProduceOutcome};
use super::declaration::{DeclarationKind, DependencyDeclaration};
use super::{deobf::DeobfProducer, userdev::UserDevProducer, vanilla::VanillaProducer};
use crate::core::error::{RepoError, RepoResult};
use crate::core::maven::ArtifactCoordinate;

#[async_trait]
pub trait ArtifactProducer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Synthesized coordinate when this producer handles `declaration`.
    /// Pure: no I/O.
    fn claim(&self, declaration: &DependencyDeclaration, scope: &ClaimScope<'_>)
        -> Option<ArtifactCoordinate>;

    /// Every coordinate materialized together with `synthesized`, itself first.
    fn closure(&self, synthesized: &ArtifactCoordinate) -> Vec<ArtifactCoordinate>;

    /// Publish every closure member into the store.
    async fn produce(&self, claim: &Claim, ctx: &PipelineContext<'_>) -> RepoResult<ProduceOutcome>;
}

/// Dispatcher sin Box<dyn>
pub enum Producer {
    Vanilla(VanillaProducer),
    UserDev(UserDevProducer),
    Deobf(DeobfProducer),
}

impl Producer {
    pub fn name(&self) -> &'static str {
        match self {
            Producer::Vanilla(p) => p.name(),
            Producer::UserDev(p) => p.name(),
            Producer::Deobf(p) => p.name(),
        }
    }

    pub fn claim(
        &self,
        declaration: &DependencyDeclaration,
        scope: &ClaimScope<'_>,
    ) -> Option<ArtifactCoordinate> {
        match self {
            Producer::Vanilla(p) => p.claim(declaration, scope),
            Producer::UserDev(p) => p.claim(declaration, scope),
            Producer::Deobf(p) => p.claim(declaration, scope),
        }
    }

    pub fn closure(&self, synthesized: &ArtifactCoordinate) -> Vec<ArtifactCoordinate> {
        match self {
            Producer::Vanilla(p) => p.closure(synthesized),
            Producer::UserDev(p) => p.closure(synthesized),
            Producer::Deobf(p) => p.closure(synthesized),
        }
    }

    pub async fn produce(&self, claim: &Claim, ctx: &PipelineContext<'_>) -> RepoResult<ProduceOutcome> {
        match self {
            Producer::Vanilla(p) => p.produce(claim, ctx).await,
            Producer::UserDev(p) => p.produce(claim, ctx).await,
            Producer::Deobf(p) => p.produce(claim, ctx).await,
        }
    }
}

/// A declaration accepted by one producer, with everything it will publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    /// Index of the claiming producer in its chain.
    pub producer: usize,
    pub declaration: DependencyDeclaration,
    pub coordinate: ArtifactCoordinate,
    pub closure: Vec<ArtifactCoordinate>,
}

/// Result of planning: claims plus a reverse index from every synthesized
/// coordinate to the claim that owns it.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRepo {
    claims: Vec<Claim>,
    rewrites: Vec<(DependencyDeclaration, usize)>,
    owners: HashMap<ArtifactCoordinate, usize>,
}

impl ResolvedRepo {
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn claim_for(&self, coordinate: &ArtifactCoordinate) -> Option<&Claim> {
        self.owners.get(coordinate).map(|&idx| &self.claims[idx])
    }

    pub fn is_claimed(&self, coordinate: &ArtifactCoordinate) -> bool {
        self.owners.contains_key(coordinate)
    }

    /// Each input declaration, in order, with the coordinate replacing it.
    pub fn rewrites(&self) -> impl Iterator<Item = (&DependencyDeclaration, &ArtifactCoordinate)> {
        self.rewrites
            .iter()
            .map(|(decl, idx)| (decl, &self.claims[*idx].coordinate))
    }
}

/// Ordered producers; the first to claim a declaration owns it.
pub struct ProducerChain {
    producers: Vec<Producer>,
}

impl ProducerChain {
    pub fn new(producers: Vec<Producer>) -> Self {
        Self { producers }
    }

    /// Vanilla game, then userdev game, then mods.
    pub fn standard() -> Self {
        Self::new(vec![
            Producer::Vanilla(VanillaProducer),
            Producer::UserDev(UserDevProducer),
            Producer::Deobf(DeobfProducer),
        ])
    }

    pub fn producers(&self) -> &[Producer] {
        &self.producers
    }

    /// First producer claiming `declaration` and the coordinate it synthesizes.
    pub fn resolve(
        &self,
        declaration: &DependencyDeclaration,
        scope: &ClaimScope<'_>,
    ) -> Option<(usize, ArtifactCoordinate)> {
        self.producers
            .iter()
            .enumerate()
            .find_map(|(idx, p)| p.claim(declaration, scope).map(|c| (idx, c)))
    }

    /// Validate `declarations` and turn them into claims. The scope's primary
    /// is taken from `declarations`. Pure: nothing is fetched or written, so
    /// a failing plan leaves no trace.
    pub fn plan(
        &self,
        declarations: &[DependencyDeclaration],
        scope: ClaimScope<'_>,
    ) -> RepoResult<ResolvedRepo> {
        let mut singletons: HashMap<DeclarationKind, &DependencyDeclaration> = HashMap::new();
        for decl in declarations.iter().filter(|d| d.kind.is_singleton()) {
            if let Some(first) = singletons.get(&decl.kind) {
                return Err(RepoError::DuplicateDeclaration {
                    kind: decl.kind,
                    first: first.notation(),
                    second: decl.notation(),
                });
            }
            singletons.insert(decl.kind, decl);
        }
        let primary = singletons
            .get(&DeclarationKind::Primary)
            .copied()
            .ok_or(RepoError::MissingPrimaryDeclaration)?;
        let scope = scope.with_primary(primary);

        let mut repo = ResolvedRepo::default();
        for decl in declarations {
            let (producer, coordinate) =
                self.resolve(decl, &scope)
                    .ok_or_else(|| RepoError::UnresolvedDependency {
                        declaration: decl.to_string(),
                    })?;

            // Repeated identical declarations share one claim.
            if let Some(&idx) = repo.owners.get(&coordinate) {
                let existing = &repo.claims[idx];
                if existing.declaration != *decl {
                    return Err(overlap(&coordinate, &existing.declaration, decl));
                }
                repo.rewrites.push((decl.clone(), idx));
                continue;
            }

            let closure = self.producers[producer].closure(&coordinate);
            let idx = repo.claims.len();
            for member in &closure {
                if let Some(&other) = repo.owners.get(member) {
                    return Err(overlap(member, &repo.claims[other].declaration, decl));
                }
                repo.owners.insert(member.clone(), idx);
            }

            debug!(
                "{} claimed by {} as {}",
                decl,
                self.producers[producer].name(),
                coordinate
            );
            repo.claims.push(Claim {
                producer,
                declaration: decl.clone(),
                coordinate,
                closure,
            });
            repo.rewrites.push((decl.clone(), idx));
        }

        Ok(repo)
    }

    pub async fn produce(&self, claim: &Claim, ctx: &PipelineContext<'_>) -> RepoResult<ProduceOutcome> {
        let producer = self.producers.get(claim.producer).ok_or_else(|| {
            RepoError::Other(format!("no producer at index {} for {}", claim.producer, claim.coordinate))
        })?;
        producer.produce(claim, ctx).await
    }
}

fn overlap(
    coordinate: &ArtifactCoordinate,
    first: &DependencyDeclaration,
    second: &DependencyDeclaration,
) -> RepoError {
    RepoError::OverlappingClaims {
        coordinate: coordinate.to_string(),
        first: first.to_string(),
        second: second.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RepoConfig;

    fn config() -> RepoConfig {
        RepoConfig::with_cache_dir("/nonexistent")
    }

    fn coord(raw: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::parse(raw).unwrap()
    }

    fn game() -> DependencyDeclaration {
        DependencyDeclaration::primary("com.example:game:1.0").unwrap()
    }

    /// Mod version under a primary of `com.example:game:1.0`.
    fn mod_version(config: &RepoConfig, version: &str) -> String {
        let game = game();
        ClaimScope::new(config)
            .with_primary(&game)
            .mod_version(version)
            .unwrap()
    }

    #[test]
    fn standard_chain_claims_each_kind() {
        let chain = ProducerChain::standard();
        let config = config();
        let game = game();
        let scope = ClaimScope::new(&config).with_primary(&game);

        let vanilla = DependencyDeclaration::primary("net.minecraft:client:1.12.2").unwrap();
        let userdev = DependencyDeclaration::primary("net.minecraftforge:forge:1.12.2-14.23.5").unwrap();
        let module = DependencyDeclaration::mod_dependency("com.example:mod:2.0").unwrap();

        let (idx, c) = chain.resolve(&vanilla, &scope).unwrap();
        assert_eq!(chain.producers()[idx].name(), "vanilla");
        assert_eq!(c, coord("net.minecraft:client:1.12.2"));

        let (idx, c) = chain.resolve(&userdev, &scope).unwrap();
        assert_eq!(chain.producers()[idx].name(), "userdev");
        assert_eq!(c, coord("net.minecraftforge:forge:1.12.2-14.23.5"));

        let (idx, c) = chain.resolve(&module, &scope).unwrap();
        assert_eq!(chain.producers()[idx].name(), "deobf");
        assert_eq!(c.group, "deobf.com.example");
        assert!(c.version.starts_with("2.0_mapped_1.0-"), "{}", c);

        assert!(chain.resolve(&module, &ClaimScope::new(&config)).is_none());
    }

    #[test]
    fn plan_indexes_every_closure_member() {
        let chain = ProducerChain::standard();
        let config = config();
        let decls = vec![
            game(),
            DependencyDeclaration::mod_dependency("com.example:mod:2.0").unwrap(),
            DependencyDeclaration::mod_dependency("com.example:mod:2.0").unwrap(),
        ];

        let repo = chain.plan(&decls, ClaimScope::new(&config)).unwrap();
        assert_eq!(repo.claims().len(), 2);
        assert_eq!(repo.rewrites().count(), 3);

        let deobf = format!("deobf.com.example:mod:{}", mod_version(&config, "2.0"));
        for raw in [
            "com.example:game:1.0".to_string(),
            "com.example:game:1.0:sources".to_string(),
            "com.example:game:1.0@pom".to_string(),
            deobf.clone(),
            format!("{}@pom", deobf),
        ] {
            assert!(repo.is_claimed(&coord(&raw)), "{} should be claimed", raw);
        }
        assert!(!repo.is_claimed(&coord("com.example:mod:2.0")));
        assert_eq!(
            repo.claim_for(&coord("com.example:game:1.0@pom")).unwrap().coordinate,
            coord("com.example:game:1.0")
        );
    }

    #[test]
    fn plan_rejects_bad_declaration_sets() {
        let chain = ProducerChain::standard();
        let config = config();
        let scope = ClaimScope::new(&config);
        let game = game();
        let other = DependencyDeclaration::primary("com.example:game:2.0").unwrap();
        let module = DependencyDeclaration::mod_dependency("com.example:mod:2.0").unwrap();

        let err = chain.plan(&[game.clone(), other], scope).unwrap_err();
        assert!(matches!(
            err,
            RepoError::DuplicateDeclaration { kind: DeclarationKind::Primary, .. }
        ));

        let err = chain.plan(&[module.clone()], scope).unwrap_err();
        assert!(matches!(err, RepoError::MissingPrimaryDeclaration));

        let mods_only = ProducerChain::new(vec![Producer::Deobf(DeobfProducer)]);
        let err = mods_only.plan(&[game, module], scope).unwrap_err();
        assert!(matches!(err, RepoError::UnresolvedDependency { .. }));
    }

    #[test]
    fn distinct_declarations_on_one_coordinate_are_rejected() {
        let chain = ProducerChain::standard();
        let mut config = config();
        config.mappings = Some("m".to_string());

        // The userdev game and the remapped mod both land on
        // deobf.com.example:mod:2.0_mapped_m.
        let decls = vec![
            DependencyDeclaration::primary("deobf.com.example:mod:2.0").unwrap(),
            DependencyDeclaration::mod_dependency("com.example:mod:2.0").unwrap(),
        ];
        let err = chain.plan(&decls, ClaimScope::new(&config)).unwrap_err();
        match err {
            RepoError::OverlappingClaims { coordinate, first, second } => {
                assert_eq!(coordinate, "deobf.com.example:mod:2.0_mapped_m@jar");
                assert_eq!(first, decls[0].to_string());
                assert_eq!(second, decls[1].to_string());
            }
            other => panic!("expected OverlappingClaims, got {:?}", other),
        }
    }

    #[test]
    fn mapped_versions_are_suffixed() {
        let chain = ProducerChain::standard();
        let mut config = config();
        config.mappings = Some("snapshot_20180814".to_string());
        let game = game();
        let scope = ClaimScope::new(&config).with_primary(&game);

        let module = DependencyDeclaration::mod_dependency("com.example:mod:2.0").unwrap();
        let (_, c) = chain.resolve(&module, &scope).unwrap();
        assert_eq!(c, coord("deobf.com.example:mod:2.0_mapped_snapshot_20180814"));

        let (_, c) = chain.resolve(&game, &scope.with_access(Some("0a1b2c3d"))).unwrap();
        assert_eq!(c, coord("com.example:game:1.0_mapped_snapshot_20180814_at_0a1b2c3d"));
    }

    #[test]
    fn mod_coordinates_follow_the_primary() {
        let config = config();
        let first = mod_version(&config, "2.0");
        let other_game = DependencyDeclaration::primary("com.example:game:2.0").unwrap();
        let second = ClaimScope::new(&config)
            .with_primary(&other_game)
            .mod_version("2.0")
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(first, mod_version(&config, "2.0"));
    }
}
