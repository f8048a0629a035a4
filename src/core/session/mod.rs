// ─── Resolution Session ───
// Two phases: Expansion turns declarations into published artifacts and
// discovers build facts; Serving answers per-coordinate lookups from the
// store, re-deriving a missing or corrupt artifact once.

mod facts;
mod report;

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::access::AccessTransformers;
use crate::core::cache::CacheStore;
use crate::core::config::RepoConfig;
use crate::core::downloader::{DownloadCache, DownloadService, Downloader};
use crate::core::error::{RepoError, RepoResult};
use crate::core::mapping::{MappingResolver, MappingService};
use crate::core::maven::{ArtifactCoordinate, MavenDownloadService};
use crate::core::producers::{
    Claim, ClaimScope, DeclarationKind, DependencyDeclaration, PipelineContext, ProduceOutcome, ProducerChain,
    ResolvedRepo,
};

pub use facts::{BuildProperties, DiscoveredFacts, MCP_VERSION, MC_VERSION};
pub use report::{ExpansionReport, Rewrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Expansion,
    Serving,
    Failed,
}

/// External collaborators of a session.
#[derive(Clone)]
pub struct Services {
    pub downloads: Arc<dyn DownloadService>,
    pub mappings: Arc<dyn MappingService>,
    pub properties: Arc<BuildProperties>,
}

impl Services {
    /// HTTP downloads from `config.repositories` and a fresh property sink.
    pub fn http(config: &RepoConfig, mappings: Arc<dyn MappingService>) -> RepoResult<Self> {
        let downloader = Downloader::new(&config.user_agent)?;
        Ok(Self {
            downloads: Arc::new(MavenDownloadService::new(config.repositories.clone(), downloader)),
            mappings,
            properties: Arc::new(BuildProperties::new()),
        })
    }
}

pub struct ResolutionSession {
    id: Uuid,
    config: RepoConfig,
    store: CacheStore,
    downloads: DownloadCache,
    mappings: MappingResolver,
    access: Arc<AccessTransformers>,
    chain: ProducerChain,
    properties: Arc<BuildProperties>,
    phase: SessionPhase,
    repo: Option<ResolvedRepo>,
    facts: Option<DiscoveredFacts>,
}

impl ResolutionSession {
    pub fn new(config: RepoConfig, services: Services) -> RepoResult<Self> {
        Self::with_chain(config, services, ProducerChain::standard())
    }

    pub fn with_chain(config: RepoConfig, services: Services, chain: ProducerChain) -> RepoResult<Self> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            store: CacheStore::new(config.artifacts_dir()),
            downloads: DownloadCache::new(config.downloads_dir(), services.downloads),
            mappings: MappingResolver::new(services.mappings),
            access: Arc::new(AccessTransformers::new()),
            chain,
            properties: services.properties,
            phase: SessionPhase::Expansion,
            repo: None,
            facts: None,
            config,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn facts(&self) -> Option<&DiscoveredFacts> {
        self.facts.as_ref()
    }

    pub fn properties(&self) -> &Arc<BuildProperties> {
        &self.properties
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Materialize every declared dependency. Allowed once; any failure
    /// leaves the session in [`SessionPhase::Failed`].
    pub async fn expand(
        &mut self,
        declarations: Vec<DependencyDeclaration>,
    ) -> RepoResult<ExpansionReport> {
        if self.phase != SessionPhase::Expansion {
            return Err(RepoError::SessionState(format!(
                "expand called in {:?} phase",
                self.phase
            )));
        }

        match self.run_expansion(&declarations).await {
            Ok(report) => {
                self.phase = SessionPhase::Serving;
                info!(
                    session = %self.id,
                    "Expansion complete: {} artifacts, minecraft {}",
                    report.synthesized.len(),
                    report.facts.minecraft_version
                );
                Ok(report)
            }
            Err(e) => {
                self.phase = SessionPhase::Failed;
                error!(session = %self.id, "Expansion failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_expansion(
        &mut self,
        declarations: &[DependencyDeclaration],
    ) -> RepoResult<ExpansionReport> {
        self.access = Arc::new(AccessTransformers::load(&self.config.access_transformers).await?);
        let scope = ClaimScope::new(&self.config).with_access(self.access.fingerprint());
        let repo = self.chain.plan(declarations, scope)?;
        info!(
            session = %self.id,
            "Expanding {} declarations into {} claims",
            declarations.len(),
            repo.claims().len()
        );

        let (primary, rest): (Vec<&Claim>, Vec<&Claim>) = repo
            .claims()
            .iter()
            .partition(|c| c.declaration.kind == DeclarationKind::Primary);

        let mut entries = Vec::new();
        let mut discovered = None;
        for claim in primary {
            let outcome = self.chain.produce(claim, &self.context(None)).await?;
            discovered = outcome.facts.or(discovered);
            entries.extend(outcome.entries);
        }
        let facts = discovered.ok_or(RepoError::MissingFact("MC_VERSION"))?;

        let ctx = self.context(Some(&facts));
        let outcomes: Vec<ProduceOutcome> = stream::iter(rest)
            .map(|claim| self.chain.produce(claim, &ctx))
            .buffer_unordered(self.config.concurrency)
            .try_collect()
            .await?;
        entries.extend(outcomes.into_iter().flat_map(|o| o.entries));

        for claim in repo.claims() {
            for member in &claim.closure {
                if !self.store.has(member).await {
                    return Err(RepoError::CacheCorruption {
                        coordinate: member.to_string(),
                        reason: format!("missing after expanding {}", claim.declaration),
                    });
                }
            }
        }

        facts.publish_to(&self.properties)?;

        entries.sort_by(|a, b| a.coordinate.cmp(&b.coordinate));
        entries.dedup_by(|a, b| a.coordinate == b.coordinate);
        let report = ExpansionReport {
            session_id: self.id,
            rewrites: repo
                .rewrites()
                .map(|(declaration, coordinate)| Rewrite {
                    declaration: declaration.clone(),
                    coordinate: coordinate.clone(),
                })
                .collect(),
            synthesized: entries,
            facts: facts.clone(),
        };

        self.repo = Some(repo);
        self.facts = Some(facts);
        Ok(report)
    }

    /// Local path of `coordinate`, or `None` if this session never claimed it.
    pub async fn serve(&self, coordinate: &ArtifactCoordinate) -> RepoResult<Option<PathBuf>> {
        let repo = match (&self.phase, &self.repo) {
            (SessionPhase::Serving, Some(repo)) => repo,
            _ => {
                return Err(RepoError::SessionState(format!(
                    "serve called in {:?} phase",
                    self.phase
                )))
            }
        };
        let Some(claim) = repo.claim_for(coordinate) else {
            return Ok(None);
        };

        match self.store.lookup(coordinate).await {
            Ok(Some(entry)) => return Ok(Some(entry.path)),
            Ok(None) => warn!("{} is no longer cached; re-deriving", coordinate),
            Err(e) if e.is_corruption() => warn!("{}; re-deriving", e),
            Err(e) => return Err(e),
        }

        self.chain
            .produce(claim, &self.context(self.facts.as_ref()))
            .await?;

        match self.store.lookup(coordinate).await? {
            Some(entry) => Ok(Some(entry.path)),
            None => Err(RepoError::CacheCorruption {
                coordinate: coordinate.to_string(),
                reason: "re-derivation did not publish it".to_string(),
            }),
        }
    }

    fn context<'a>(&'a self, facts: Option<&'a DiscoveredFacts>) -> PipelineContext<'a> {
        PipelineContext {
            config: &self.config,
            store: &self.store,
            downloads: &self.downloads,
            mappings: &self.mappings,
            access: &self.access,
            facts,
        }
    }
}
