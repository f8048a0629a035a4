pub mod chain;
pub mod context;
pub mod declaration;
pub mod deobf;
pub mod pipeline;
pub mod userdev;
pub mod vanilla;

pub use chain::{ArtifactProducer, Claim, Producer, ProducerChain, ResolvedRepo};
pub use context::{ClaimScope, PipelineContext, ProduceOutcome};
pub use declaration::{DeclarationKind, DependencyDeclaration};
pub use deobf::DeobfProducer;
pub use userdev::{UserDevProducer, UserDevProfile};
pub use vanilla::VanillaProducer;
