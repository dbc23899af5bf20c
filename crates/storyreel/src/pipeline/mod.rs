pub mod context;
pub mod error;
pub mod retry;
pub mod runner;
pub mod stage;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use runner::{GenerationPipeline, PipelineSettings};
pub use stage::{StageDescriptor, StageKind, StagePlan};
