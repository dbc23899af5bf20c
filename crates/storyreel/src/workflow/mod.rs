//! Job model, lifecycle state machine and the shared registry.

pub mod job;
pub mod phase;
pub mod registry;

pub use job::{ArtifactKind, ArtifactRefs, Job, JobStatus, Scene};
pub use phase::{InvalidStateTransition, Operation, Phase};
pub use registry::WorkflowRegistry;
