pub mod collab;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod story;
pub mod telemetry;
pub mod workflow;

pub use collab::{
    ArtifactRef, CollaboratorError, Collaborators, ImageGenerator, MusicGenerator,
    PersistenceSink, TextGenerator, UpstreamFailure, VideoAssembler, VoiceSynthesizer,
};
pub use config::{load_config, load_config_from_str, Config};
pub use engine::{ConfirmAck, GenerationResult, JobStatusView, JobSummary, StoryEngine};
pub use error::{ConfigError, Result, StoryreelError, ValidationError};
pub use progress::{ProgressRecord, ProgressStatus, ProgressTracker};
pub use story::{Breakdown, EnhanceRequest, EnhancedStory, SceneBreakdownProcessor};
pub use workflow::{ArtifactKind, ArtifactRefs, Job, JobStatus, Phase, Scene, WorkflowRegistry};
