use thiserror::Error;

use crate::collab::UpstreamFailure;
use crate::error::{StoryreelError, ValidationError};

use super::stage::StageKind;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Upstream(#[from] UpstreamFailure),

    #[error("Scene set rejected: {0}")]
    InvalidScenes(#[from] ValidationError),

    #[error("{stage} ran without {missing}")]
    MissingInput {
        stage: StageKind,
        missing: &'static str,
    },

    #[error("{0} does not produce an artifact")]
    NoArtifact(StageKind),

    #[error("Job record unavailable: {0}")]
    JobUnavailable(String),
}

impl From<StoryreelError> for PipelineError {
    fn from(e: StoryreelError) -> Self {
        match e {
            StoryreelError::Upstream(failure) => PipelineError::Upstream(failure),
            StoryreelError::InputValidation(v) => PipelineError::InvalidScenes(v),
            other => PipelineError::JobUnavailable(other.to_string()),
        }
    }
}
