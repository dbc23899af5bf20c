use std::path::PathBuf;
use thiserror::Error;

use crate::collab::UpstreamFailure;
use crate::workflow::phase::InvalidStateTransition;

#[derive(Error, Debug)]
pub enum StoryreelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input validation failed: {0}")]
    InputValidation(#[from] ValidationError),

    #[error(transparent)]
    InvalidStateTransition(#[from] InvalidStateTransition),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamFailure),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Rejected caller input. Raised before any collaborator is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Story text must be at least {min} characters long (got {actual})")]
    StoryTooShort { min: usize, actual: usize },

    #[error("Prompt must be at least {min} characters long (got {actual})")]
    PromptTooShort { min: usize, actual: usize },

    #[error("Scene count must be between {min} and {max} (got {requested})")]
    SceneCountOutOfRange {
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error("Scene set rejected: {0}")]
    InvalidSceneSet(String),
}

pub type Result<T> = std::result::Result<T, StoryreelError>;
