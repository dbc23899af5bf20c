//! Collaborator boundaries: the external services the engine drives but does not implement.
//!
//! Every generation capability is an async trait so the pipeline can yield while a
//! provider works. Implementations classify their failures into [`CollaboratorError`]
//! so the retry policy can tell transient conditions from permanent ones.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::workflow::job::{ArtifactKind, Job};

pub mod placeholder;

pub use placeholder::{
    PlaceholderImageGenerator, PlaceholderMusicGenerator, PlaceholderTextGenerator,
    PlaceholderVideoAssembler, PlaceholderVoiceSynthesizer,
};

/// Opaque reference to a generated asset (file path, URL, object key...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure reported by a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("content policy violation: {0}")]
    ContentPolicy(String),

    #[error("{0}")]
    Other(String),
}

impl CollaboratorError {
    /// Returns true if the error is likely transient and the call can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CollaboratorError::RateLimited(_)
                | CollaboratorError::Timeout(_)
                | CollaboratorError::Transient(_)
        )
    }
}

/// Classifies a provider error message into a more specific error variant.
///
/// Unrecognised messages are treated as transient.
pub fn classify_upstream_error(message: &str) -> CollaboratorError {
    let lower = message.to_lowercase();
    let trimmed = message.trim().to_string();

    if lower.contains("quota") || lower.contains("rate limit") || lower.contains("429") {
        return CollaboratorError::RateLimited(trimmed);
    }

    if lower.contains("timed out") || lower.contains("timeout") || lower.contains("deadline") {
        return CollaboratorError::Timeout(trimmed);
    }

    if lower.contains("api key")
        || lower.contains("authentication")
        || lower.contains("unauthorized")
        || lower.contains("permission denied")
        || lower.contains("401")
    {
        return CollaboratorError::Auth(trimmed);
    }

    if lower.contains("safety") || lower.contains("content policy") || lower.contains("blocked") {
        return CollaboratorError::ContentPolicy(trimmed);
    }

    CollaboratorError::Transient(trimmed)
}

/// A collaborator call that did not succeed within the retry policy.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed after {attempts} attempt(s): {source}")]
pub struct UpstreamFailure {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub source: CollaboratorError,
}

impl UpstreamFailure {
    /// True when the call was abandoned because of a non-retriable classification.
    pub fn is_permanent(&self) -> bool {
        !self.source.is_retryable()
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system_directive: &str,
        max_tokens: u32,
    ) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<ArtifactRef, CollaboratorError>;
}

#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str)
        -> Result<ArtifactRef, CollaboratorError>;
}

#[async_trait]
pub trait MusicGenerator: Send + Sync {
    async fn generate(
        &self,
        mood: &str,
        style: &str,
        target_duration: Duration,
    ) -> Result<ArtifactRef, CollaboratorError>;
}

#[async_trait]
pub trait VideoAssembler: Send + Sync {
    async fn assemble(
        &self,
        image_refs: &[ArtifactRef],
        narration_ref: &ArtifactRef,
        music_ref: &ArtifactRef,
        per_scene_durations: &[Duration],
    ) -> Result<ArtifactRef, CollaboratorError>;
}

/// Best-effort durable recording of job metadata. Failures never change job state.
pub trait PersistenceSink: Send + Sync {
    fn record_job(&self, job: &Job) -> Result<(), DatabaseError>;

    fn record_artifact(
        &self,
        job_id: &str,
        kind: ArtifactKind,
        reference: &ArtifactRef,
    ) -> Result<(), DatabaseError>;
}

/// The full set of collaborators an engine runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub voice: Arc<dyn VoiceSynthesizer>,
    pub music: Arc<dyn MusicGenerator>,
    pub video: Arc<dyn VideoAssembler>,
    pub persistence: Option<Arc<dyn PersistenceSink>>,
}

impl Collaborators {
    /// Offline collaborators producing deterministic placeholder references.
    pub fn placeholder() -> Self {
        Self {
            text: Arc::new(PlaceholderTextGenerator),
            image: Arc::new(PlaceholderImageGenerator),
            voice: Arc::new(PlaceholderVoiceSynthesizer),
            music: Arc::new(PlaceholderMusicGenerator::new()),
            video: Arc::new(PlaceholderVideoAssembler),
            persistence: None,
        }
    }

    pub fn with_text(mut self, text: Arc<dyn TextGenerator>) -> Self {
        self.text = text;
        self
    }

    pub fn with_image(mut self, image: Arc<dyn ImageGenerator>) -> Self {
        self.image = image;
        self
    }

    pub fn with_voice(mut self, voice: Arc<dyn VoiceSynthesizer>) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_music(mut self, music: Arc<dyn MusicGenerator>) -> Self {
        self.music = music;
        self
    }

    pub fn with_video(mut self, video: Arc<dyn VideoAssembler>) -> Self {
        self.video = video;
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PersistenceSink>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Records the job through the persistence sink, if any. Errors are logged only.
    pub(crate) fn persist_job(&self, job: &Job) {
        if let Some(ref sink) = self.persistence {
            if let Err(e) = sink.record_job(job) {
                log::error!("Failed to persist job {}: {}", job.id, e);
            }
        }
    }

    pub(crate) fn persist_artifact(&self, job_id: &str, kind: ArtifactKind, reference: &ArtifactRef) {
        if let Some(ref sink) = self.persistence {
            if let Err(e) = sink.record_artifact(job_id, kind, reference) {
                log::error!("Failed to persist {} artifact for job {}: {}", kind, job_id, e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod scripted;
