//! Job record and the values it carries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collab::ArtifactRef;
use crate::workflow::phase::Phase;

/// Coarse status of a job, derived alongside its phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting on the caller (enhance, confirm or start).
    Active,
    /// A generation run is in flight.
    Processing,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scene of a story.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scene {
    /// 1-based position within the job.
    pub scene_number: u32,
    pub description: String,
    pub image_prompt: String,
    pub duration_secs: u32,
}

/// Kind of a generated asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Audio,
    Music,
    Video,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Audio => "audio",
            ArtifactKind::Music => "music",
            ArtifactKind::Video => "video",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// References to everything the pipeline produced for a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRefs {
    /// Scene images in scene order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<ArtifactRef>,
}

impl ArtifactRefs {
    pub fn record(&mut self, kind: ArtifactKind, reference: ArtifactRef) {
        match kind {
            ArtifactKind::Image => self.images.push(reference),
            ArtifactKind::Audio => self.audio = Some(reference),
            ArtifactKind::Music => self.music = Some(reference),
            ArtifactKind::Video => self.video = Some(reference),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.audio.is_none() && self.music.is_none() && self.video.is_none()
    }
}

/// A story-to-video job.
///
/// Records are never mutated in place once shared. Every change produces a new
/// record that replaces the previous one in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub original_prompt: String,
    pub enhanced_story: String,
    pub story_title: String,
    pub max_scenes: usize,
    pub phase: Phase,
    pub status: JobStatus,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub artifacts: ArtifactRefs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Set once a generation run has been scheduled for this job.
    #[serde(default)]
    pub generation_started: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock seconds from generation start to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_processing_time: Option<f64>,
}

impl Job {
    /// Creates a job in the prompt enhancement phase with a fresh v4 id.
    pub fn new(max_scenes: usize) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original_prompt: String::new(),
            enhanced_story: String::new(),
            story_title: String::new(),
            max_scenes,
            phase: Phase::PromptEnhancement,
            status: JobStatus::Active,
            scenes: Vec::new(),
            artifacts: ArtifactRefs::default(),
            failure_reason: None,
            generation_started: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
            total_processing_time: None,
        }
    }

    /// Whether the stored scene set is complete for this job.
    pub fn has_validated_scenes(&self) -> bool {
        self.scenes.len() == self.max_scenes && self.max_scenes > 0
    }

    pub fn total_duration_secs(&self) -> u32 {
        self.scenes.iter().map(|s| s.duration_secs).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new(4);
        assert_eq!(job.phase, Phase::PromptEnhancement);
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.max_scenes, 4);
        assert!(job.scenes.is_empty());
        assert!(job.artifacts.is_empty());
        assert!(!job.generation_started);
        assert!(uuid::Uuid::parse_str(&job.id).is_ok());
    }

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(Job::new(3).id, Job::new(3).id);
    }

    #[test]
    fn test_artifact_record_keeps_image_order() {
        let mut refs = ArtifactRefs::default();
        refs.record(ArtifactKind::Image, ArtifactRef::new("a"));
        refs.record(ArtifactKind::Image, ArtifactRef::new("b"));
        refs.record(ArtifactKind::Music, ArtifactRef::new("m"));

        assert_eq!(refs.images, vec![ArtifactRef::new("a"), ArtifactRef::new("b")]);
        assert_eq!(refs.music, Some(ArtifactRef::new("m")));
        assert!(refs.video.is_none());
    }

    #[test]
    fn test_total_duration() {
        let mut job = Job::new(2);
        job.scenes = (1..=2)
            .map(|n| Scene {
                scene_number: n,
                description: "d".into(),
                image_prompt: "p".into(),
                duration_secs: 5,
            })
            .collect();
        assert!(job.has_validated_scenes());
        assert_eq!(job.total_duration_secs(), 10);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
