use tokio::time::Instant;

use crate::collab::ArtifactRef;
use crate::workflow::job::{Job, Scene};

/// Inputs and stage outputs for one generation run.
pub struct PipelineContext {
    // Input
    pub job_id: String,
    pub story: String,
    pub title: String,
    pub max_scenes: usize,
    pub started: Instant,

    // Scene breakdown result, reused when the job already carries a validated set
    pub scenes: Vec<Scene>,

    // Stage artifacts, in scene order for images
    pub images: Vec<ArtifactRef>,
    pub narration: Option<ArtifactRef>,
    pub music: Option<ArtifactRef>,
    pub video: Option<ArtifactRef>,
}

impl PipelineContext {
    pub fn new(job: &Job) -> Self {
        let scenes = if job.has_validated_scenes() {
            job.scenes.clone()
        } else {
            Vec::new()
        };

        Self {
            job_id: job.id.clone(),
            story: job.enhanced_story.clone(),
            title: job.story_title.clone(),
            max_scenes: job.max_scenes,
            started: Instant::now(),
            scenes,
            images: Vec::new(),
            narration: None,
            music: None,
            video: None,
        }
    }

    /// Text read by the narrator: the story, or the scene descriptions if it is empty.
    pub fn narration_text(&self) -> String {
        if !self.story.trim().is_empty() {
            return self.story.trim().to_string();
        }
        self.scenes
            .iter()
            .map(|s| s.description.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.scenes.iter().map(|s| u64::from(s.duration_secs)).sum()
    }
}
