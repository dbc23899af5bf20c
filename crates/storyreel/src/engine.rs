//! Caller-facing API: create, enhance, confirm, run and inspect story jobs.
//!
//! Every synchronous operation validates its input and the job's phase before any
//! collaborator is contacted. Generation runs on a spawned task; its outcome is only
//! observable through [`StoryEngine::get_status`] and [`StoryEngine::get_progress`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::collab::{ArtifactRef, Collaborators};
use crate::config::loader::validate_config;
use crate::config::Config;
use crate::db::{Database, SqlitePersistence};
use crate::error::Result;
use crate::pipeline::{GenerationPipeline, PipelineSettings, RetryPolicy, StagePlan};
use crate::progress::{ProgressRecord, ProgressTracker, ProgressUpdate};
use crate::story::breakdown::validate_scene_set;
use crate::story::prompt::preview;
use crate::story::{
    validate_scene_count, Breakdown, EnhanceRequest, EnhancedStory, PromptEnhancer,
    SceneBreakdownProcessor,
};
use crate::workflow::job::{ArtifactRefs, Job, JobStatus, Scene};
use crate::workflow::phase::{InvalidStateTransition, Operation, Phase};
use crate::workflow::WorkflowRegistry;

/// Reply to [`StoryEngine::confirm`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmAck {
    pub job_id: String,
    pub phase: Phase,
    /// True when confirming also scheduled the generation run.
    pub generation_started: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStatusView {
    pub job_id: String,
    pub phase: Phase,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSummary {
    pub id: String,
    pub story_title: String,
    pub phase: Phase,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            story_title: job.story_title.clone(),
            phase: job.phase,
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Everything a completed job produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub job_id: String,
    pub story_title: String,
    pub scenes: Vec<Scene>,
    pub artifact_refs: ArtifactRefs,
    pub total_duration_secs: u32,
    /// Seconds from generation start to completion.
    pub total_processing_time: f64,
}

impl GenerationResult {
    pub fn video(&self) -> Option<&ArtifactRef> {
        self.artifact_refs.video.as_ref()
    }
}

struct EngineInner {
    config: Config,
    registry: Arc<WorkflowRegistry>,
    progress: Arc<ProgressTracker>,
    collaborators: Collaborators,
    enhancer: PromptEnhancer,
    breakdown: Arc<SceneBreakdownProcessor>,
    pipeline: Arc<GenerationPipeline>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

/// Cheap to clone; clones share the same registry and tasks.
#[derive(Clone)]
pub struct StoryEngine {
    inner: Arc<EngineInner>,
}

impl StoryEngine {
    /// Builds an engine over `collaborators`.
    ///
    /// When `config.database.path` is set and no persistence sink was supplied, job
    /// metadata is recorded in a SQLite database at that path.
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        validate_config(&config)?;

        let collaborators = match (&config.database.path, &collaborators.persistence) {
            (Some(path), None) => {
                let db = Database::open(Path::new(path))?;
                collaborators.with_persistence(Arc::new(SqlitePersistence::new(db)))
            }
            _ => collaborators,
        };

        let retry = RetryPolicy::from(&config.retry);
        let registry = Arc::new(WorkflowRegistry::new());
        let progress = Arc::new(ProgressTracker::new(Duration::from_secs(
            config.workflow.initial_estimate_secs,
        )));
        let enhancer = PromptEnhancer::new(
            Arc::clone(&collaborators.text),
            retry,
            config.text.max_tokens,
        );
        let breakdown = Arc::new(SceneBreakdownProcessor::new(
            Arc::clone(&collaborators.text),
            retry,
            config.text.max_tokens,
            config.scenes.duration_secs,
        ));
        let pipeline = Arc::new(GenerationPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&progress),
            collaborators.clone(),
            Arc::clone(&breakdown),
            StagePlan::from_weights(&config.stages),
            PipelineSettings::from(&config),
        ));

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                registry,
                progress,
                collaborators,
                enhancer,
                breakdown,
                pipeline,
                tasks: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        match self.inner.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Task table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Creates a job in `PROMPT_ENHANCEMENT` and returns its id.
    pub fn create_job(&self) -> String {
        let job = self
            .inner
            .registry
            .insert(Job::new(self.inner.config.workflow.default_max_scenes));
        self.inner.collaborators.persist_job(&job);
        info!(job_id = %job.id, "Job created");
        job.id.clone()
    }

    /// Enhances the prompt into a story and moves the job to `CONFIRMATION`.
    ///
    /// Allowed again from `CONFIRMATION`, in which case the story is replaced and any
    /// previewed scenes are dropped.
    pub async fn enhance(&self, job_id: &str, request: EnhanceRequest) -> Result<EnhancedStory> {
        self.inner.registry.check(job_id, Operation::Enhance)?;
        validate_scene_count(request.max_scenes)?;

        let enhanced = self.inner.enhancer.enhance(&request).await?;

        let stored = enhanced.clone();
        let max_scenes = request.max_scenes;
        let job = self.inner.registry.apply(job_id, Operation::Enhance, move |job| {
            job.original_prompt = stored.original_prompt;
            job.enhanced_story = stored.enhanced_story;
            job.story_title = stored.story_title;
            job.max_scenes = max_scenes;
            job.scenes.clear();
            Ok(())
        })?;
        self.inner.collaborators.persist_job(&job);

        info!(
            job_id,
            title = %preview(&enhanced.story_title),
            fallback = enhanced.used_fallback,
            "Story enhanced"
        );
        Ok(enhanced)
    }

    /// Confirms (`proceed = true`) or cancels (`proceed = false`) a job awaiting confirmation.
    pub fn confirm(&self, job_id: &str, proceed: bool) -> Result<ConfirmAck> {
        if !proceed {
            let job = self.inner.registry.apply(job_id, Operation::Cancel, |_| Ok(()))?;
            self.inner.collaborators.persist_job(&job);
            info!(job_id, "Job cancelled");
            return Ok(ConfirmAck {
                job_id: job.id.clone(),
                phase: job.phase,
                generation_started: false,
            });
        }

        let job = self.inner.registry.apply(job_id, Operation::Confirm, |_| Ok(()))?;
        self.inner.collaborators.persist_job(&job);
        info!(job_id, "Job confirmed");

        if !self.inner.config.workflow.auto_start_generation {
            return Ok(ConfirmAck {
                job_id: job.id.clone(),
                phase: job.phase,
                generation_started: false,
            });
        }

        self.start_generation(job_id)
    }

    /// Schedules the generation run and returns without waiting for it.
    ///
    /// A job gets at most one run.
    pub fn start_generation(&self, job_id: &str) -> Result<ConfirmAck> {
        let job = self
            .inner
            .registry
            .apply(job_id, Operation::StartGeneration, |job| {
                if job.generation_started {
                    return Err(InvalidStateTransition {
                        job_id: job.id.clone(),
                        operation: Operation::StartGeneration,
                        phase: job.phase,
                    }
                    .into());
                }
                job.generation_started = true;
                Ok(())
            })?;
        self.inner.collaborators.persist_job(&job);

        // The table lock is held across spawn and insert so the task cannot
        // remove its own entry before it exists.
        let mut tasks = self.tasks();
        let pipeline = Arc::clone(&self.inner.pipeline);
        let engine = self.clone();
        let id = job_id.to_string();
        let handle = tokio::spawn(async move {
            pipeline.run(&id).await;
            engine.tasks().remove(&id);
        });
        tasks.insert(job_id.to_string(), handle);
        drop(tasks);

        info!(job_id, "Generation scheduled");
        Ok(ConfirmAck {
            job_id: job.id.clone(),
            phase: job.phase,
            generation_started: true,
        })
    }

    /// Previews the scene set for a job awaiting confirmation.
    ///
    /// The stored scenes are replaced only if the new set is valid and the job is
    /// still awaiting confirmation of the same story once the collaborator has
    /// answered. A story replaced by `enhance` in the meantime discards the set.
    pub async fn regenerate_scenes(&self, job_id: &str) -> Result<Breakdown> {
        let snapshot = self.inner.registry.check(job_id, Operation::RegenerateScenes)?;

        let breakdown = self
            .inner
            .breakdown
            .break_down(&snapshot.enhanced_story, &snapshot.story_title, snapshot.max_scenes)
            .await?;
        validate_scene_set(breakdown.scenes(), snapshot.max_scenes)?;

        let scenes = breakdown.scenes().to_vec();
        let job = self
            .inner
            .registry
            .apply(job_id, Operation::RegenerateScenes, move |job| {
                if !same_story(job, &snapshot) {
                    warn!(job_id = %job.id, "Story replaced during scene preview, discarding scenes");
                    return Err(InvalidStateTransition {
                        job_id: job.id.clone(),
                        operation: Operation::RegenerateScenes,
                        phase: job.phase,
                    }
                    .into());
                }
                job.scenes = scenes;
                Ok(())
            })?;
        self.inner.collaborators.persist_job(&job);

        info!(
            job_id,
            scenes = job.scenes.len(),
            fallback = breakdown.is_fallback(),
            "Scenes regenerated"
        );
        Ok(breakdown)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Arc<Job>> {
        self.inner.registry.require(job_id)
    }

    pub fn get_status(&self, job_id: &str) -> Result<JobStatusView> {
        let job = self.inner.registry.require(job_id)?;
        Ok(JobStatusView {
            job_id: job.id.clone(),
            phase: job.phase,
            status: job.status,
            failure_reason: job.failure_reason.clone(),
        })
    }

    /// Latest progress record, or `None` if no generation run has begun yet.
    pub fn get_progress(&self, job_id: &str) -> Result<Option<Arc<ProgressRecord>>> {
        self.inner.registry.require(job_id)?;
        Ok(self.inner.progress.get(job_id))
    }

    /// Push complement to [`get_progress`](Self::get_progress), covering every job.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.inner.progress.subscribe()
    }

    /// The generated assets of a completed job.
    pub fn get_result(&self, job_id: &str) -> Result<GenerationResult> {
        let job = self.inner.registry.check(job_id, Operation::GetResult)?;
        Ok(GenerationResult {
            job_id: job.id.clone(),
            story_title: job.story_title.clone(),
            scenes: job.scenes.clone(),
            artifact_refs: job.artifacts.clone(),
            total_duration_secs: job.total_duration_secs(),
            total_processing_time: job.total_processing_time.unwrap_or_default(),
        })
    }

    /// Summaries of every job, newest first.
    pub fn list_jobs(&self) -> Vec<JobSummary> {
        self.inner
            .registry
            .list()
            .iter()
            .map(|job| JobSummary::from(job.as_ref()))
            .collect()
    }

    /// Drops a job and its progress record. Refused while its run is in flight.
    pub fn cleanup_job(&self, job_id: &str) -> Result<()> {
        let job = self.inner.registry.require(job_id)?;
        if job.status == JobStatus::Processing {
            return Err(InvalidStateTransition {
                job_id: job_id.to_string(),
                operation: Operation::Cleanup,
                phase: job.phase,
            }
            .into());
        }

        self.inner.registry.remove(job_id);
        self.inner.progress.remove(job_id);
        info!(job_id, "Job cleaned up");
        Ok(())
    }

    /// Polls the job until it reaches a terminal phase and returns the final record.
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<Arc<Job>> {
        let interval = Duration::from_millis(self.inner.config.workflow.poll_interval_ms.max(1));
        loop {
            let job = self.inner.registry.require(job_id)?;
            if job.phase.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Waits for every in-flight generation run to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, JoinHandle<()>)> = self.tasks().drain().collect();
        if handles.is_empty() {
            return;
        }

        info!(runs = handles.len(), "Waiting for generation runs to finish");
        for (job_id, handle) in handles {
            if let Err(e) = handle.await {
                warn!(job_id = %job_id, error = %e, "Generation task ended abnormally");
            }
        }
    }
}

/// True when both records describe the story a scene set is built from.
fn same_story(current: &Job, snapshot: &Job) -> bool {
    current.enhanced_story == snapshot.enhanced_story
        && current.story_title == snapshot.story_title
        && current.max_scenes == snapshot.max_scenes
}
