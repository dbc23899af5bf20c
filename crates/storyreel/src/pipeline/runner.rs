use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::collab::{ArtifactRef, Collaborators};
use crate::config::{Config, ImageStyle, MusicConfig};
use crate::progress::ProgressTracker;
use crate::story::breakdown::validate_scene_set;
use crate::story::SceneBreakdownProcessor;
use crate::workflow::phase::{Operation, Phase};
use crate::workflow::WorkflowRegistry;

use super::context::PipelineContext;
use super::error::PipelineError;
use super::retry::{retry_with_backoff, RetryPolicy};
use super::stage::{StageDescriptor, StageKind, StagePlan};

/// Settings the stages read from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    pub image_style: ImageStyle,
    pub voice_id: String,
    pub music: MusicConfig,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retry),
            image_style: config.image.style,
            voice_id: config.voice.voice_id.clone(),
            music: config.music.clone(),
        }
    }
}

/// Drives the ordered stage list for one job at a time.
///
/// Stages run strictly in order. Each stage records its output on the job and moves
/// progress to the end of its band before the next stage starts. The first stage
/// failure ends the run and marks the job failed.
pub struct GenerationPipeline {
    registry: Arc<WorkflowRegistry>,
    progress: Arc<ProgressTracker>,
    collaborators: Collaborators,
    breakdown: Arc<SceneBreakdownProcessor>,
    plan: StagePlan,
    settings: PipelineSettings,
}

impl GenerationPipeline {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        progress: Arc<ProgressTracker>,
        collaborators: Collaborators,
        breakdown: Arc<SceneBreakdownProcessor>,
        plan: StagePlan,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            progress,
            collaborators,
            breakdown,
            plan,
            settings,
        }
    }

    /// Runs every stage for `job_id`.
    ///
    /// The job must be in generation with a run started. Errors never escape; they
    /// are recorded on the job and in its progress record.
    pub async fn run(&self, job_id: &str) {
        let span = info_span!("pipeline", job_id = %job_id);
        self.run_inner(job_id).instrument(span).await
    }

    async fn run_inner(&self, job_id: &str) {
        let job = match self.registry.get(job_id) {
            Some(job) if job.phase == Phase::Generation && job.generation_started => job,
            Some(job) => {
                warn!(phase = %job.phase, "Job is not ready for generation, skipping run");
                return;
            }
            None => {
                warn!("Job disappeared before generation started");
                return;
            }
        };

        let mut ctx = PipelineContext::new(&job);
        self.progress.begin(job_id, "Starting generation");
        info!(scenes = ctx.max_scenes, "Generation started");

        for stage in self.plan.iter() {
            let span = info_span!("stage", stage = %stage.kind);
            let result = self.run_stage(stage, &mut ctx).instrument(span).await;

            if let Err(e) = result {
                let reason = format!("{} failed: {}", stage.kind, e);
                self.fail(&ctx, &reason);
                return;
            }
        }

        self.complete(&ctx);
    }

    async fn run_stage(
        &self,
        stage: &StageDescriptor,
        ctx: &mut PipelineContext,
    ) -> Result<(), PipelineError> {
        self.progress.advance(&ctx.job_id, stage.start, stage.kind.label());
        debug!(start = stage.start, end = stage.end, "Stage started");

        match stage.kind {
            StageKind::SceneBreakdown => self.scene_breakdown(ctx).await?,
            StageKind::ImageGeneration => self.image_generation(stage, ctx).await?,
            StageKind::VoiceSynthesis => self.voice_synthesis(stage, ctx).await?,
            StageKind::MusicGeneration => self.music_generation(stage, ctx).await?,
            StageKind::VideoAssembly => self.video_assembly(stage, ctx).await?,
        }

        self.progress
            .advance(&ctx.job_id, stage.end, &format!("{} complete", stage.kind.label()));
        info!("Stage complete");
        Ok(())
    }

    async fn scene_breakdown(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if !ctx.scenes.is_empty() {
            info!(scenes = ctx.scenes.len(), "Reusing confirmed scene set");
            return Ok(());
        }

        let breakdown = self
            .breakdown
            .break_down(&ctx.story, &ctx.title, ctx.max_scenes)
            .await?;
        if breakdown.is_fallback() {
            warn!("Scene breakdown used fallback scenes");
        }

        let scenes = breakdown.into_scenes();
        validate_scene_set(&scenes, ctx.max_scenes)?;

        let stored = scenes.clone();
        let job = self
            .registry
            .apply(&ctx.job_id, Operation::RecordProgress, move |job| {
                job.scenes = stored;
                Ok(())
            })
            .map_err(|e| PipelineError::JobUnavailable(e.to_string()))?;
        self.collaborators.persist_job(&job);

        ctx.scenes = scenes;
        Ok(())
    }

    async fn image_generation(
        &self,
        stage: &StageDescriptor,
        ctx: &mut PipelineContext,
    ) -> Result<(), PipelineError> {
        if ctx.scenes.is_empty() {
            return Err(PipelineError::MissingInput {
                stage: StageKind::ImageGeneration,
                missing: "scenes",
            });
        }

        let total = ctx.scenes.len();
        for i in 0..total {
            let scene = &ctx.scenes[i];
            let prompt = self.settings.image_style.apply(&scene.image_prompt);
            let operation = format!("image generation (scene {})", scene.scene_number);
            let image = &self.collaborators.image;
            let prompt = prompt.as_str();

            let reference = retry_with_backoff(&self.settings.retry, &operation, move || {
                image.generate(prompt)
            })
            .await?;

            self.record_artifact(&ctx.job_id, stage, &reference)?;
            ctx.images.push(reference);

            let done = (i + 1) as f32 / total as f32;
            self.progress.advance(
                &ctx.job_id,
                stage.at(done),
                &format!("Generated image {} of {}", i + 1, total),
            );
        }

        Ok(())
    }

    async fn voice_synthesis(
        &self,
        stage: &StageDescriptor,
        ctx: &mut PipelineContext,
    ) -> Result<(), PipelineError> {
        let text = ctx.narration_text();
        let voice = &self.collaborators.voice;
        let voice_id = self.settings.voice_id.as_str();
        let text_ref = text.as_str();

        let reference = retry_with_backoff(&self.settings.retry, "voice synthesis", move || {
            voice.synthesize(text_ref, voice_id)
        })
        .await?;

        self.record_artifact(&ctx.job_id, stage, &reference)?;
        ctx.narration = Some(reference);
        Ok(())
    }

    async fn music_generation(
        &self,
        stage: &StageDescriptor,
        ctx: &mut PipelineContext,
    ) -> Result<(), PipelineError> {
        let music = &self.collaborators.music;
        let settings = &self.settings.music;
        let target = Duration::from_secs(
            settings
                .target_duration_secs
                .unwrap_or_else(|| ctx.total_duration_secs()),
        );

        let reference = retry_with_backoff(&self.settings.retry, "music generation", move || {
            music.generate(&settings.mood, &settings.style, target)
        })
        .await?;

        self.record_artifact(&ctx.job_id, stage, &reference)?;
        ctx.music = Some(reference);
        Ok(())
    }

    async fn video_assembly(
        &self,
        stage: &StageDescriptor,
        ctx: &mut PipelineContext,
    ) -> Result<(), PipelineError> {
        let narration = ctx.narration.as_ref().ok_or(PipelineError::MissingInput {
            stage: StageKind::VideoAssembly,
            missing: "narration",
        })?;
        let music_ref = ctx.music.as_ref().ok_or(PipelineError::MissingInput {
            stage: StageKind::VideoAssembly,
            missing: "music",
        })?;
        let durations: Vec<Duration> = ctx
            .scenes
            .iter()
            .map(|s| Duration::from_secs(u64::from(s.duration_secs)))
            .collect();

        let video = &self.collaborators.video;
        let images = ctx.images.as_slice();
        let durations = durations.as_slice();

        let reference = retry_with_backoff(&self.settings.retry, "video assembly", move || {
            video.assemble(images, narration, music_ref, durations)
        })
        .await?;

        self.record_artifact(&ctx.job_id, stage, &reference)?;
        ctx.video = Some(reference);
        Ok(())
    }

    /// Stores `reference` under the artifact kind `stage` produces.
    fn record_artifact(
        &self,
        job_id: &str,
        stage: &StageDescriptor,
        reference: &ArtifactRef,
    ) -> Result<(), PipelineError> {
        let kind = stage
            .kind
            .artifact_kind()
            .ok_or(PipelineError::NoArtifact(stage.kind))?;
        let stored = reference.clone();
        self.registry
            .apply(job_id, Operation::RecordProgress, move |job| {
                job.artifacts.record(kind, stored);
                Ok(())
            })
            .map_err(|e| PipelineError::JobUnavailable(e.to_string()))?;

        debug!(kind = %kind, reference = %reference, "Artifact recorded");
        self.collaborators.persist_artifact(job_id, kind, reference);
        Ok(())
    }

    fn complete(&self, ctx: &PipelineContext) {
        let elapsed = ctx.started.elapsed().as_secs_f64();
        let result = self
            .registry
            .apply(&ctx.job_id, Operation::CompleteGeneration, move |job| {
                job.completed_at = Some(Utc::now());
                job.total_processing_time = Some(elapsed);
                Ok(())
            });

        match result {
            Ok(job) => {
                self.progress.complete(&ctx.job_id);
                self.collaborators.persist_job(&job);
                info!(elapsed_secs = elapsed, "Generation completed");
            }
            Err(e) => {
                error!(error = %e, "Could not mark job completed");
                self.progress.fail(&ctx.job_id, &e.to_string());
            }
        }
    }

    fn fail(&self, ctx: &PipelineContext, reason: &str) {
        error!(reason, "Generation failed");
        let elapsed = ctx.started.elapsed().as_secs_f64();
        let stored = reason.to_string();
        let result = self
            .registry
            .apply(&ctx.job_id, Operation::FailGeneration, move |job| {
                job.failure_reason = Some(stored);
                job.completed_at = Some(Utc::now());
                job.total_processing_time = Some(elapsed);
                Ok(())
            });

        self.progress.fail(&ctx.job_id, reason);
        match result {
            Ok(job) => self.collaborators.persist_job(&job),
            Err(e) => error!(error = %e, "Could not mark job failed"),
        }
    }
}
