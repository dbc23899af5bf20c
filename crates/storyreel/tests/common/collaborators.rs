//! Scripted collaborators.
//!
//! Each one replays a queue of failures before succeeding, and counts every call.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use storyreel::collab::{
    ArtifactRef, CollaboratorError, ImageGenerator, MusicGenerator, PersistenceSink,
    TextGenerator, VideoAssembler, VoiceSynthesizer,
};
use storyreel::db::DatabaseError;
use storyreel::workflow::{ArtifactKind, ArtifactRefs, Job};
use storyreel::StoryEngine;

/// What the engine reported for the job when a stage collaborator was called.
#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub stage: &'static str,
    pub scenes: usize,
    pub artifacts: ArtifactRefs,
    pub percentage: f32,
}

/// Records the job's artifacts and progress each time a stage collaborator runs.
#[derive(Default)]
pub struct StageObserver {
    engine: OnceLock<StoryEngine>,
    snapshots: Mutex<Vec<StageSnapshot>>,
}

impl StageObserver {
    pub fn attach(&self, engine: StoryEngine) {
        let _ = self.engine.set(engine);
    }

    fn observe(&self, stage: &'static str) {
        let Some(engine) = self.engine.get() else {
            return;
        };
        for summary in engine.list_jobs() {
            let job = engine.get_job(&summary.id).unwrap();
            let percentage = engine
                .get_progress(&summary.id)
                .unwrap()
                .map(|p| p.percentage)
                .unwrap_or(0.0);
            self.snapshots.lock().unwrap().push(StageSnapshot {
                stage,
                scenes: job.scenes.len(),
                artifacts: job.artifacts.clone(),
                percentage,
            });
        }
    }

    /// First snapshot taken when `stage` was entered.
    pub fn first(&self, stage: &str) -> Option<StageSnapshot> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.stage == stage)
            .cloned()
    }
}

fn observe(observer: &Option<Arc<StageObserver>>, stage: &'static str) {
    if let Some(observer) = observer {
        observer.observe(stage);
    }
}

/// Call counter plus a queue of failures returned before the first success.
#[derive(Default)]
pub struct CallScript {
    failures: Mutex<VecDeque<CollaboratorError>>,
    calls: AtomicUsize,
}

impl CallScript {
    pub fn failing(failures: Vec<CollaboratorError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Records a call and returns its scripted failure, if any.
    fn next(&self) -> Result<usize, CollaboratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(n),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Replays queued responses, then keeps answering with `fallback`.
pub struct ScriptedText {
    responses: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    fallback: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    gate: Option<(usize, Arc<CallGate>)>,
}

/// Holds one scripted call open until the test releases it.
#[derive(Default)]
pub struct CallGate {
    entered: Notify,
    released: Notify,
}

impl CallGate {
    /// Waits until the gated call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

impl ScriptedText {
    pub fn new(responses: Vec<Result<String, CollaboratorError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: String::new(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Blocks call number `call` (zero-based) after it has taken its reply.
    pub fn with_gate(mut self, call: usize) -> (Self, Arc<CallGate>) {
        let gate = Arc::new(CallGate::default());
        self.gate = Some((call, Arc::clone(&gate)));
        (self, gate)
    }

    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn always(reply: &str) -> Self {
        let mut text = Self::new(vec![]);
        text.fallback = reply.to_string();
        text
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate(
        &self,
        prompt: &str,
        _system_directive: &str,
        _max_tokens: u32,
    ) -> Result<String, CollaboratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        if let Some((call, gate)) = &self.gate {
            if *call == n {
                gate.entered.notify_one();
                gate.released.notified().await;
            }
        }
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

#[derive(Default)]
pub struct ScriptedImage {
    pub script: CallScript,
    pub observer: Option<Arc<StageObserver>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedImage {
    pub fn failing(failures: Vec<CollaboratorError>) -> Self {
        Self {
            script: CallScript::failing(failures),
            observer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImage {
    async fn generate(&self, prompt: &str) -> Result<ArtifactRef, CollaboratorError> {
        observe(&self.observer, "image_generation");
        let n = self.script.next()?;
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(ArtifactRef::new(format!("test://image/{}", n)))
    }
}

#[derive(Default)]
pub struct ScriptedVoice {
    pub script: CallScript,
    pub observer: Option<Arc<StageObserver>>,
}

impl ScriptedVoice {
    pub fn failing(failures: Vec<CollaboratorError>) -> Self {
        Self {
            script: CallScript::failing(failures),
            observer: None,
        }
    }
}

#[async_trait]
impl VoiceSynthesizer for ScriptedVoice {
    async fn synthesize(
        &self,
        _text: &str,
        voice_id: &str,
    ) -> Result<ArtifactRef, CollaboratorError> {
        observe(&self.observer, "voice_synthesis");
        self.script.next()?;
        Ok(ArtifactRef::new(format!("test://audio/{}", voice_id)))
    }
}

#[derive(Default)]
pub struct ScriptedMusic {
    pub script: CallScript,
    pub observer: Option<Arc<StageObserver>>,
    durations: Mutex<Vec<Duration>>,
}

impl ScriptedMusic {
    pub fn durations(&self) -> Vec<Duration> {
        self.durations.lock().unwrap().clone()
    }
}

#[async_trait]
impl MusicGenerator for ScriptedMusic {
    async fn generate(
        &self,
        mood: &str,
        _style: &str,
        target_duration: Duration,
    ) -> Result<ArtifactRef, CollaboratorError> {
        observe(&self.observer, "music_generation");
        self.script.next()?;
        self.durations.lock().unwrap().push(target_duration);
        Ok(ArtifactRef::new(format!("test://music/{}", mood)))
    }
}

#[derive(Default)]
pub struct ScriptedVideo {
    pub script: CallScript,
    pub observer: Option<Arc<StageObserver>>,
    image_counts: Mutex<Vec<usize>>,
}

impl ScriptedVideo {
    pub fn image_counts(&self) -> Vec<usize> {
        self.image_counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoAssembler for ScriptedVideo {
    async fn assemble(
        &self,
        image_refs: &[ArtifactRef],
        _narration_ref: &ArtifactRef,
        _music_ref: &ArtifactRef,
        per_scene_durations: &[Duration],
    ) -> Result<ArtifactRef, CollaboratorError> {
        observe(&self.observer, "video_assembly");
        self.script.next()?;
        assert_eq!(image_refs.len(), per_scene_durations.len());
        self.image_counts.lock().unwrap().push(image_refs.len());
        Ok(ArtifactRef::new("test://video/final"))
    }
}

/// Persistence sink that always fails, for checking that failures stay contained.
pub struct BrokenSink;

impl PersistenceSink for BrokenSink {
    fn record_job(&self, _job: &Job) -> Result<(), DatabaseError> {
        Err(DatabaseError::LockPoisoned)
    }

    fn record_artifact(
        &self,
        _job_id: &str,
        _kind: ArtifactKind,
        _reference: &ArtifactRef,
    ) -> Result<(), DatabaseError> {
        Err(DatabaseError::LockPoisoned)
    }
}

/// An enhancement response in the structured form.
pub fn enhancement_json(story: &str, title: &str, scenes: usize) -> String {
    serde_json::json!({
        "enhanced_story": story,
        "story_title": title,
        "estimated_scenes": scenes,
        "enhancement_notes": ["Added a clear arc"],
    })
    .to_string()
}

/// A breakdown response with `n` well-formed scenes.
pub fn scenes_json(n: usize) -> String {
    let scenes: Vec<serde_json::Value> = (1..=n)
        .map(|i| {
            serde_json::json!({
                "scene_number": i,
                "description": format!("Scene {} description", i),
                "image_prompt": format!("Scene {} prompt", i),
            })
        })
        .collect();
    serde_json::json!({ "scenes": scenes }).to_string()
}
