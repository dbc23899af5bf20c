//! Engine wired to scripted collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use storyreel::collab::{Collaborators, PersistenceSink};
use storyreel::{Config, EnhanceRequest, StoryEngine};

use super::collaborators::*;

pub const ROBOT_PROMPT: &str = "A robot learns to paint and discovers creativity.";

/// Config with short delays, suitable for real-time tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.retry.base_delay_ms = 20;
    config.workflow.poll_interval_ms = 10;
    config
}

pub struct TestHarness {
    pub engine: StoryEngine,
    pub text: Arc<ScriptedText>,
    pub image: Arc<ScriptedImage>,
    pub voice: Arc<ScriptedVoice>,
    pub music: Arc<ScriptedMusic>,
    pub video: Arc<ScriptedVideo>,
}

pub struct HarnessBuilder {
    config: Config,
    text: ScriptedText,
    image: ScriptedImage,
    voice: ScriptedVoice,
    persistence: Option<Arc<dyn PersistenceSink>>,
    observer: Option<Arc<StageObserver>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            text: ScriptedText::always(""),
            image: ScriptedImage::default(),
            voice: ScriptedVoice::default(),
            persistence: None,
            observer: None,
        }
    }

    pub fn config(mut self, edit: impl FnOnce(&mut Config)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn text(mut self, text: ScriptedText) -> Self {
        self.text = text;
        self
    }

    pub fn image(mut self, image: ScriptedImage) -> Self {
        self.image = image;
        self
    }

    pub fn voice(mut self, voice: ScriptedVoice) -> Self {
        self.voice = voice;
        self
    }

    pub fn persistence(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.persistence = Some(sink);
        self
    }

    /// Lets every media collaborator report the job state it sees when called.
    pub fn observer(mut self, observer: Arc<StageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(mut self) -> TestHarness {
        let mut music = ScriptedMusic::default();
        let mut video = ScriptedVideo::default();
        if let Some(observer) = &self.observer {
            self.image.observer = Some(Arc::clone(observer));
            self.voice.observer = Some(Arc::clone(observer));
            music.observer = Some(Arc::clone(observer));
            video.observer = Some(Arc::clone(observer));
        }

        let text = Arc::new(self.text);
        let image = Arc::new(self.image);
        let voice = Arc::new(self.voice);
        let music = Arc::new(music);
        let video = Arc::new(video);

        let mut collaborators = Collaborators::placeholder()
            .with_text(text.clone())
            .with_image(image.clone())
            .with_voice(voice.clone())
            .with_music(music.clone())
            .with_video(video.clone());
        if let Some(sink) = self.persistence {
            collaborators = collaborators.with_persistence(sink);
        }

        let engine = StoryEngine::new(self.config, collaborators).expect("valid test config");
        if let Some(observer) = &self.observer {
            observer.attach(engine.clone());
        }

        TestHarness {
            engine,
            text,
            image,
            voice,
            music,
            video,
        }
    }
}

impl TestHarness {
    pub fn new() -> Self {
        HarnessBuilder::new().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    /// Creates a job and enhances `prompt` so that it waits for confirmation.
    pub async fn enhanced_job(&self, prompt: &str, max_scenes: usize) -> String {
        let id = self.engine.create_job();
        self.engine
            .enhance(
                &id,
                EnhanceRequest {
                    prompt: prompt.to_string(),
                    title: None,
                    max_scenes,
                },
            )
            .await
            .expect("enhance should succeed");
        id
    }
}
