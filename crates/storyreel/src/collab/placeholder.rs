//! Offline collaborators used by the demo binary and tests.
//!
//! References have the form `placeholder://<kind>/<digest>` where the digest is derived
//! from the request, so identical inputs map to identical references.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    ArtifactRef, CollaboratorError, ImageGenerator, MusicGenerator, TextGenerator,
    VideoAssembler, VoiceSynthesizer,
};

fn digest<T: Hash + ?Sized>(value: &T) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn placeholder_ref(kind: &str, digest: String) -> ArtifactRef {
    ArtifactRef::new(format!("placeholder://{}/{}", kind, digest))
}

/// Returns an empty completion for every request, which routes callers through their
/// fallback parsing.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderTextGenerator;

#[async_trait]
impl TextGenerator for PlaceholderTextGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _system_directive: &str,
        _max_tokens: u32,
    ) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderImageGenerator;

#[async_trait]
impl ImageGenerator for PlaceholderImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<ArtifactRef, CollaboratorError> {
        Ok(placeholder_ref("image", digest(prompt)))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderVoiceSynthesizer;

#[async_trait]
impl VoiceSynthesizer for PlaceholderVoiceSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<ArtifactRef, CollaboratorError> {
        if voice_id.trim().is_empty() {
            return Err(CollaboratorError::Other("voice id must not be empty".into()));
        }
        Ok(placeholder_ref("audio", digest(&(voice_id, text))))
    }
}

/// Music placeholder that resolves the requested mood to a track description.
#[derive(Debug, Clone)]
pub struct PlaceholderMusicGenerator {
    moods: HashMap<&'static str, &'static str>,
}

impl PlaceholderMusicGenerator {
    pub fn new() -> Self {
        let moods = HashMap::from([
            ("adventurous", "Epic, action-packed orchestral music"),
            ("peaceful", "Calm, serene ambient music"),
            ("mysterious", "Dark, mysterious atmospheric music"),
            ("happy", "Upbeat, cheerful melodic music"),
            ("dramatic", "Intense, emotional cinematic music"),
            ("romantic", "Gentle, romantic orchestral music"),
        ]);
        Self { moods }
    }

    /// Track description for a mood. Unknown moods fall back to the adventurous track.
    pub fn describe(&self, mood: &str) -> &'static str {
        self.moods
            .get(mood.to_lowercase().as_str())
            .copied()
            .unwrap_or("Epic, action-packed orchestral music")
    }
}

impl Default for PlaceholderMusicGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MusicGenerator for PlaceholderMusicGenerator {
    async fn generate(
        &self,
        mood: &str,
        style: &str,
        target_duration: Duration,
    ) -> Result<ArtifactRef, CollaboratorError> {
        let description = self.describe(mood);
        log::debug!(
            "Placeholder music: {} ({}, {}s)",
            description,
            style,
            target_duration.as_secs()
        );
        Ok(placeholder_ref(
            "music",
            digest(&(description, style, target_duration.as_secs())),
        ))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderVideoAssembler;

#[async_trait]
impl VideoAssembler for PlaceholderVideoAssembler {
    async fn assemble(
        &self,
        image_refs: &[ArtifactRef],
        narration_ref: &ArtifactRef,
        music_ref: &ArtifactRef,
        per_scene_durations: &[Duration],
    ) -> Result<ArtifactRef, CollaboratorError> {
        if image_refs.len() != per_scene_durations.len() {
            return Err(CollaboratorError::Other(format!(
                "{} images but {} scene durations",
                image_refs.len(),
                per_scene_durations.len()
            )));
        }

        let parts: Vec<&str> = image_refs
            .iter()
            .chain([narration_ref, music_ref])
            .map(ArtifactRef::as_str)
            .collect();
        Ok(placeholder_ref("video", digest(&parts)))
    }
}
