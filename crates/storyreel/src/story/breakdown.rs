//! Scene breakdown: story text in, exactly N scenes out.
//!
//! The text collaborator is asked for a structured scene list. Whatever it returns is
//! interpreted without failing: unusable output is replaced by scenes synthesized from
//! the story itself, and the list is then padded or truncated to the requested count.
//! The only errors are input validation and collaborator unavailability.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::collab::TextGenerator;
use crate::error::{Result, ValidationError};
use crate::pipeline::retry::{retry_with_backoff, RetryPolicy};
use crate::story::fallback::{fallback_scenes, filler};
use crate::story::json::decode_lenient;
use crate::story::prompt::{build_breakdown_prompt, preview, BREAKDOWN_SYSTEM_DIRECTIVE};
use crate::story::{validate_scene_count, validate_story};
use crate::workflow::job::Scene;

const UNTITLED: &str = "Untitled Story";

/// A scene before numbering and timing are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneDraft {
    pub description: String,
    pub image_prompt: String,
}

/// Breakdown result, tagged with whether the scenes came from the collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Breakdown {
    /// Decoded from the collaborator's response (possibly padded or truncated).
    Decoded(Vec<Scene>),
    /// Synthesized from the story text because the response was unusable.
    Fallback(Vec<Scene>),
}

impl Breakdown {
    pub fn scenes(&self) -> &[Scene] {
        match self {
            Breakdown::Decoded(scenes) | Breakdown::Fallback(scenes) => scenes,
        }
    }

    pub fn into_scenes(self) -> Vec<Scene> {
        match self {
            Breakdown::Decoded(scenes) | Breakdown::Fallback(scenes) => scenes,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Breakdown::Fallback(_))
    }
}

#[derive(Deserialize)]
struct RawScene {
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "image_prompt")]
    prompt: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBreakdown {
    Wrapped { scenes: Vec<RawScene> },
    Bare(Vec<RawScene>),
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Decodes the collaborator response into drafts.
///
/// Returns `None` when nothing decodes, the list is empty, or any scene lacks a
/// description or image prompt.
pub fn decode_scenes(raw: &str) -> Option<Vec<SceneDraft>> {
    let decoded: RawBreakdown = decode_lenient(raw)?;
    let raw_scenes = match decoded {
        RawBreakdown::Wrapped { scenes } | RawBreakdown::Bare(scenes) => scenes,
    };

    if raw_scenes.is_empty() {
        return None;
    }

    raw_scenes
        .into_iter()
        .map(|s| {
            Some(SceneDraft {
                description: non_blank(s.description)?,
                image_prompt: non_blank(s.prompt)?,
            })
        })
        .collect()
}

/// Truncates or pads `drafts` to exactly `count` entries. Order is preserved.
pub fn reconcile(mut drafts: Vec<SceneDraft>, count: usize) -> Vec<SceneDraft> {
    if drafts.len() > count {
        debug!("Truncating {} scenes to {}", drafts.len(), count);
        drafts.truncate(count);
        return drafts;
    }

    let missing = count - drafts.len();
    if missing > 0 {
        debug!("Padding {} scenes with {} filler scenes", drafts.len(), missing);
        let last = drafts.last().cloned();
        drafts.extend((1..=missing).map(|k| filler(last.as_ref(), k)));
    }
    drafts
}

fn number_scenes(drafts: Vec<SceneDraft>, duration_secs: u32) -> Vec<Scene> {
    drafts
        .into_iter()
        .zip(1u32..)
        .map(|(draft, scene_number)| Scene {
            scene_number,
            description: draft.description,
            image_prompt: draft.image_prompt,
            duration_secs,
        })
        .collect()
}

/// Checks a scene set before it replaces a job's stored scenes.
pub fn validate_scene_set(scenes: &[Scene], count: usize) -> std::result::Result<(), ValidationError> {
    if scenes.len() != count {
        return Err(ValidationError::InvalidSceneSet(format!(
            "expected {} scenes, got {}",
            count,
            scenes.len()
        )));
    }

    for (i, scene) in scenes.iter().enumerate() {
        let expected = i as u32 + 1;
        if scene.scene_number != expected {
            return Err(ValidationError::InvalidSceneSet(format!(
                "scene at position {} is numbered {}",
                expected, scene.scene_number
            )));
        }
        if scene.description.trim().is_empty() || scene.image_prompt.trim().is_empty() {
            return Err(ValidationError::InvalidSceneSet(format!(
                "scene {} is missing a description or image prompt",
                expected
            )));
        }
    }

    Ok(())
}

pub struct SceneBreakdownProcessor {
    text: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    max_tokens: u32,
    duration_secs: u32,
}

impl SceneBreakdownProcessor {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        retry: RetryPolicy,
        max_tokens: u32,
        duration_secs: u32,
    ) -> Self {
        Self {
            text,
            retry,
            max_tokens,
            duration_secs,
        }
    }

    /// Breaks `story` into exactly `count` scenes.
    ///
    /// Input is validated before the collaborator is called. Collaborator failures
    /// that survive the retry policy are returned as `Upstream` errors; problems with
    /// the response content never are.
    pub async fn break_down(&self, story: &str, title: &str, count: usize) -> Result<Breakdown> {
        validate_story(story)?;
        validate_scene_count(count)?;

        let title = match title.trim() {
            "" => UNTITLED,
            t => t,
        };
        info!("Breaking down story '{}' into {} scenes", preview(title), count);

        let prompt = build_breakdown_prompt(story, title, count);
        let text = &self.text;
        let prompt = prompt.as_str();
        let max_tokens = self.max_tokens;

        let raw = retry_with_backoff(&self.retry, "scene breakdown", move || {
            text.generate(prompt, BREAKDOWN_SYSTEM_DIRECTIVE, max_tokens)
        })
        .await?;

        Ok(self.interpret(story, &raw, count))
    }

    /// Turns a raw collaborator response into exactly `count` scenes. Never fails.
    pub fn interpret(&self, story: &str, raw: &str, count: usize) -> Breakdown {
        match decode_scenes(raw) {
            Some(drafts) => {
                if drafts.len() != count {
                    warn!("Collaborator returned {} scenes, requested {}", drafts.len(), count);
                }
                Breakdown::Decoded(number_scenes(reconcile(drafts, count), self.duration_secs))
            }
            None => {
                if raw.trim().is_empty() {
                    warn!("Empty scene breakdown response, using fallback scenes");
                } else {
                    warn!(
                        "Unusable scene breakdown response ({}), using fallback scenes",
                        preview(raw)
                    );
                }
                let drafts = fallback_scenes(story, count);
                Breakdown::Fallback(number_scenes(reconcile(drafts, count), self.duration_secs))
            }
        }
    }
}
