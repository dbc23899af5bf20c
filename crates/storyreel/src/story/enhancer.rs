//! Expands a short user prompt into a full story with a title.

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::collab::TextGenerator;
use crate::error::Result;
use crate::pipeline::retry::{retry_with_backoff, RetryPolicy};
use crate::story::json::decode_lenient;
use crate::story::prompt::{build_enhancement_prompt, preview, ENHANCEMENT_SYSTEM_DIRECTIVE};
use crate::story::{validate_prompt, validate_scene_count};

const DEFAULT_TITLE: &str = "Enhanced Story";

static RE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)title["']?\s*:\s*["']([^"']+)["']"#).unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub max_scenes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedStory {
    pub original_prompt: String,
    pub enhanced_story: String,
    pub story_title: String,
    pub estimated_scenes: usize,
    pub enhancement_notes: Vec<String>,
    /// Seconds spent enhancing, retries included.
    pub processing_time: f64,
    /// Set when the response could not be decoded and the raw text was used instead.
    pub used_fallback: bool,
}

#[derive(Deserialize)]
struct RawEnhancement {
    enhanced_story: String,
    #[serde(default)]
    story_title: Option<String>,
    #[serde(default)]
    estimated_scenes: Option<usize>,
    #[serde(default)]
    enhancement_notes: Vec<String>,
}

/// Story fields derived from a collaborator response.
struct Enhancement {
    story: String,
    title: Option<String>,
    estimated_scenes: Option<usize>,
    notes: Vec<String>,
    used_fallback: bool,
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn interpret(raw: &str, original_prompt: &str) -> Enhancement {
    if let Some(decoded) = decode_lenient::<RawEnhancement>(raw) {
        if !decoded.enhanced_story.trim().is_empty() {
            return Enhancement {
                story: decoded.enhanced_story.trim().to_string(),
                title: non_blank(decoded.story_title.as_deref()),
                estimated_scenes: decoded.estimated_scenes,
                notes: decoded.enhancement_notes,
                used_fallback: false,
            };
        }
    }

    let trimmed = raw.trim();
    let title = RE_TITLE
        .captures(trimmed)
        .and_then(|c| non_blank(c.get(1).map(|m| m.as_str())));

    if trimmed.is_empty() {
        warn!("Empty enhancement response, keeping the original prompt");
        Enhancement {
            story: original_prompt.trim().to_string(),
            title,
            estimated_scenes: None,
            notes: vec!["No enhancement was returned; the original prompt is used as the story".into()],
            used_fallback: true,
        }
    } else {
        warn!("Unstructured enhancement response, using raw text as the story");
        Enhancement {
            story: trimmed.to_string(),
            title,
            estimated_scenes: None,
            notes: vec!["Used fallback enhancement because the response was not structured".into()],
            used_fallback: true,
        }
    }
}

pub struct PromptEnhancer {
    text: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    max_tokens: u32,
}

impl PromptEnhancer {
    pub fn new(text: Arc<dyn TextGenerator>, retry: RetryPolicy, max_tokens: u32) -> Self {
        Self {
            text,
            retry,
            max_tokens,
        }
    }

    /// Enhances `request.prompt` into a story.
    ///
    /// A title supplied by the caller always wins over a generated one.
    pub async fn enhance(&self, request: &EnhanceRequest) -> Result<EnhancedStory> {
        validate_prompt(&request.prompt)?;
        validate_scene_count(request.max_scenes)?;

        let started = Instant::now();
        info!("Enhancing prompt: {}", preview(&request.prompt));

        let caller_title = non_blank(request.title.as_deref());
        let prompt = build_enhancement_prompt(&request.prompt, caller_title.as_deref(), request.max_scenes);
        let text = &self.text;
        let prompt = prompt.as_str();
        let max_tokens = self.max_tokens;

        let raw = retry_with_backoff(&self.retry, "prompt enhancement", move || {
            text.generate(prompt, ENHANCEMENT_SYSTEM_DIRECTIVE, max_tokens)
        })
        .await?;

        let enhancement = interpret(&raw, &request.prompt);
        let story_title = caller_title
            .or(enhancement.title)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let estimated_scenes = enhancement
            .estimated_scenes
            .filter(|n| validate_scene_count(*n).is_ok())
            .unwrap_or(request.max_scenes);

        let processing_time = started.elapsed().as_secs_f64();
        info!(
            "Prompt enhancement completed in {:.2}s: '{}'",
            processing_time,
            preview(&story_title)
        );

        Ok(EnhancedStory {
            original_prompt: request.prompt.clone(),
            enhanced_story: enhancement.story,
            story_title,
            estimated_scenes,
            enhancement_notes: enhancement.notes,
            processing_time,
            used_fallback: enhancement.used_fallback,
        })
    }
}
