//! Story text processing: prompt enhancement and scene breakdown.

pub mod breakdown;
pub mod enhancer;
pub mod fallback;
pub mod json;
pub mod prompt;

pub use breakdown::{Breakdown, SceneBreakdownProcessor, SceneDraft};
pub use enhancer::{EnhanceRequest, EnhancedStory, PromptEnhancer};

use crate::error::ValidationError;

pub const MIN_SCENES: usize = 2;
pub const MAX_SCENES: usize = 6;
/// Minimum trimmed length, in characters, of story text and prompts.
pub const MIN_TEXT_CHARS: usize = 10;

pub fn validate_scene_count(count: usize) -> Result<(), ValidationError> {
    if !(MIN_SCENES..=MAX_SCENES).contains(&count) {
        return Err(ValidationError::SceneCountOutOfRange {
            requested: count,
            min: MIN_SCENES,
            max: MAX_SCENES,
        });
    }
    Ok(())
}

pub fn validate_story(story: &str) -> Result<(), ValidationError> {
    let actual = story.trim().chars().count();
    if actual < MIN_TEXT_CHARS {
        return Err(ValidationError::StoryTooShort {
            min: MIN_TEXT_CHARS,
            actual,
        });
    }
    Ok(())
}

pub fn validate_prompt(prompt: &str) -> Result<(), ValidationError> {
    let actual = prompt.trim().chars().count();
    if actual < MIN_TEXT_CHARS {
        return Err(ValidationError::PromptTooShort {
            min: MIN_TEXT_CHARS,
            actual,
        });
    }
    Ok(())
}
