//! Deterministic scene synthesis used when the text collaborator's output is unusable.

use std::sync::LazyLock;

use regex::Regex;

use super::breakdown::SceneDraft;
use super::prompt::truncate_chars;

const DESCRIPTION_CHARS: usize = 100;

// A run of non-terminators followed by any terminators.
static RE_SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());

/// Splits text into trimmed, non-empty sentences ending at `.`, `!` or `?`.
pub fn split_sentences(text: &str) -> Vec<&str> {
    RE_SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| s.chars().any(|c| c.is_alphanumeric()))
        .collect()
}

/// Groups `sentences` into at most `count` contiguous segments of near-equal size.
/// Earlier segments absorb the remainder.
pub fn segment(sentences: &[&str], count: usize) -> Vec<String> {
    if sentences.is_empty() || count == 0 {
        return Vec::new();
    }

    let groups = count.min(sentences.len());
    let base = sentences.len() / groups;
    let remainder = sentences.len() % groups;

    let mut segments = Vec::with_capacity(groups);
    let mut start = 0;
    for i in 0..groups {
        let len = base + usize::from(i < remainder);
        segments.push(sentences[start..start + len].join(" "));
        start += len;
    }
    segments
}

fn scene_from_segment(segment: &str) -> SceneDraft {
    let description = if segment.chars().count() > DESCRIPTION_CHARS {
        format!("{}...", truncate_chars(segment, DESCRIPTION_CHARS))
    } else {
        segment.to_string()
    };

    SceneDraft {
        description,
        image_prompt: format!("Illustration of {}, cinematic composition", segment),
    }
}

/// Builds up to `count` scenes straight from the story text.
///
/// Returns fewer than `count` scenes when the story has fewer sentences; callers pad
/// the result with [`filler`].
pub fn fallback_scenes(story: &str, count: usize) -> Vec<SceneDraft> {
    let sentences = split_sentences(story);
    let trimmed = story.trim();

    let segments = if sentences.is_empty() && !trimmed.is_empty() {
        vec![trimmed.to_string()]
    } else {
        segment(&sentences, count)
    };

    segments.iter().map(|s| scene_from_segment(s)).collect()
}

/// The `k`th (1-based) filler scene continuing from `last`.
pub fn filler(last: Option<&SceneDraft>, k: usize) -> SceneDraft {
    match last {
        Some(last) => SceneDraft {
            description: format!("{} (continued {})", last.description, k),
            image_prompt: format!("{}, continuation {}", last.image_prompt, k),
        },
        None => SceneDraft {
            description: format!("Scene {} of the story (continued {})", k, k),
            image_prompt: format!("Illustration of the story, continuation {}", k),
        },
    }
}
