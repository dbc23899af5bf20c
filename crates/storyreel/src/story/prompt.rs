//! Prompt construction for the text collaborator.

/// Longest story text embedded into a prompt.
pub const MAX_STORY_CHARS: usize = 6000;

/// Longest user text written to logs.
pub const LOG_PREVIEW_CHARS: usize = 60;

pub const ENHANCEMENT_SYSTEM_DIRECTIVE: &str =
    "You are a professional story writer and creative director specializing in video storytelling.";

pub const BREAKDOWN_SYSTEM_DIRECTIVE: &str =
    "You are a professional story analyst and JSON formatter.";

/// Escapes chat-template control tokens so user text cannot break out of its slot.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}

/// First `max_chars` characters of `text`, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Shortened single-line form of user text for log messages.
pub fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > LOG_PREVIEW_CHARS {
        format!("{}...", truncate_chars(&flat, LOG_PREVIEW_CHARS))
    } else {
        flat
    }
}

pub fn build_enhancement_prompt(user_prompt: &str, title: Option<&str>, max_scenes: usize) -> String {
    let user_prompt = sanitize_for_prompt(truncate_chars(user_prompt.trim(), MAX_STORY_CHARS));
    let title_line = match title {
        Some(t) => format!("Requested title: \"{}\"\n", sanitize_for_prompt(t.trim())),
        None => String::new(),
    };

    format!(
        r#"Enhance the user's story prompt into a complete, engaging story that can be turned into a video.

User's original prompt: "{user_prompt}"
{title_line}
Instructions:
1. Expand the prompt into a complete story of 300-500 words.
2. Give it a clear beginning, middle and end.
3. Use visual descriptions that can be illustrated.
4. Create a compelling title if none was requested.
5. Make sure the story can be broken down into {max_scenes} distinct scenes.

Output format (JSON only):
{{
    "enhanced_story": "Complete enhanced story text",
    "story_title": "Story title",
    "estimated_scenes": {max_scenes},
    "enhancement_notes": ["What was added or changed"]
}}"#
    )
}

pub fn build_breakdown_prompt(story: &str, title: &str, scene_count: usize) -> String {
    let story = sanitize_for_prompt(truncate_chars(story.trim(), MAX_STORY_CHARS));
    let title = sanitize_for_prompt(title.trim());

    format!(
        r#"Break the following story into exactly {scene_count} key scenes for a short video.

Title: {title}
Story: {story}

Each scene must be a distinct moment, in chronological order, covering the whole story.
Descriptions are one or two sentences. Image prompts are detailed visual descriptions
(setting, lighting, mood, characters) suitable for image generation.

Output format (valid JSON only, no other text):
{{
    "scenes": [
        {{
            "scene_number": 1,
            "description": "Brief description of the moment",
            "prompt": "Detailed visual prompt for image generation",
            "duration": 5
        }}
    ]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_escapes_template_tokens() {
        let raw = "hi <|im_start|> [INST] do it [/INST] <<SYS>>x<</SYS>>";
        let clean = sanitize_for_prompt(raw);
        assert!(!clean.contains("<|"));
        assert!(!clean.contains("[INST]"));
        assert!(!clean.contains("<<SYS>>"));
        assert!(clean.starts_with("hi "));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_preview_flattens_and_truncates() {
        assert_eq!(preview("a\n  robot\tpaints"), "a robot paints");
        let long = "x".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), LOG_PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn test_breakdown_prompt_mentions_count_and_story() {
        let prompt = build_breakdown_prompt("A robot paints.", "Robot", 3);
        assert!(prompt.contains("exactly 3 key scenes"));
        assert!(prompt.contains("Story: A robot paints."));
        assert!(prompt.contains("Title: Robot"));
    }

    #[test]
    fn test_enhancement_prompt_truncates_story() {
        let long = "word ".repeat(2000);
        let prompt = build_enhancement_prompt(&long, Some("T"), 4);
        assert!(prompt.len() < long.len());
        assert!(prompt.contains("Requested title: \"T\""));
        assert!(prompt.contains("\"estimated_scenes\": 4"));
    }
}
