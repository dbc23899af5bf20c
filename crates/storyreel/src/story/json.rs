//! Locating structured blocks inside free-form model output.

use serde::de::DeserializeOwned;

/// Returns the balanced `{...}` or `[...]` block opening at byte offset `start`, if
/// it closes.
///
/// Brackets inside string literals and escaped quotes are ignored.
fn balanced_block(text: &str, start: usize) -> Option<&str> {
    let (open, close) = match text[start..].chars().next()? {
        '{' => ('{', '}'),
        '[' => ('[', ']'),
        _ => return None,
    };
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Decodes `raw` as `T`, first directly and then from the first balanced `{...}`
/// or `[...]` block that decodes successfully, in order of appearance.
pub fn decode_lenient<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Some(value);
    }

    trimmed
        .match_indices(['{', '['])
        .filter_map(|(start, _)| balanced_block(trimmed, start))
        .find_map(|block| serde_json::from_str::<T>(block).ok())
}
