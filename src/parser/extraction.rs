//! Locating payloads inside free-form completion text.
//!
//! Models wrap their answers in markdown fences, prefix them with prose, or
//! stop mid-object. These helpers find the payload without interpreting it;
//! decoding and validation happen in the parent module.

use std::sync::OnceLock;

use regex::Regex;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```[ \t]*([A-Za-z0-9_+\-]*)(?:[^\n]*\n)?([\s\S]*?)```")
            .expect("fence pattern is valid")
    })
}

/// One fenced block found in completion text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// Language tag after the opening fence, lowercased. Empty when absent.
    pub lang: String,
    pub body: String,
}

/// Returns every closed fenced block, in order of appearance.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock> {
    fence_regex()
        .captures_iter(text)
        .map(|caps| FencedBlock {
            lang: caps
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default(),
            body: caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

/// Strips surrounding fence markers and language tags.
///
/// Returns the body of the first fenced block, or the trimmed text when no
/// closed fence exists. An unclosed opening fence is dropped as well, which
/// handles completions cut off before the closing marker.
pub fn strip_fences(text: &str) -> String {
    if let Some(block) = fenced_blocks(text).into_iter().next() {
        return block.body;
    }

    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Unclosed fence: drop the tag line.
        return match rest.find('\n') {
            Some(newline) => rest[newline + 1..].trim().to_string(),
            None => String::new(),
        };
    }
    trimmed.to_string()
}

/// Finds the index of the delimiter closing the one at the start of `s`.
///
/// String literals and escape sequences are skipped, so braces inside JSON
/// strings do not count.
pub fn find_matching_close(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Locates the first balanced JSON object or array embedded in `text`.
///
/// Used as a fallback when the fenced or trimmed text does not decode
/// directly, for example when the model adds prose around the payload.
pub fn locate_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let rest = &text[start..];
    let (open, close) = if rest.starts_with('{') {
        ('{', '}')
    } else {
        ('[', ']')
    };
    let end = find_matching_close(rest, open, close)?;
    Some(&rest[..=end])
}

/// Reports whether `text` opens a JSON structure that never closes.
pub fn looks_truncated(text: &str) -> bool {
    let mut braces: isize = 0;
    let mut brackets: isize = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut opened = false;

    for c in text.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                opened = true;
                braces += 1;
            }
            '}' if !in_string => braces -= 1,
            '[' if !in_string => {
                opened = true;
                brackets += 1;
            }
            ']' if !in_string => brackets -= 1,
            _ => {}
        }
    }

    opened && (braces > 0 || brackets > 0 || in_string)
}

/// Shortened view of raw text for log lines.
pub fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
