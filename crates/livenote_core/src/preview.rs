//! Plain-text projections of rich note content.
//!
//! # Responsibility
//! - Derive sidebar previews (`preview_text`, `preview_image`) from editor
//!   markup.
//! - Derive editor status-bar statistics (words, characters, reading time).
//!
//! # Invariants
//! - Outputs are plain text; markup never passes through. Script and style
//!   bodies are dropped entirely.
//! - Decoded text may contain `<` or `&`; views must render it as text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const PREVIEW_MAX_CHARS: usize = 100;
const READING_WORDS_PER_MINUTE: usize = 225;

static SCRIPT_STYLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:script|style)\b[^>]*>.*?</(?:script|style)\s*>")
        .expect("valid script/style regex")
});
static IMAGE_SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid image regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").expect("valid entity regex")
});
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Sidebar preview projection for one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotePreview {
    /// Sanitized summary text, at most 100 chars.
    pub preview_text: Option<String>,
    /// First `<img src>` in the content.
    pub preview_image: Option<String>,
}

/// Status-bar statistics for one note body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStats {
    pub words: usize,
    pub characters: usize,
    /// Estimated reading time, never below one minute.
    pub reading_minutes: usize,
}

/// Converts editor markup into normalized plain text.
pub fn plain_text(content: &str) -> String {
    let without_blocks = SCRIPT_STYLE_RE.replace_all(content, " ");
    let without_tags = TAG_RE.replace_all(&without_blocks, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Derives the sidebar preview from rich note content.
pub fn derive_note_preview(content: &str) -> NotePreview {
    let preview_image = IMAGE_SRC_RE
        .captures(content)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|value| !value.is_empty());

    let text = plain_text(content);
    let preview_text = if text.is_empty() {
        None
    } else {
        Some(text.chars().take(PREVIEW_MAX_CHARS).collect())
    };

    NotePreview {
        preview_text,
        preview_image,
    }
}

/// Counts words and characters of the rendered text.
pub fn content_stats(content: &str) -> ContentStats {
    let text = plain_text(content);
    let words = text.split_whitespace().count();
    ContentStats {
        words,
        characters: text.chars().count(),
        reading_minutes: words.div_ceil(READING_WORDS_PER_MINUTE).max(1),
    }
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let body = &caps[1];
            decode_entity(body).map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn decode_entity(body: &str) -> Option<char> {
    if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(decimal) = body.strip_prefix('#') {
        return decimal.parse::<u32>().ok().and_then(char::from_u32);
    }
    match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => None,
    }
}
