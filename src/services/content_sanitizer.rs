//! Sanitization of free text before it is placed in a judge prompt.
//!
//! Trajectory text comes from input logs, window titles and captions, any of
//! which can carry control characters or markup aimed at the judge. Every
//! text item and crop note passes through [`ContentSanitizer`] first.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::models::config::ChunkingConfig;

static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<\s*script\b[^>]*>.*?<\s*/\s*script\s*>").expect("script block pattern")
});

static SCRIPT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*/?\s*script\b[^>]*>").expect("script tag pattern"));

static DANGEROUS_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:javascript|vbscript)\s*:|\bdata\s*:\s*text/html[^\s]*")
        .expect("uri pattern")
});

static EVENT_HANDLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bon[a-z]+\s*=\s*["']?"#).expect("event handler pattern"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

const ELLIPSIS: &str = "...";

/// Strips control characters and injection patterns, collapses whitespace,
/// and caps length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentSanitizer {
    max_text_chars: usize,
    max_note_chars: usize,
}

impl Default for ContentSanitizer {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

impl ContentSanitizer {
    pub const fn new(max_text_chars: usize, max_note_chars: usize) -> Self {
        Self {
            max_text_chars,
            max_note_chars,
        }
    }

    pub const fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.max_text_chars, config.max_note_chars)
    }

    /// Sanitize a text item. Returns `None` when nothing meaningful is left.
    pub fn text(&self, raw: &str) -> Option<String> {
        sanitize(raw, self.max_text_chars)
    }

    /// Sanitize an image crop/context note.
    pub fn note(&self, raw: &str) -> Option<String> {
        sanitize(raw, self.max_note_chars)
    }

    /// Sanitize a judge-written summary. Summaries keep their full length.
    pub fn summary(&self, raw: &str) -> Option<String> {
        strip(raw)
    }
}

/// Full sanitization pass with an explicit length cap.
pub fn sanitize(raw: &str, max_chars: usize) -> Option<String> {
    strip(raw).map(|text| cap_length(&text, max_chars))
}

fn strip(raw: &str) -> Option<String> {
    let without_controls: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let stripped = SCRIPT_BLOCK.replace_all(&without_controls, " ");
    let stripped = SCRIPT_TAG.replace_all(&stripped, " ");
    let stripped = DANGEROUS_URI.replace_all(&stripped, " ");
    let stripped = EVENT_HANDLER.replace_all(&stripped, " ");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    let trimmed = collapsed.trim();

    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn cap_length(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut capped: String = text.chars().take(keep).collect();
    capped.truncate(capped.trim_end().len());
    capped.push_str(ELLIPSIS);
    capped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_control_characters() {
        let sanitizer = ContentSanitizer::default();
        assert_eq!(
            sanitizer.text("typed\u{0007}\u{001b}[31m hello\r\nworld").as_deref(),
            Some("typed [31m hello world")
        );
    }

    #[test]
    fn test_strips_script_blocks_and_uris() {
        let sanitizer = ContentSanitizer::default();
        let raw = r#"Clicked <script>alert("x")</script> link javascript:steal() and <a onclick="evil()">"#;
        let clean = sanitizer.text(raw).unwrap();
        assert!(!clean.contains("alert"));
        assert!(!clean.to_lowercase().contains("javascript:"));
        assert!(!clean.contains("onclick="));
        assert!(clean.starts_with("Clicked"));
    }

    #[test]
    fn test_strips_data_html_uri() {
        let clean = sanitize("open data:text/html;base64,PHNjcmlwdD4= now", 100).unwrap();
        assert_eq!(clean, "open now");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(sanitize("  a \t\t b \n\n c  ", 100).as_deref(), Some("a b c"));
    }

    #[test]
    fn test_caps_length() {
        let capped = sanitize(&"word ".repeat(100), 20).unwrap();
        assert!(capped.chars().count() <= 20);
        assert!(capped.ends_with("..."));
    }

    #[test]
    fn test_empty_after_sanitization() {
        assert_eq!(sanitize("<script>x</script>\u{0000}  ", 100), None);
    }

    #[test]
    fn test_summaries_are_stripped_but_not_capped() {
        let sanitizer = ContentSanitizer::new(20, 10);
        let raw = format!("<script>alert(1)</script>{}\u{0007}", "opened settings ".repeat(10));
        let summary = sanitizer.summary(&raw).unwrap();
        assert!(!summary.contains("script"));
        assert!(!summary.contains('\u{0007}'));
        assert_eq!(summary, "opened settings ".repeat(10).trim_end());
    }

    #[test]
    fn test_notes_use_note_cap() {
        let sanitizer = ContentSanitizer::new(1000, 10);
        let note = sanitizer.note("cropped around the settings dialog").unwrap();
        assert!(note.chars().count() <= 10);
    }
}
