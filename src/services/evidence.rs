//! Evidence-marker heuristic over the judge's narrative.
//!
//! A marker is any textual pattern that suggests a claim is tied to something
//! observable: a bullet point, a reference to a screenshot or frame, a
//! timestamp, quoted on-screen text, or a concrete UI action verb.

use once_cell::sync::Lazy;
use regex::Regex;

static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*•]|\d+[.)])\s+\S").expect("bullet pattern"));

static VISUAL_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:screenshots?|frames?|screens?|window|dialog|button|menu)\b")
        .expect("visual reference pattern")
});

static TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?\b").expect("timestamp pattern"));

static QUOTED_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"\n]{2,80}"|“[^”\n]{2,80}”"#).expect("quoted text pattern"));

static ACTION_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:click(?:ed|s|ing)?|typed?|typing|scroll(?:ed|s|ing)?|open(?:ed|s|ing)?|select(?:ed|s|ing)?|navigat(?:ed|es|ing)|press(?:ed|es|ing)?|dragg?(?:ed|ing)?|enter(?:ed|s|ing)?|sav(?:ed|es|ing))\b",
    )
    .expect("action verb pattern")
});

/// Count evidence markers across `text`.
pub fn count_evidence_markers(text: &str) -> usize {
    [&*BULLET, &*VISUAL_REFERENCE, &*TIMESTAMP, &*QUOTED_TEXT, &*ACTION_VERB]
        .iter()
        .map(|pattern| pattern.find_iter(text).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_prose_has_no_markers() {
        assert_eq!(count_evidence_markers("The task seems fine overall."), 0);
    }

    #[test]
    fn test_counts_each_kind() {
        assert_eq!(count_evidence_markers("- done"), 1);
        assert_eq!(count_evidence_markers("the screenshot"), 1);
        assert_eq!(count_evidence_markers("at 01:23"), 1);
        assert_eq!(count_evidence_markers(r#"label "Dark mode""#), 1);
        assert_eq!(count_evidence_markers("user clicked"), 1);
    }

    #[test]
    fn test_rich_narrative() {
        let text = "- User clicked \"Appearance\" at 00:42\n- The screenshot shows Dark active\n";
        // two bullets, clicked, quote, timestamp, screenshot
        assert_eq!(count_evidence_markers(text), 6);
    }
}
