//! Structured output extraction and validation for judge responses.
//!
//! A response is read in this order:
//! 1. The provider's structured (function-call) payload, when present.
//! 2. A fenced ```` ```json ```` block in the free text.
//! 3. The first balanced `{ ... }` substring in the free text.
//!
//! The extracted object is then validated against the schema of the
//! expected payload type. Every failure is a [`ParseError`] carrying a
//! truncated preview of the raw payload.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::domain::models::evaluation::{ChunkEvaluation, FinalEvaluation};
use crate::domain::ports::{JudgeResponse, ResponseSchema};

/// Maximum characters of raw payload kept in a [`ParseError`].
pub const PREVIEW_CHARS: usize = 500;

/// Observations must present as this many non-empty lines.
pub const OBSERVATION_LINES: std::ops::RangeInclusive<usize> = 2..=6;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```\s*json[ \t]*\r?\n?(.*?)```").expect("fenced block pattern is valid")
});

/// Why a judge response could not be turned into a payload
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no structured payload found in judge response")]
    NoPayload { preview: String },

    #[error("payload is not valid JSON: {message}")]
    InvalidJson { message: String, preview: String },

    #[error("missing required field `{field}`")]
    MissingField { field: &'static str, preview: String },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
        preview: String,
    },

    #[error("observations must contain 2-6 non-empty lines, found {lines}")]
    ObservationsLineCount { lines: usize, preview: String },
}

impl ParseError {
    /// Truncated raw payload the error was raised on.
    pub fn preview(&self) -> &str {
        match self {
            Self::NoPayload { preview }
            | Self::InvalidJson { preview, .. }
            | Self::MissingField { preview, .. }
            | Self::InvalidField { preview, .. }
            | Self::ObservationsLineCount { preview, .. } => preview,
        }
    }
}

/// Which payload shape a call expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Chunk,
    Final,
}

impl SchemaKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Chunk => "record_chunk_summary",
            Self::Final => "record_final_evaluation",
        }
    }

    /// Schema handed to the judge for this payload.
    pub fn schema(self) -> ResponseSchema {
        match self {
            Self::Chunk => ResponseSchema {
                name: self.name().to_string(),
                description: "Record a running summary of the trajectory so far".to_string(),
                json_schema: json!({
                    "type": "object",
                    "properties": {
                        "summary": {
                            "type": "string",
                            "description": "Running summary of what the user has done so far"
                        }
                    },
                    "required": ["summary"]
                }),
            },
            Self::Final => {
                let score = json!({ "type": "integer", "minimum": 0, "maximum": 100 });
                let text = json!({ "type": "string" });
                ResponseSchema {
                    name: self.name().to_string(),
                    description: "Record the final evaluation of the whole session".to_string(),
                    json_schema: json!({
                        "type": "object",
                        "properties": {
                            "summary": text,
                            "observations": {
                                "type": "string",
                                "description": "2 to 6 bullet points, one per line"
                            },
                            "reasoning": text,
                            "outcome_achievement": score,
                            "process_quality": score,
                            "efficiency": score,
                            "confidence": score,
                            "outcome_achievement_reasoning": text,
                            "process_quality_reasoning": text,
                            "efficiency_reasoning": text,
                            "confidence_reasoning": text
                        },
                        "required": FINAL_FIELDS
                    }),
                }
            }
        }
    }
}

const FINAL_FIELDS: [&str; 11] = [
    "summary",
    "observations",
    "reasoning",
    "outcome_achievement",
    "process_quality",
    "efficiency",
    "confidence",
    "outcome_achievement_reasoning",
    "process_quality_reasoning",
    "efficiency_reasoning",
    "confidence_reasoning",
];

/// A payload type the judge can be asked to produce
pub trait StructuredPayload: Sized + Send {
    const KIND: SchemaKind;

    /// Validate an already-extracted JSON object.
    fn from_value(value: &Value, preview: &str) -> Result<Self, ParseError>;
}

impl StructuredPayload for ChunkEvaluation {
    const KIND: SchemaKind = SchemaKind::Chunk;

    fn from_value(value: &Value, preview: &str) -> Result<Self, ParseError> {
        let fields = Fields::new(value, preview)?;
        Ok(Self {
            summary: fields.text("summary")?,
        })
    }
}

impl StructuredPayload for FinalEvaluation {
    const KIND: SchemaKind = SchemaKind::Final;

    fn from_value(value: &Value, preview: &str) -> Result<Self, ParseError> {
        let fields = Fields::new(value, preview)?;
        Ok(Self {
            summary: fields.text("summary")?,
            observations: fields.observations()?,
            reasoning: fields.text("reasoning")?,
            outcome_achievement: fields.score("outcome_achievement")?,
            process_quality: fields.score("process_quality")?,
            efficiency: fields.score("efficiency")?,
            confidence: fields.score("confidence")?,
            outcome_achievement_reasoning: fields.text("outcome_achievement_reasoning")?,
            process_quality_reasoning: fields.text("process_quality_reasoning")?,
            efficiency_reasoning: fields.text("efficiency_reasoning")?,
            confidence_reasoning: fields.text("confidence_reasoning")?,
        })
    }
}

/// Extract and validate a payload from a judge response.
pub fn parse_response<T: StructuredPayload>(response: &JudgeResponse) -> Result<T, ParseError> {
    if let Some(structured) = &response.structured {
        // Some providers deliver the arguments as a JSON-encoded string
        if let Value::String(raw) = structured {
            return parse_text(raw);
        }
        let preview = truncate_preview(&structured.to_string());
        return T::from_value(structured, &preview);
    }

    match &response.text {
        Some(text) => parse_text(text),
        None => Err(ParseError::NoPayload {
            preview: String::new(),
        }),
    }
}

/// Extract and validate a payload from free text.
pub fn parse_text<T: StructuredPayload>(text: &str) -> Result<T, ParseError> {
    let preview = truncate_preview(text);
    let candidate = extract_json_candidate(text).ok_or_else(|| ParseError::NoPayload {
        preview: preview.clone(),
    })?;
    let value: Value = serde_json::from_str(candidate).map_err(|e| ParseError::InvalidJson {
        message: e.to_string(),
        preview: preview.clone(),
    })?;
    T::from_value(&value, &preview)
}

/// Locate the JSON object in loosely formatted text.
///
/// A fenced `json` block wins when it contains an object; otherwise the first
/// balanced brace-delimited substring is returned. Braces inside JSON strings
/// are ignored.
pub fn extract_json_candidate(text: &str) -> Option<&str> {
    if let Some(inner) = FENCED_JSON.captures(text).and_then(|c| c.get(1)) {
        let fenced = inner.as_str().trim();
        if let Some(object) = first_balanced_object(fenced) {
            return Some(object);
        }
    }
    first_balanced_object(text)
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = match_braces(bytes, start) {
            return Some(&text[start..=end]);
        }
        search_from = start + 1;
    }
    None
}

/// Index of the brace closing the one at `start`, if any.
fn match_braces(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Truncate raw payload text for diagnostics, on a char boundary.
pub fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...[truncated]");
    preview
}

/// Count the non-empty lines of an observations block.
pub fn observation_line_count(observations: &str) -> usize {
    observations.lines().filter(|l| !l.trim().is_empty()).count()
}

/// Field accessor over a payload object. Accepts snake_case or camelCase keys.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    preview: &'a str,
}

impl<'a> Fields<'a> {
    fn new(value: &'a Value, preview: &'a str) -> Result<Self, ParseError> {
        match value {
            Value::Object(map) => Ok(Self { map, preview }),
            other => Err(ParseError::InvalidJson {
                message: format!("expected an object, found {}", json_type(other)),
                preview: preview.to_string(),
            }),
        }
    }

    fn get(&self, field: &'static str) -> Result<&'a Value, ParseError> {
        self.map
            .get(field)
            .or_else(|| self.map.get(&to_camel_case(field)))
            .filter(|v| !v.is_null())
            .ok_or_else(|| ParseError::MissingField {
                field,
                preview: self.preview.to_string(),
            })
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> ParseError {
        ParseError::InvalidField {
            field,
            reason: reason.into(),
            preview: self.preview.to_string(),
        }
    }

    fn text(&self, field: &'static str) -> Result<String, ParseError> {
        match self.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Value::String(_) => Err(self.invalid(field, "must not be empty")),
            other => Err(self.invalid(field, format!("expected a string, found {}", json_type(other)))),
        }
    }

    fn score(&self, field: &'static str) -> Result<u8, ParseError> {
        let value = self.get(field)?;
        let number = value
            .as_u64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| self.invalid(field, format!("expected an integer, found {value}")))?;
        if number > 100 {
            return Err(self.invalid(field, format!("{number} is outside 0-100")));
        }
        Ok(number as u8)
    }

    fn observations(&self) -> Result<String, ParseError> {
        let field = "observations";
        let text = match self.get(field)? {
            Value::String(s) => s.trim().to_string(),
            Value::Array(items) => {
                let mut lines = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) if !s.trim().is_empty() => {
                            lines.push(format!("- {}", s.trim()));
                        }
                        Value::String(_) => {}
                        other => {
                            return Err(self.invalid(
                                field,
                                format!("array items must be strings, found {}", json_type(other)),
                            ))
                        }
                    }
                }
                lines.join("\n")
            }
            other => {
                return Err(self.invalid(
                    field,
                    format!("expected a string or array, found {}", json_type(other)),
                ))
            }
        };

        let lines = observation_line_count(&text);
        if !OBSERVATION_LINES.contains(&lines) {
            return Err(ParseError::ObservationsLineCount {
                lines,
                preview: self.preview.to_string(),
            });
        }
        Ok(text)
    }
}

fn to_camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
