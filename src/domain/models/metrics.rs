//! Per-call request metrics emitted to a `MetricsHook`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::evaluation::ScoreAudit;

/// Token usage reported by the judge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub const fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Timing of one judge call including its retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTiming {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub retry_count: u32,
    pub retry_delays_ms: Vec<u64>,
}

impl RequestTiming {
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

/// What the call belonged to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub session_id: String,
    /// Window index; `None` for the final aggregation call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    pub is_final: bool,
    pub model: String,
}

impl CallContext {
    pub fn chunk(session_id: impl Into<String>, chunk_index: usize, model: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            chunk_index: Some(chunk_index),
            is_final: false,
            model: model.into(),
        }
    }

    pub fn final_call(session_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            chunk_index: None,
            is_final: true,
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Success,
    PermanentError,
    TransientError,
    Timeout,
}

impl RequestOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PermanentError => "permanent_error",
            Self::TransientError => "transient_error",
            Self::Timeout => "timeout",
        }
    }
}

/// Error descriptor attached to failed outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// One record per judge call outcome, or one synthetic score-audit record per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    pub usage: TokenUsage,
    pub timing: RequestTiming,
    pub context: CallContext,
    pub outcome: RequestOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_audit: Option<ScoreAudit>,
}

impl RequestMetrics {
    pub const fn is_score_audit(&self) -> bool {
        self.score_audit.is_some()
    }
}
