use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::errors::BoxError;
use crate::domain::models::metrics::TokenUsage;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Provider-neutral content part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text { text: String },
    Image { media_type: String, data: Arc<[u8]> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Role-tagged message sent to the judge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl JudgeMessage {
    pub const fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

/// Shape the judge is asked to fill in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSchema {
    /// Function/tool name the payload is requested under
    pub name: String,
    pub description: String,
    /// JSON Schema of the payload
    pub json_schema: serde_json::Value,
}

/// Deterministic sampling directive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub seed: u64,
}

impl Sampling {
    /// Temperature 0 with a fixed seed.
    pub const fn deterministic(seed: u64) -> Self {
        Self {
            temperature: 0.0,
            seed,
        }
    }
}

/// A single structured-evaluation request
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<JudgeMessage>,
    pub schema: ResponseSchema,
    pub sampling: Sampling,
    pub max_tokens: u32,
}

/// What the judge returned
///
/// Providers that support function calling fill `structured`; others return
/// free text which is scanned for a JSON payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JudgeResponse {
    pub id: String,
    pub structured: Option<serde_json::Value>,
    pub text: Option<String>,
    pub usage: TokenUsage,
}

/// Opaque failure reported by a judge client, before classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct JudgeCallError {
    pub message: String,
    /// HTTP-like status code, when the failure came from a response
    pub status: Option<u16>,
    /// Raw `retry-after` hint: seconds or an HTTP date
    pub retry_after: Option<String>,
    /// Raw `retry-after-ms` hint
    pub retry_after_ms: Option<String>,
    /// The call was cancelled before completing
    pub aborted: bool,
    #[source]
    pub source: Option<BoxError>,
}

impl JudgeCallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            retry_after: None,
            retry_after_ms: None,
            aborted: false,
            source: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            aborted: true,
            ..Self::new(message)
        }
    }

    #[must_use]
    pub fn retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    #[must_use]
    pub fn retry_after_ms(mut self, value: impl Into<String>) -> Self {
        self.retry_after_ms = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Port trait for the LLM judge
///
/// Implementations submit one structured-evaluation request and report the
/// raw outcome. They do not retry, rate limit or enforce deadlines; the
/// retry orchestrator owns all of that.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    async fn submit(&self, request: JudgeRequest) -> Result<JudgeResponse, JudgeCallError>;
}
