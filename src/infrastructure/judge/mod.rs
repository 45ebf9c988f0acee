//! Judge-call reliability layer and provider adapters.
//!
//! - Token-bucket rate limiting shared by every in-flight call
//! - Error classification into the [`GraderError`](crate::domain::errors::GraderError) taxonomy
//! - Structured output extraction and validation
//! - Retry orchestration with per-attempt deadlines and metrics
//! - The Anthropic Messages API adapter

pub mod anthropic;
pub mod error_classifier;
pub mod rate_limiter;
pub mod retry;
pub mod structured_output;

pub use anthropic::AnthropicJudge;
pub use error_classifier::{classify, parse_retry_after, AttemptFailure};
pub use rate_limiter::{RateLimiterStats, TokenBucketRateLimiter};
pub use retry::{JudgePrompt, RetryDecision, RetryOrchestrator, RetryPolicy};
pub use structured_output::{
    extract_json_candidate, parse_response, parse_text, ParseError, SchemaKind, StructuredPayload,
};
