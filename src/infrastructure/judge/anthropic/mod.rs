//! Anthropic Messages API adapter for the [`JudgeClient`](crate::domain::ports::JudgeClient) port.

pub mod client;
pub mod types;

pub use client::AnthropicJudge;
