//! Port trait definitions (Hexagonal Architecture)
//!
//! Capabilities the grading engine depends on, injected at construction:
//! - JudgeClient: submit one structured evaluation to an LLM judge
//! - ProgrammaticGrader: optional rule-based checks over the trajectory
//! - MetricsHook: optional per-request observability sink
//! - Logger: structured logging with redaction

pub mod judge_client;
pub mod logger;
pub mod metrics_hook;
pub mod programmatic_grader;

pub use judge_client::{
    ContentPart, JudgeCallError, JudgeClient, JudgeMessage, JudgeRequest, JudgeResponse,
    ResponseSchema, Role, Sampling,
};
pub use logger::{Level, LogMeta, Logger};
pub use metrics_hook::MetricsHook;
pub use programmatic_grader::ProgrammaticGrader;
