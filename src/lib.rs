//! Arbiter - Trajectory Grading Engine
//!
//! Arbiter grades recorded computer-use trajectories. Each trajectory is split
//! into windows that an LLM judge summarizes in order; a final judge call turns
//! the summaries into component scores, and a deterministic scorer converts
//! those into a calibrated, auditable grade.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, the error taxonomy and port traits
//! - **Infrastructure Layer** (`infrastructure`): judge reliability layer,
//!   Anthropic adapter, configuration, logging and metrics
//! - **Service Layer** (`services`): prompt construction, session aggregation,
//!   scoring and the [`GradingEngine`] facade
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use arbiter::{AnthropicJudge, ConfigLoader, GradingEngine, TracingLogger};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let judge = Arc::new(AnthropicJudge::new(&config.judge)?);
//!     let engine = GradingEngine::builder(judge, config, Arc::new(TracingLogger::default())).build()?;
//!     // engine.grade_session(&trajectory).await?
//!     Ok(())
//! }
//! ```

pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{GraderError, GradingError};
pub use domain::models::{
    Chunk, Config, ContentItem, CriteriaSnapshot, CriteriaUpdate, EvaluationCriteria,
    FinalEvaluation, GradeResult, RequestMetrics, Trajectory, TrajectoryMeta,
};
pub use domain::ports::{JudgeClient, Logger, MetricsHook, ProgrammaticGrader};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::judge::{AnthropicJudge, RetryOrchestrator, TokenBucketRateLimiter};
pub use infrastructure::logging::{LoggerImpl, TracingLogger};
pub use infrastructure::metrics::InMemoryMetricsCollector;
pub use services::{DeterministicScorer, GradingEngine};
