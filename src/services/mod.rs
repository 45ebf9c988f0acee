//! Grading services
//!
//! Orchestration on top of the judge reliability layer: content sanitization,
//! prompt construction, per-window evaluation, session aggregation, and
//! deterministic scoring, tied together by the [`GradingEngine`] facade.

pub mod chunk_evaluator;
pub mod content_sanitizer;
pub mod evidence;
pub mod grading_engine;
pub mod prompt_builder;
pub mod scorer;
pub mod session_aggregator;

pub use chunk_evaluator::{ChunkEvaluator, WindowPosition};
pub use content_sanitizer::{sanitize, ContentSanitizer};
pub use evidence::count_evidence_markers;
pub use grading_engine::{GradingEngine, GradingEngineBuilder};
pub use prompt_builder::PromptBuilder;
pub use scorer::{ComponentScores, DeterministicScorer};
pub use session_aggregator::SessionAggregator;
