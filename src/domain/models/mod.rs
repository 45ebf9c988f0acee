pub mod chunk;
pub mod config;
pub mod criteria;
pub mod evaluation;
pub mod metrics;
pub mod trajectory;

pub use chunk::{AppUsageStats, Chunk, ContentItem};
pub use config::{
    CalibrationConfig, ChunkingConfig, Config, JudgeConfig, LogFormat, LoggingConfig,
    RateLimitConfig, RetryConfig, RotationPolicy, ScoringConfig,
};
pub use criteria::{CriteriaError, CriteriaSnapshot, CriteriaUpdate, EvaluationCriteria};
pub use evaluation::{
    ChunkEvaluation, EfficiencyMetrics, FinalEvaluation, GradeResult, ProgrammaticResults,
    ScoreAudit, ScoreGuard, GRADE_VERSION,
};
pub use metrics::{
    CallContext, ErrorDescriptor, RequestMetrics, RequestOutcome, RequestTiming, TokenUsage,
};
pub use trajectory::{Quest, Trajectory, TrajectoryMeta};
