use serde::{Deserialize, Serialize};

use super::criteria::EvaluationCriteria;

/// Main configuration structure for Arbiter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Judge model and HTTP adapter settings
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Token bucket shared by every outbound judge call
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Per-call timeout and retry/backoff policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// How trajectories are windowed and trimmed before judging
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Deterministic scoring weights and calibration
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Judge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgeConfig {
    /// Model used for per-chunk calls
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for the final aggregation call (defaults to `model`)
    #[serde(default)]
    pub evaluation_model: Option<String>,

    /// Base URL for the Anthropic Messages API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; falls back to `ANTHROPIC_API_KEY` when unset
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum tokens the judge may generate per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Fixed sampling seed forwarded to providers that accept one
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// HTTP client ceiling; the per-call timeout in `retry` is normally shorter
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

const fn default_max_tokens() -> u32 {
    4096
}

const fn default_seed() -> u64 {
    42
}

const fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            evaluation_model: None,
            base_url: default_base_url(),
            api_key: None,
            max_tokens: default_max_tokens(),
            seed: default_seed(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl JudgeConfig {
    /// Model for the final aggregation call.
    pub fn final_model(&self) -> &str {
        self.evaluation_model.as_deref().unwrap_or(&self.model)
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Bucket capacity (burst size)
    #[serde(default = "default_bucket_capacity")]
    pub max_tokens: f64,

    /// Tokens added per second
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,
}

const fn default_bucket_capacity() -> f64 {
    5.0
}

const fn default_refill_rate() -> f64 {
    2.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_bucket_capacity(),
            refill_rate: default_refill_rate(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of attempts per judge call (including the first)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff before the second attempt; doubles per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on the exponential part of the backoff
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound (exclusive) of the random jitter added to computed backoff
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Cap on server-specified retry-after delays
    #[serde(default = "default_max_retry_after_ms")]
    pub max_retry_after_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_timeout_ms() -> u64 {
    120_000
}

const fn default_base_delay_ms() -> u64 {
    500
}

const fn default_max_delay_ms() -> u64 {
    8_000
}

const fn default_jitter_ms() -> u64 {
    250
}

const fn default_max_retry_after_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retry_after_ms: default_max_retry_after_ms(),
        }
    }
}

/// Chunk windowing and content limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChunkingConfig {
    /// Trajectory chunks merged into one judge call
    #[serde(default = "default_chunks_per_call")]
    pub chunks_per_call: usize,

    /// Images sent per judge call
    #[serde(default = "default_max_images_per_chunk")]
    pub max_images_per_chunk: usize,

    /// Character cap for each sanitized text item
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Character cap for image crop notes
    #[serde(default = "default_max_note_chars")]
    pub max_note_chars: usize,
}

const fn default_chunks_per_call() -> usize {
    2
}

const fn default_max_images_per_chunk() -> usize {
    6
}

const fn default_max_text_chars() -> usize {
    2_000
}

const fn default_max_note_chars() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunks_per_call: default_chunks_per_call(),
            max_images_per_chunk: default_max_images_per_chunk(),
            max_text_chars: default_max_text_chars(),
            max_note_chars: default_max_note_chars(),
        }
    }
}

/// Scoring configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    /// Initial weights; normalized to 100 when the engine starts
    #[serde(default)]
    pub weights: EvaluationCriteria,

    #[serde(default)]
    pub calibration: CalibrationConfig,
}

/// Business guards and calibration curve applied after weighting.
///
/// The curve constants are empirical; they are kept configurable rather than
/// derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CalibrationConfig {
    /// Outcome floor applied when required actions are met
    pub programmatic_outcome_floor: f64,
    /// Judged outcome below which a programmatic floor is a contradiction
    pub contradiction_outcome_threshold: f64,
    /// Confidence cap for that contradiction
    pub contradiction_confidence_cap: f64,
    /// Evidence markers required to keep full confidence
    pub min_evidence_markers: usize,
    /// Confidence cap when evidence is sparse
    pub sparse_evidence_confidence_cap: f64,
    /// Judged outcome at or below which programmatic success is contradictory
    pub zero_outcome_threshold: f64,
    /// Confidence cap for a near-zero outcome with programmatic success
    pub zero_outcome_confidence_cap: f64,
    /// Largest amount efficiency may subtract from the blended score
    pub max_efficiency_penalty: f64,
    /// Outcome at which the high success floor applies
    pub high_success_outcome: f64,
    pub high_success_floor: f64,
    /// Outcome at which the partial success floor applies
    pub partial_success_outcome: f64,
    pub partial_success_floor: f64,
    /// Guarded score below which the low band applies
    pub low_band_upper: f64,
    pub low_band_multiplier: f64,
    /// Guarded score below which the mid band applies
    pub mid_band_upper: f64,
    pub mid_band_multiplier: f64,
    pub mid_band_offset: f64,
    pub high_band_multiplier: f64,
    pub high_band_offset: f64,
    /// Outcome at which the calibration bonus applies
    pub bonus_outcome_threshold: f64,
    pub bonus_points: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            programmatic_outcome_floor: 70.0,
            contradiction_outcome_threshold: 40.0,
            contradiction_confidence_cap: 65.0,
            min_evidence_markers: 3,
            sparse_evidence_confidence_cap: 70.0,
            zero_outcome_threshold: 10.0,
            zero_outcome_confidence_cap: 60.0,
            max_efficiency_penalty: 15.0,
            high_success_outcome: 70.0,
            high_success_floor: 55.0,
            partial_success_outcome: 50.0,
            partial_success_floor: 45.0,
            low_band_upper: 35.0,
            low_band_multiplier: 1.07,
            mid_band_upper: 70.0,
            mid_band_multiplier: 1.18,
            mid_band_offset: 5.0,
            high_band_multiplier: 1.04,
            high_band_offset: 2.0,
            bonus_outcome_threshold: 80.0,
            bonus_points: 3.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<std::path::PathBuf>,

    #[serde(default)]
    pub rotation: RotationPolicy,

    /// Longest string a single log field may carry before truncation
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_max_field_chars() -> usize {
    500
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
            max_field_chars: default_max_field_chars(),
        }
    }
}
