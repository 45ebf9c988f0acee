use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::criteria::EvaluationCriteria;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid rate limit max_tokens: {0}. Must be at least 1")]
    InvalidBucketCapacity(f64),

    #[error("Invalid rate limit refill_rate: {0}. Must be positive")]
    InvalidRefillRate(f64),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error("Invalid timeout_ms: {0}. Cannot be 0")]
    InvalidTimeout(u64),

    #[error(
        "Invalid backoff configuration: base_delay_ms ({0}) must not exceed max_delay_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid chunks_per_call: {0}. Must be at least 1")]
    InvalidChunksPerCall(usize),

    #[error("Invalid max_images_per_chunk: {0}. Must be at least 1")]
    InvalidMaxImages(usize),

    #[error("Invalid scoring weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Judge model cannot be empty")]
    EmptyModel,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .arbiter/config.yaml (project config)
    /// 3. .arbiter/local.yaml (project local overrides, optional)
    /// 4. Environment variables (ARBITER_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// [`load`](Self::load) rooted at `base_dir` instead of the working directory
    pub fn load_from_dir(base_dir: impl AsRef<Path>) -> Result<Config> {
        let config_dir = base_dir.as_ref().join(".arbiter");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed("ARBITER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.judge.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }

        let rate_limit = &config.rate_limit;
        if !(rate_limit.max_tokens.is_finite() && rate_limit.max_tokens >= 1.0) {
            return Err(ConfigError::InvalidBucketCapacity(rate_limit.max_tokens));
        }
        if !(rate_limit.refill_rate.is_finite() && rate_limit.refill_rate > 0.0) {
            return Err(ConfigError::InvalidRefillRate(rate_limit.refill_rate));
        }

        let retry = &config.retry;
        if retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(retry.max_retries));
        }
        if retry.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(retry.timeout_ms));
        }
        if retry.base_delay_ms > retry.max_delay_ms {
            return Err(ConfigError::InvalidBackoff(
                retry.base_delay_ms,
                retry.max_delay_ms,
            ));
        }

        if config.chunking.chunks_per_call == 0 {
            return Err(ConfigError::InvalidChunksPerCall(
                config.chunking.chunks_per_call,
            ));
        }
        if config.chunking.max_images_per_chunk == 0 {
            return Err(ConfigError::InvalidMaxImages(
                config.chunking.max_images_per_chunk,
            ));
        }

        let weights = &config.scoring.weights;
        EvaluationCriteria::new(
            weights.outcome_achievement,
            weights.process_quality,
            weights.efficiency,
        )
        .map_err(|e| ConfigError::InvalidWeights(e.to_string()))?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{LogFormat, RotationPolicy};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_retries, 3);
        assert!((config.rate_limit.refill_rate - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.chunking.chunks_per_call, 2);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.judge.final_model(), config.judge.model);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
judge:
  model: judge-small
  evaluation_model: judge-large
rate_limit:
  max_tokens: 10
  refill_rate: 4.5
retry:
  max_retries: 5
  timeout_ms: 30000
scoring:
  weights:
    outcome_achievement: 60
    process_quality: 20
    efficiency: 20
  calibration:
    bonus_points: 5
logging:
  level: debug
  format: pretty
  rotation: hourly
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.judge.final_model(), "judge-large");
        assert!((config.rate_limit.max_tokens - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 500, "unset fields keep defaults");
        assert!((config.scoring.calibration.bonus_points - 5.0).abs() < f64::EPSILON);
        assert!((config.scoring.calibration.mid_band_multiplier - 1.18).abs() < f64::EPSILON);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.rotation, RotationPolicy::Hourly);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_zero_refill_rate() {
        let mut config = Config::default();
        config.rate_limit.refill_rate = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRefillRate(_))
        ));
    }

    #[test]
    fn test_validate_fractional_bucket() {
        let mut config = Config::default();
        config.rate_limit.max_tokens = 0.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBucketCapacity(_))
        ));
    }

    #[test]
    fn test_validate_zero_max_retries() {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRetries(0))
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.retry.base_delay_ms = 30_000;
        config.retry.max_delay_ms = 10_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30_000, 10_000))
        ));
    }

    #[test]
    fn test_validate_zero_chunk_size() {
        let mut config = Config::default();
        config.chunking.chunks_per_call = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidChunksPerCall(0))
        ));
    }

    #[test]
    fn test_validate_negative_weight() {
        let mut config = Config::default();
        config.scoring.weights.efficiency = -1.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWeights(_))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chunking:\n  chunks_per_call: 4\n  max_images_per_chunk: 8").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.chunking.chunks_per_call, 4);
        assert_eq!(config.chunking.max_images_per_chunk, 8);
        assert_eq!(config.chunking.max_text_chars, 2_000);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "retry:\n  max_retries: 0").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_hierarchical_merging_with_env_override() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(".arbiter");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.yaml"),
            "retry:\n  max_retries: 4\n  timeout_ms: 60000\nlogging:\n  level: info\n  format: json\n",
        )
        .unwrap();
        std::fs::write(config_dir.join("local.yaml"), "retry:\n  max_retries: 6\n").unwrap();

        temp_env::with_vars(
            [
                ("ARBITER_LOGGING__LEVEL", Some("debug")),
                ("ARBITER_RATE_LIMIT__REFILL_RATE", Some("7.5")),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.retry.max_retries, 6, "local.yaml should win");
                assert_eq!(config.retry.timeout_ms, 60_000, "config.yaml value persists");
                assert_eq!(config.logging.level, "debug", "env should win");
                assert_eq!(config.logging.format, LogFormat::Json);
                assert!((config.rate_limit.refill_rate - 7.5).abs() < f64::EPSILON);
            },
        );
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.retry.max_retries, 3);
    }
}
