use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use super::error_classifier::{classify, AttemptFailure};
use super::rate_limiter::TokenBucketRateLimiter;
use super::structured_output::{parse_response, StructuredPayload};
use crate::domain::errors::GraderError;
use crate::domain::models::config::RetryConfig;
use crate::domain::models::metrics::{
    CallContext, RequestMetrics, RequestOutcome, RequestTiming, TokenUsage,
};
use crate::domain::ports::{
    ContentPart, JudgeClient, JudgeMessage, JudgeRequest, Logger, MetricsHook, Sampling,
};
use crate::log_meta;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Permanent failure; never attempt again
    Abort,
    /// Sleep for the given delay, then attempt again
    Backoff(Duration),
    /// Attempt budget spent; give up without sleeping
    Exhausted,
}

/// Retry policy with capped exponential backoff and jitter
///
/// Backoff before attempt `n + 1` is `min(max_delay, base_delay * 2^(n - 1))`
/// plus a random jitter in `[0, jitter)`. A server-specified retry-after
/// replaces the computed backoff, capped at `max_retry_after`.
///
/// # Retry Decision
/// - Never retry: [`GraderError::Permanent`]
/// - Retry: [`GraderError::Transient`], [`GraderError::Timeout`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            max_retry_after: Duration::from_millis(config.max_retry_after_ms),
        }
    }

    /// Decide the next step after `attempt` (1-based) failed with `error`.
    pub fn decide(&self, attempt: u32, error: &GraderError) -> RetryDecision {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };
        self.decide_with_jitter(attempt, error, jitter)
    }

    /// [`decide`](Self::decide) with the jitter supplied by the caller.
    pub fn decide_with_jitter(
        &self,
        attempt: u32,
        error: &GraderError,
        jitter: Duration,
    ) -> RetryDecision {
        if error.is_permanent() {
            return RetryDecision::Abort;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::Exhausted;
        }
        match error.retry_after_ms() {
            Some(ms) => RetryDecision::Backoff(Duration::from_millis(ms).min(self.max_retry_after)),
            None => RetryDecision::Backoff(self.exponential_delay(attempt) + jitter),
        }
    }

    /// Backoff after `attempt` (1-based) without jitter.
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Prompt and content for one judge call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgePrompt {
    pub system: String,
    pub content: Vec<ContentPart>,
}

/// Reliable judge calls: rate limiting, per-attempt deadlines, classified
/// errors, retry with backoff and metrics emission.
///
/// Each attempt runs through the same states:
///
/// ```text
/// Attempting ──ok──▶ Success
///     │
///     └─err─▶ classify ──▶ decide ──Abort─────▶ PermanentFail
///                              ├─────Backoff──▶ sleep ─▶ Attempting
///                              └─────Exhausted▶ Exhausted
/// ```
pub struct RetryOrchestrator {
    judge: Arc<dyn JudgeClient>,
    rate_limiter: TokenBucketRateLimiter,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    sampling: Sampling,
    max_tokens: u32,
    metrics: Option<Arc<dyn MetricsHook>>,
    logger: Arc<dyn Logger>,
}

impl RetryOrchestrator {
    pub fn new(
        judge: Arc<dyn JudgeClient>,
        rate_limiter: TokenBucketRateLimiter,
        config: &RetryConfig,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            judge,
            rate_limiter,
            policy: RetryPolicy::from_config(config),
            attempt_timeout: Duration::from_millis(config.timeout_ms),
            sampling: Sampling::deterministic(42),
            max_tokens: 4096,
            metrics: None,
            logger,
        }
    }

    #[must_use]
    pub const fn with_sampling(mut self, sampling: Sampling, max_tokens: u32) -> Self {
        self.sampling = sampling;
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsHook>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub const fn rate_limiter(&self) -> &TokenBucketRateLimiter {
        &self.rate_limiter
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn metrics(&self) -> Option<&Arc<dyn MetricsHook>> {
        self.metrics.as_ref()
    }

    /// Call the judge until it yields a valid `T`, a permanent error occurs or
    /// the attempt budget is spent. The last classified error is returned.
    pub async fn call_with_retries<T: StructuredPayload>(
        &self,
        prompt: JudgePrompt,
        context: CallContext,
    ) -> Result<T, GraderError> {
        let request = JudgeRequest {
            model: context.model.clone(),
            system: prompt.system,
            messages: vec![JudgeMessage::user(prompt.content)],
            schema: T::KIND.schema(),
            sampling: self.sampling,
            max_tokens: self.max_tokens,
        };

        let started_at = Utc::now();
        let mut retry_delays_ms = Vec::new();
        let mut spent = TokenUsage::default();
        let mut last_response_id = None;
        let mut attempt = 1;

        loop {
            let outcome = self.attempt::<T>(&request).await;
            spent += outcome.usage;
            if outcome.response_id.is_some() {
                last_response_id = outcome.response_id;
            }

            let error = match outcome.result {
                Ok(value) => {
                    if attempt > 1 {
                        self.logger.debug(
                            "Judge call succeeded after retries",
                            log_meta! {
                                "session_id" => context.session_id,
                                "attempt" => attempt,
                            },
                        );
                    }
                    self.emit(RequestMetrics {
                        response_id: last_response_id,
                        usage: spent,
                        timing: timing(started_at, attempt, &retry_delays_ms),
                        context,
                        outcome: RequestOutcome::Success,
                        error: None,
                        score_audit: None,
                    });
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.policy.decide(attempt, &error) {
                RetryDecision::Abort => {
                    self.logger.error(
                        "Permanent judge error, not retrying",
                        Some(&error),
                        call_meta(&context, attempt),
                    );
                    self.emit(failure_record(
                        &error,
                        last_response_id,
                        spent,
                        timing(started_at, attempt, &retry_delays_ms),
                        context,
                    ));
                    return Err(error);
                }
                RetryDecision::Exhausted => {
                    self.logger.error(
                        "Judge call failed after exhausting retries",
                        Some(&error),
                        call_meta(&context, attempt),
                    );
                    self.emit(failure_record(
                        &error,
                        last_response_id,
                        spent,
                        timing(started_at, attempt, &retry_delays_ms),
                        context,
                    ));
                    return Err(error);
                }
                RetryDecision::Backoff(delay) => {
                    let mut meta = call_meta(&context, attempt);
                    meta.insert("delay_ms".into(), (delay.as_millis() as u64).into());
                    meta.insert("error_kind".into(), error.kind().into());
                    self.logger.warn("Judge attempt failed, retrying", Some(&error), meta);

                    retry_delays_ms.push(delay.as_millis() as u64);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One attempt: rate-limit token, deadline-bounded call, parse.
    ///
    /// Usage is reported whenever the judge answered, including answers that
    /// failed to parse.
    async fn attempt<T: StructuredPayload>(&self, request: &JudgeRequest) -> AttemptOutcome<T> {
        self.rate_limiter.acquire().await;

        let response = match timeout(self.attempt_timeout, self.judge.submit(request.clone())).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return AttemptOutcome::unanswered(classify(AttemptFailure::Call(err))),
            Err(_elapsed) => {
                return AttemptOutcome::unanswered(classify(AttemptFailure::DeadlineElapsed {
                    timeout: self.attempt_timeout,
                }))
            }
        };

        let result = match parse_response::<T>(&response) {
            Ok(value) => Ok(value),
            Err(parse_error) => {
                self.logger.warn(
                    "Judge returned an invalid structured payload",
                    Some(&parse_error),
                    log_meta! {
                        "schema" => T::KIND.name(),
                        "response_id" => response.id.clone(),
                        "payload_preview" => parse_error.preview(),
                    },
                );
                Err(classify(AttemptFailure::InvalidOutput(parse_error)))
            }
        };
        AttemptOutcome {
            result,
            response_id: Some(response.id),
            usage: response.usage,
        }
    }

    /// Hand a record to the metrics hook. Hook failures are logged and dropped.
    pub(crate) fn emit(&self, metrics: RequestMetrics) {
        let Some(hook) = &self.metrics else {
            return;
        };
        if let Err(err) = hook.record(&metrics) {
            let err: &(dyn std::error::Error + 'static) = err.as_ref();
            self.logger.warn(
                "Metrics hook failed",
                Some(err),
                log_meta! {
                    "session_id" => metrics.context.session_id,
                    "outcome" => metrics.outcome.as_str(),
                },
            );
        }
    }
}

struct AttemptOutcome<T> {
    result: Result<T, GraderError>,
    response_id: Option<String>,
    usage: TokenUsage,
}

impl<T> AttemptOutcome<T> {
    fn unanswered(error: GraderError) -> Self {
        Self {
            result: Err(error),
            response_id: None,
            usage: TokenUsage::default(),
        }
    }
}

fn failure_record(
    error: &GraderError,
    response_id: Option<String>,
    usage: TokenUsage,
    timing: RequestTiming,
    context: CallContext,
) -> RequestMetrics {
    RequestMetrics {
        response_id,
        usage,
        timing,
        context,
        outcome: error.outcome(),
        error: Some(error.descriptor()),
        score_audit: None,
    }
}

fn timing(started_at: chrono::DateTime<Utc>, attempt: u32, retry_delays_ms: &[u64]) -> RequestTiming {
    RequestTiming {
        started_at,
        ended_at: Utc::now(),
        retry_count: attempt - 1,
        retry_delays_ms: retry_delays_ms.to_vec(),
    }
}

fn call_meta(context: &CallContext, attempt: u32) -> crate::domain::ports::LogMeta {
    log_meta! {
        "session_id" => context.session_id,
        "chunk_index" => context.chunk_index,
        "is_final" => context.is_final,
        "model" => context.model,
        "attempt" => attempt,
    }
}
