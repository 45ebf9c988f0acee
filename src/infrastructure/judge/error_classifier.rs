//! Maps raw judge-call failures into the closed [`GraderError`] taxonomy.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::structured_output::ParseError;
use crate::domain::errors::GraderError;
use crate::domain::ports::JudgeCallError;

/// Substrings that mark a failure as network- or deadline-related.
const NETWORK_KEYWORDS: [&str; 4] = ["network", "connection", "timeout", "reset"];

/// Anything that can go wrong during one judge attempt
#[derive(Debug)]
pub enum AttemptFailure {
    /// The judge client reported a failure
    Call(JudgeCallError),
    /// The per-call deadline elapsed and the call was cancelled
    DeadlineElapsed { timeout: Duration },
    /// The judge answered but the payload did not parse or validate
    InvalidOutput(ParseError),
}

/// Classify a failure. Rules apply in priority order:
///
/// 1. Cancellation or an elapsed deadline is a timeout.
/// 2. Status 429 or 5xx is transient, keeping any retry-after hint.
/// 3. Any other 4xx is permanent.
/// 4. Network/timeout keywords in the message are transient.
/// 5. Everything else is transient.
pub fn classify(failure: AttemptFailure) -> GraderError {
    classify_at(failure, Utc::now())
}

/// [`classify`] with an explicit clock for HTTP-date retry-after hints.
pub fn classify_at(failure: AttemptFailure, now: DateTime<Utc>) -> GraderError {
    match failure {
        AttemptFailure::DeadlineElapsed { timeout } => {
            GraderError::timeout(format!("no response within {}ms", timeout.as_millis()))
        }
        AttemptFailure::InvalidOutput(err) => {
            GraderError::transient(format!("invalid structured output: {err}")).with_cause(err)
        }
        AttemptFailure::Call(err) => classify_call(err, now),
    }
}

fn classify_call(err: JudgeCallError, now: DateTime<Utc>) -> GraderError {
    if err.aborted {
        return GraderError::Timeout {
            message: err.message.clone(),
            cause: Some(Box::new(err)),
        };
    }

    if let Some(status) = err.status {
        if status == 429 || (500..=599).contains(&status) {
            let retry_after_ms =
                parse_retry_after(err.retry_after_ms.as_deref(), err.retry_after.as_deref(), now);
            return GraderError::Transient {
                status_code: Some(status),
                retry_after_ms,
                message: err.message.clone(),
                cause: Some(Box::new(err)),
            };
        }
        if (400..=499).contains(&status) {
            return GraderError::Permanent {
                status_code: status,
                message: err.message.clone(),
                cause: Some(Box::new(err)),
            };
        }
    }

    // Rules 4 and 5 both land on Transient; the keyword match only decides the label.
    let lowered = err.message.to_lowercase();
    let message = if NETWORK_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        format!("network failure: {}", err.message)
    } else {
        err.message.clone()
    };
    GraderError::Transient {
        status_code: err.status,
        retry_after_ms: None,
        message,
        cause: Some(Box::new(err)),
    }
}

/// Convert provider retry hints to milliseconds.
///
/// `retry-after-ms` wins over `retry-after`. `retry-after` may be a number
/// of seconds (fractions allowed) or an RFC 2822 HTTP date; dates in the past
/// yield zero.
pub fn parse_retry_after(
    retry_after_ms: Option<&str>,
    retry_after: Option<&str>,
    now: DateTime<Utc>,
) -> Option<u64> {
    if let Some(ms) = retry_after_ms.and_then(parse_non_negative) {
        return Some(ms.ceil() as u64);
    }

    let value = retry_after?.trim();
    if let Some(secs) = parse_non_negative(value) {
        return Some((secs * 1000.0).ceil() as u64);
    }

    DateTime::parse_from_rfc2822(value).ok().map(|date| {
        let delta = date.with_timezone(&Utc) - now;
        delta.num_milliseconds().max(0) as u64
    })
}

fn parse_non_negative(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}
