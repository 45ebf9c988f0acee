//! Error taxonomy for judge calls and session grading.

use thiserror::Error;

use super::models::criteria::CriteriaError;
use super::models::metrics::{ErrorDescriptor, RequestOutcome};

/// Boxed underlying cause carried by classified errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classified failure of a judge call.
///
/// Produced by the error classifier at the moment a call fails and consumed by
/// the retry orchestrator to decide between retrying and giving up.
#[derive(Debug, Error)]
pub enum GraderError {
    /// Client-caused failure (bad request, bad credentials). Never retried.
    #[error("Permanent judge error (HTTP {status_code}): {message}")]
    Permanent {
        status_code: u16,
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    /// Server- or network-caused failure. Retryable, possibly after a mandated delay.
    #[error(
        "Transient judge error{}: {message}",
        .status_code.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
    )]
    Transient {
        status_code: Option<u16>,
        retry_after_ms: Option<u64>,
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    /// The local per-call deadline elapsed. Retryable.
    #[error("Judge call timed out: {message}")]
    Timeout {
        message: String,
        #[source]
        cause: Option<BoxError>,
    },
}

impl GraderError {
    pub fn permanent(status_code: u16, message: impl Into<String>) -> Self {
        Self::Permanent {
            status_code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            status_code: None,
            retry_after_ms: None,
            message: message.into(),
            cause: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            cause: None,
        }
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_cause(mut self, source: impl Into<BoxError>) -> Self {
        let source = Some(source.into());
        match &mut self {
            Self::Permanent { cause, .. }
            | Self::Transient { cause, .. }
            | Self::Timeout { cause, .. } => *cause = source,
        }
        self
    }

    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Permanent { status_code, .. } => Some(*status_code),
            Self::Transient { status_code, .. } => *status_code,
            Self::Timeout { .. } => None,
        }
    }

    /// Server-mandated delay before the next attempt, if any.
    pub const fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::Transient { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Permanent { message, .. }
            | Self::Transient { message, .. }
            | Self::Timeout { message, .. } => message,
        }
    }

    /// Metric outcome this error terminates a call with.
    pub const fn outcome(&self) -> RequestOutcome {
        match self {
            Self::Permanent { .. } => RequestOutcome::PermanentError,
            Self::Transient { .. } => RequestOutcome::TransientError,
            Self::Timeout { .. } => RequestOutcome::Timeout,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Permanent { .. } => "PermanentError",
            Self::Transient { .. } => "TransientError",
            Self::Timeout { .. } => "TimeoutError",
        }
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            kind: self.kind().to_string(),
            message: self.message().to_string(),
            status_code: self.status_code(),
        }
    }
}

/// Failure of a whole grading session.
///
/// Grading either fully succeeds or fails with one of these; no partial
/// result is ever produced.
#[derive(Debug, Error)]
pub enum GradingError {
    #[error(transparent)]
    Judge(#[from] GraderError),

    #[error("Trajectory for session {session_id} has no chunks")]
    EmptyTrajectory { session_id: String },

    #[error(transparent)]
    Criteria(#[from] CriteriaError),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl GradingError {
    /// The classified judge error behind this failure, if any.
    pub const fn judge_error(&self) -> Option<&GraderError> {
        match self {
            Self::Judge(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_status() {
        let err = GraderError::Transient {
            status_code: Some(503),
            retry_after_ms: None,
            message: "overloaded".into(),
            cause: None,
        };
        assert_eq!(err.to_string(), "Transient judge error (HTTP 503): overloaded");

        let err = GraderError::transient("connection reset");
        assert_eq!(err.to_string(), "Transient judge error: connection reset");
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            GraderError::permanent(401, "bad key").outcome(),
            RequestOutcome::PermanentError
        );
        assert_eq!(GraderError::timeout("late").outcome(), RequestOutcome::Timeout);
        assert_eq!(
            GraderError::transient("x").outcome(),
            RequestOutcome::TransientError
        );
    }

    #[test]
    fn test_with_cause_sets_source() {
        use std::error::Error as _;

        let err = GraderError::timeout("deadline").with_cause("inner failure");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("inner failure"));
    }

    #[test]
    fn test_descriptor() {
        let descriptor = GraderError::permanent(400, "bad request").descriptor();
        assert_eq!(descriptor.kind, "PermanentError");
        assert_eq!(descriptor.status_code, Some(400));
    }
}
