use serde_json::Value;
use std::error::Error;

use super::secret_scrubbing::SecretScrubber;
use crate::domain::ports::{Level, LogMeta, Logger};

/// [`Logger`] adapter that forwards to `tracing`
///
/// Message, error chain and every string in the metadata are scrubbed of
/// secret-like values and truncated before the event is emitted.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    scrubber: SecretScrubber,
}

impl TracingLogger {
    pub const fn new(max_field_chars: usize) -> Self {
        Self {
            scrubber: SecretScrubber::new(max_field_chars),
        }
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, error: Option<&(dyn Error + 'static)>, meta: LogMeta) {
        let message = self.scrubber.scrub_field(message);
        let error = error.map(|e| self.scrubber.scrub_field(&error_chain(e)));
        let meta = self.scrubber.scrub_value(Value::Object(meta)).to_string();
        let error = error.as_deref();

        match level {
            Level::Debug => tracing::debug!(target: "arbiter", error, meta = %meta, "{}", message),
            Level::Info => tracing::info!(target: "arbiter", error, meta = %meta, "{}", message),
            Level::Warn => tracing::warn!(target: "arbiter", error, meta = %meta, "{}", message),
            Level::Error => tracing::error!(target: "arbiter", error, meta = %meta, "{}", message),
        }
    }
}

/// `outer: inner: root` rendering of an error and its sources.
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::GraderError;
    use crate::log_meta;

    #[test]
    fn test_error_chain_includes_sources() {
        let err = GraderError::transient("attempt failed").with_cause("socket closed");
        assert_eq!(
            error_chain(&err),
            "Transient judge error: attempt failed: socket closed"
        );
    }

    #[test]
    fn test_log_without_subscriber_does_not_panic() {
        let logger = TracingLogger::new(20);
        let err = GraderError::permanent(401, "bad key sk-ant-api03-secretsecret");
        logger.error(
            "judge rejected request",
            Some(&err),
            log_meta! { "payload_preview" => "x".repeat(100) },
        );
        logger.debug("plain", LogMeta::new());
    }
}
