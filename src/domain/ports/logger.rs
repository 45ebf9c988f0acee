use serde_json::{Map, Value};

/// Log level enumeration for structured logging
///
/// Levels are ordered from most verbose (Debug) to most severe (Error).
///
/// # Examples
///
/// ```
/// use arbiter::domain::ports::Level;
///
/// assert!(Level::Error > Level::Info);
/// assert_eq!(Level::Warn.as_str(), "WARN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Structured fields attached to a log entry
pub type LogMeta = Map<String, Value>;

/// Port trait for structured logging operations
///
/// The grading engine logs only through this trait. Implementations are
/// responsible for redacting secret-like values and truncating long fields
/// before anything reaches an output.
///
/// # Examples
///
/// ```
/// use arbiter::domain::ports::{LogMeta, Logger};
/// use serde_json::json;
///
/// fn report(logger: &dyn Logger, session_id: &str) {
///     let mut meta = LogMeta::new();
///     meta.insert("session_id".into(), json!(session_id));
///     logger.info("session graded", meta);
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log a message with an optional error and structured fields
    fn log(
        &self,
        level: Level,
        message: &str,
        error: Option<&(dyn std::error::Error + 'static)>,
        meta: LogMeta,
    );

    fn debug(&self, message: &str, meta: LogMeta) {
        self.log(Level::Debug, message, None, meta);
    }

    fn info(&self, message: &str, meta: LogMeta) {
        self.log(Level::Info, message, None, meta);
    }

    fn warn(&self, message: &str, error: Option<&(dyn std::error::Error + 'static)>, meta: LogMeta) {
        self.log(Level::Warn, message, error, meta);
    }

    fn error(&self, message: &str, error: Option<&(dyn std::error::Error + 'static)>, meta: LogMeta) {
        self.log(Level::Error, message, error, meta);
    }
}

/// Build a [`LogMeta`] from `key => value` pairs.
///
/// ```
/// use arbiter::log_meta;
///
/// let meta = log_meta! { "attempt" => 2, "session_id" => "s-1" };
/// assert_eq!(meta["attempt"], 2);
/// ```
#[macro_export]
macro_rules! log_meta {
    () => {
        $crate::domain::ports::LogMeta::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut meta = $crate::domain::ports::LogMeta::new();
        $(meta.insert(($key).to_string(), ::serde_json::json!($value));)+
        meta
    }};
}
