//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty stdout output, optional rolling JSON files
//! - Secret scrubbing and field truncation
//! - The tracing-backed adapter for the `Logger` port

pub mod logger;
pub mod secret_scrubbing;
pub mod tracing_logger;

pub use logger::LoggerImpl;
pub use secret_scrubbing::SecretScrubber;
pub use tracing_logger::{error_chain, TracingLogger};
