//! Domain layer for the Arbiter grading engine
//!
//! Trajectory and evaluation models, the error taxonomy, and the port traits
//! that infrastructure adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{BoxError, GraderError, GradingError};
