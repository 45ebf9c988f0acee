//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - Judge-call reliability (rate limiting, classification, retries) and the Anthropic client
//! - Configuration management
//! - Logging infrastructure
//! - Metrics collection
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod judge;
pub mod logging;
pub mod metrics;
