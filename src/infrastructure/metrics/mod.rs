//! Request metrics collection

pub mod collector;

pub use collector::{BatchMetricsSummary, InMemoryMetricsCollector};
