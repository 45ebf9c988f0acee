use crate::domain::models::metrics::RequestMetrics;

/// Port trait for request-level observability
///
/// Called once per judge call outcome and once per session with the score
/// audit. Errors are logged by the caller and never abort grading.
pub trait MetricsHook: Send + Sync {
    fn record(&self, metrics: &RequestMetrics) -> anyhow::Result<()>;
}
