use async_trait::async_trait;

use crate::domain::models::chunk::Chunk;
use crate::domain::models::evaluation::EfficiencyMetrics;

/// Port trait for deterministic, rule-based graders
///
/// Each check is invoked independently; a failing check never prevents the
/// others from running or the session from completing.
#[async_trait]
pub trait ProgrammaticGrader: Send + Sync {
    /// Seconds the trajectory took to complete.
    async fn evaluate_completion_time(&self, chunks: &[Chunk]) -> anyhow::Result<f64>;

    /// Whether every required action appears in the trajectory.
    async fn check_required_actions(
        &self,
        chunks: &[Chunk],
        requirements: &[String],
    ) -> anyhow::Result<bool>;

    async fn calculate_efficiency_metrics(
        &self,
        chunks: &[Chunk],
    ) -> anyhow::Result<EfficiencyMetrics>;
}
