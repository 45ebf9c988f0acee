//! In-memory [`MetricsHook`] with a per-batch summary.
//!
//! Records are kept in arrival order. Call [`InMemoryMetricsCollector::summary`]
//! at the end of a batch to get the aggregate that is persisted next to the
//! grade results, or [`InMemoryMetricsCollector::flush`] to emit it as a
//! single `tracing::info!` event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::domain::models::metrics::{RequestMetrics, RequestOutcome};
use crate::domain::ports::MetricsHook;

/// Aggregate over every record collected for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetricsSummary {
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Distinct sessions seen
    pub sessions: usize,
    /// Judge call records, excluding score audits
    pub total_calls: usize,
    pub successes: usize,
    pub permanent_errors: usize,
    pub transient_errors: usize,
    pub timeouts: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_retries: u64,
    pub mean_latency_ms: f64,
    /// Mean final score across score-audit records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_final_score: Option<f64>,
}

/// Collects every [`RequestMetrics`] handed to it.
#[derive(Debug)]
pub struct InMemoryMetricsCollector {
    batch_id: Uuid,
    records: Mutex<Vec<RequestMetrics>>,
}

impl Default for InMemoryMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMetricsCollector {
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            records: Mutex::new(Vec::new()),
        }
    }

    pub const fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RequestMetrics>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every record so far.
    pub fn records(&self) -> Vec<RequestMetrics> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn summary(&self) -> BatchMetricsSummary {
        let records = self.lock();
        let (audits, calls): (Vec<&RequestMetrics>, Vec<&RequestMetrics>) =
            records.iter().partition(|r| r.is_score_audit());

        let count = |outcome: RequestOutcome| calls.iter().filter(|r| r.outcome == outcome).count();
        let sessions: BTreeSet<&str> = records
            .iter()
            .map(|r| r.context.session_id.as_str())
            .collect();

        let mean_latency_ms = if calls.is_empty() {
            0.0
        } else {
            calls.iter().map(|r| r.timing.duration_ms() as f64).sum::<f64>() / calls.len() as f64
        };

        let final_scores: Vec<f64> = audits
            .iter()
            .filter_map(|r| r.score_audit.as_ref())
            .map(|a| f64::from(a.final_score))
            .collect();
        let mean_final_score = if final_scores.is_empty() {
            None
        } else {
            Some(final_scores.iter().sum::<f64>() / final_scores.len() as f64)
        };

        BatchMetricsSummary {
            batch_id: self.batch_id,
            generated_at: Utc::now(),
            sessions: sessions.len(),
            total_calls: calls.len(),
            successes: count(RequestOutcome::Success),
            permanent_errors: count(RequestOutcome::PermanentError),
            transient_errors: count(RequestOutcome::TransientError),
            timeouts: count(RequestOutcome::Timeout),
            input_tokens: calls.iter().map(|r| r.usage.input_tokens).sum(),
            output_tokens: calls.iter().map(|r| r.usage.output_tokens).sum(),
            total_retries: calls.iter().map(|r| u64::from(r.timing.retry_count)).sum(),
            mean_latency_ms,
            mean_final_score,
        }
    }

    /// Emit the current summary as a single `info!` event.
    pub fn flush(&self) {
        let summary = self.summary();
        tracing::info!(
            metric = "batch_summary",
            batch_id = %summary.batch_id,
            sessions = summary.sessions,
            total_calls = summary.total_calls,
            successes = summary.successes,
            permanent_errors = summary.permanent_errors,
            transient_errors = summary.transient_errors,
            timeouts = summary.timeouts,
            total_retries = summary.total_retries,
            input_tokens = summary.input_tokens,
            output_tokens = summary.output_tokens,
        );
    }

    /// Drop every record (useful between batches and in tests).
    pub fn reset(&self) {
        self.lock().clear();
    }
}

impl MetricsHook for InMemoryMetricsCollector {
    fn record(&self, metrics: &RequestMetrics) -> anyhow::Result<()> {
        self.lock().push(metrics.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::evaluation::ScoreAudit;
    use crate::domain::models::metrics::{CallContext, ErrorDescriptor, RequestTiming, TokenUsage};
    use chrono::Duration;

    fn record(session: &str, outcome: RequestOutcome, retries: u32, latency_ms: i64) -> RequestMetrics {
        let started_at = Utc::now();
        RequestMetrics {
            response_id: None,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 20,
            },
            timing: RequestTiming {
                started_at,
                ended_at: started_at + Duration::milliseconds(latency_ms),
                retry_count: retries,
                retry_delays_ms: vec![500; retries as usize],
            },
            context: CallContext::chunk(session, 0, "judge"),
            outcome,
            error: (outcome != RequestOutcome::Success).then(|| ErrorDescriptor {
                kind: "TransientError".into(),
                message: "boom".into(),
                status_code: None,
            }),
            score_audit: None,
        }
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let collector = InMemoryMetricsCollector::new();
        collector.record(&record("a", RequestOutcome::Success, 0, 100)).unwrap();
        collector.record(&record("a", RequestOutcome::Success, 2, 300)).unwrap();
        collector.record(&record("b", RequestOutcome::Timeout, 2, 200)).unwrap();

        let summary = collector.summary();
        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.total_calls, 3);
        assert_eq!(summary.successes, 2);
        assert_eq!(summary.timeouts, 1);
        assert_eq!(summary.total_retries, 4);
        assert_eq!(summary.input_tokens, 300);
        assert!((summary.mean_latency_ms - 200.0).abs() < f64::EPSILON);
        assert_eq!(summary.mean_final_score, None);
    }

    #[test]
    fn test_score_audits_are_not_calls() {
        let collector = InMemoryMetricsCollector::new();
        let mut audit = record("a", RequestOutcome::Success, 0, 0);
        audit.usage = TokenUsage::default();
        audit.score_audit = Some(ScoreAudit {
            raw_score: 73,
            guarded_score: 73,
            final_score: 81,
            outcome_achievement: 80,
            process_quality: 70,
            efficiency: 60,
            confidence: 70,
            evidence_markers: 4,
            guards: vec![],
            criteria_version: 1,
        });
        collector.record(&audit).unwrap();

        let summary = collector.summary();
        assert_eq!(summary.total_calls, 0);
        assert_eq!(summary.mean_final_score, Some(81.0));
    }

    #[test]
    fn test_summary_serializes() {
        let collector = InMemoryMetricsCollector::new();
        collector.record(&record("a", RequestOutcome::PermanentError, 0, 10)).unwrap();
        let json = serde_json::to_value(collector.summary()).unwrap();
        assert_eq!(json["permanent_errors"], 1);
        assert_eq!(json["batch_id"], collector.batch_id().to_string());
    }

    #[test]
    fn test_reset() {
        let collector = InMemoryMetricsCollector::new();
        collector.record(&record("a", RequestOutcome::Success, 0, 10)).unwrap();
        assert_eq!(collector.len(), 1);
        collector.reset();
        assert!(collector.is_empty());
    }
}
