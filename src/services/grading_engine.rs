//! Grading engine facade.
//!
//! Owns the shared rate limiter, the versioned scoring criteria and the
//! optional collaborators. Sessions are independent apart from the rate
//! limiter, so [`GradingEngine::grade_batch`] may drive several at once.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;

use crate::domain::errors::GradingError;
use crate::domain::models::chunk::Chunk;
use crate::domain::models::config::Config;
use crate::domain::models::criteria::{CriteriaSnapshot, CriteriaUpdate, EvaluationCriteria};
use crate::domain::models::evaluation::{GradeResult, ProgrammaticResults, ScoreAudit};
use crate::domain::models::metrics::{CallContext, RequestMetrics, RequestOutcome, RequestTiming, TokenUsage};
use crate::domain::models::trajectory::{Trajectory, TrajectoryMeta};
use crate::domain::ports::{JudgeClient, Logger, MetricsHook, ProgrammaticGrader, Sampling};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::judge::{RateLimiterStats, RetryOrchestrator, TokenBucketRateLimiter};
use crate::log_meta;
use crate::services::scorer::DeterministicScorer;
use crate::services::session_aggregator::SessionAggregator;

/// Model name recorded on the synthetic score-audit metric.
const SCORER_MODEL: &str = "deterministic-scorer";

/// Builder for [`GradingEngine`].
pub struct GradingEngineBuilder {
    judge: Arc<dyn JudgeClient>,
    config: Config,
    logger: Arc<dyn Logger>,
    metrics: Option<Arc<dyn MetricsHook>>,
    programmatic: Option<Arc<dyn ProgrammaticGrader>>,
    rate_limiter: Option<TokenBucketRateLimiter>,
}

impl GradingEngineBuilder {
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsHook>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn programmatic_grader(mut self, grader: Arc<dyn ProgrammaticGrader>) -> Self {
        self.programmatic = Some(grader);
        self
    }

    /// Share an existing limiter, e.g. across several engines in one process.
    #[must_use]
    pub fn rate_limiter(mut self, rate_limiter: TokenBucketRateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn build(self) -> Result<GradingEngine, GradingError> {
        let Self {
            judge,
            config,
            logger,
            metrics,
            programmatic,
            rate_limiter,
        } = self;

        let weights = config.scoring.weights;
        let criteria = EvaluationCriteria::new(
            weights.outcome_achievement,
            weights.process_quality,
            weights.efficiency,
        )?;
        ConfigLoader::validate(&config).map_err(|e| GradingError::InvalidConfig(e.to_string()))?;

        let rate_limiter = rate_limiter.unwrap_or_else(|| {
            TokenBucketRateLimiter::new(config.rate_limit.max_tokens, config.rate_limit.refill_rate)
        });
        let mut orchestrator = RetryOrchestrator::new(judge, rate_limiter, &config.retry, logger)
            .with_sampling(
                Sampling::deterministic(config.judge.seed),
                config.judge.max_tokens,
            );
        if let Some(metrics) = metrics {
            orchestrator = orchestrator.with_metrics(metrics);
        }
        let orchestrator = Arc::new(orchestrator);

        let aggregator = SessionAggregator::new(
            Arc::clone(&orchestrator),
            &config.chunking,
            config.judge.model.clone(),
            config.judge.final_model(),
        );

        Ok(GradingEngine {
            orchestrator,
            aggregator,
            scorer: DeterministicScorer::new(config.scoring.calibration.clone()),
            criteria: RwLock::new(Arc::new(CriteriaSnapshot::initial(criteria))),
            programmatic,
        })
    }
}

/// Grades trajectories end to end.
pub struct GradingEngine {
    orchestrator: Arc<RetryOrchestrator>,
    aggregator: SessionAggregator,
    scorer: DeterministicScorer,
    criteria: RwLock<Arc<CriteriaSnapshot>>,
    programmatic: Option<Arc<dyn ProgrammaticGrader>>,
}

impl GradingEngine {
    pub fn builder(
        judge: Arc<dyn JudgeClient>,
        config: Config,
        logger: Arc<dyn Logger>,
    ) -> GradingEngineBuilder {
        GradingEngineBuilder {
            judge,
            config,
            logger,
            metrics: None,
            programmatic: None,
            rate_limiter: None,
        }
    }

    /// Current criteria snapshot.
    pub async fn criteria(&self) -> Arc<CriteriaSnapshot> {
        Arc::clone(&*self.criteria.read().await)
    }

    /// Apply a partial weight update.
    ///
    /// The snapshot is replaced as a whole; sessions already in flight keep
    /// the snapshot they started with. A rejected update leaves the current
    /// criteria untouched.
    pub async fn update_criteria(&self, update: CriteriaUpdate) -> Result<Arc<CriteriaSnapshot>, GradingError> {
        let mut guard = self.criteria.write().await;
        let next = Arc::new(guard.next(&update)?);
        *guard = Arc::clone(&next);
        drop(guard);

        self.logger().info(
            "Evaluation criteria updated",
            log_meta! {
                "version" => next.version,
                "outcome_achievement" => next.criteria.outcome_achievement,
                "process_quality" => next.criteria.process_quality,
                "efficiency" => next.criteria.efficiency,
            },
        );
        Ok(next)
    }

    pub fn rate_limiter_stats(&self) -> RateLimiterStats {
        self.orchestrator.rate_limiter().stats()
    }

    /// Grade one session. Either a complete result or an error; never partial.
    pub async fn grade_session(&self, trajectory: &Trajectory) -> Result<GradeResult, GradingError> {
        let meta = &trajectory.meta;
        if trajectory.chunks.is_empty() {
            return Err(GradingError::EmptyTrajectory {
                session_id: meta.session_id.clone(),
            });
        }

        let criteria = self.criteria().await;
        let started_at = Utc::now();
        self.logger().info(
            "Grading session",
            log_meta! {
                "session_id" => meta.session_id,
                "chunks" => trajectory.chunks.len(),
                "criteria_version" => criteria.version,
            },
        );

        let evaluation = self.aggregator.aggregate(trajectory, &criteria.criteria).await?;

        let programmatic = match &self.programmatic {
            Some(grader) => Some(self.run_programmatic(grader.as_ref(), meta, &trajectory.chunks).await),
            None => None,
        };
        let required_actions_met = programmatic.as_ref().and_then(|p| p.required_actions_met);

        let audit = self.scorer.score(&evaluation, &criteria, required_actions_met);
        self.emit_audit(&meta.session_id, started_at, &audit);

        self.logger().info(
            "Session graded",
            log_meta! {
                "session_id" => meta.session_id,
                "raw_score" => audit.raw_score,
                "guarded_score" => audit.guarded_score,
                "final_score" => audit.final_score,
                "confidence" => audit.confidence,
                "guards" => audit.guards,
            },
        );

        Ok(GradeResult::new(&meta.session_id, evaluation, audit, programmatic))
    }

    /// Grade several sessions with at most `concurrency` in flight.
    ///
    /// Results are returned in input order regardless of completion order.
    pub async fn grade_batch(
        &self,
        trajectories: &[Trajectory],
        concurrency: usize,
    ) -> Vec<Result<GradeResult, GradingError>> {
        let mut indexed: Vec<(usize, Result<GradeResult, GradingError>)> =
            stream::iter(trajectories.iter().enumerate())
                .map(|(index, trajectory)| async move { (index, self.grade_session(trajectory).await) })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }

    fn logger(&self) -> &Arc<dyn Logger> {
        self.orchestrator.logger()
    }

    /// Run each programmatic check on its own; a failing check is logged and
    /// recorded as missing.
    async fn run_programmatic(
        &self,
        grader: &dyn ProgrammaticGrader,
        meta: &TrajectoryMeta,
        chunks: &[Chunk],
    ) -> ProgrammaticResults {
        let completion_time_secs = match grader.evaluate_completion_time(chunks).await {
            Ok(secs) => Some(secs),
            Err(err) => {
                self.collaborator_failed("evaluate_completion_time", &meta.session_id, &err);
                None
            }
        };

        let requirements = meta.requirements();
        let required_actions_met = if requirements.is_empty() {
            None
        } else {
            match grader.check_required_actions(chunks, requirements).await {
                Ok(met) => Some(met),
                Err(err) => {
                    self.collaborator_failed("check_required_actions", &meta.session_id, &err);
                    None
                }
            }
        };

        let efficiency = match grader.calculate_efficiency_metrics(chunks).await {
            Ok(metrics) => Some(metrics),
            Err(err) => {
                self.collaborator_failed("calculate_efficiency_metrics", &meta.session_id, &err);
                None
            }
        };

        ProgrammaticResults {
            completion_time_secs,
            required_actions_met,
            efficiency,
        }
    }

    fn collaborator_failed(&self, check: &str, session_id: &str, err: &anyhow::Error) {
        let err: &(dyn std::error::Error + 'static) = err.as_ref();
        self.logger().warn(
            "Programmatic grader check failed",
            Some(err),
            log_meta! { "session_id" => session_id, "check" => check },
        );
    }

    fn emit_audit(&self, session_id: &str, started_at: chrono::DateTime<Utc>, audit: &ScoreAudit) {
        self.orchestrator.emit(RequestMetrics {
            response_id: None,
            usage: TokenUsage::default(),
            timing: RequestTiming {
                started_at,
                ended_at: Utc::now(),
                retry_count: 0,
                retry_delays_ms: Vec::new(),
            },
            context: CallContext::final_call(session_id, SCORER_MODEL),
            outcome: RequestOutcome::Success,
            error: None,
            score_audit: Some(audit.clone()),
        });
    }
}
