//! Sequential window evaluation followed by one final aggregation call.

use std::sync::Arc;

use crate::domain::errors::GraderError;
use crate::domain::models::chunk::AppUsageStats;
use crate::domain::models::config::ChunkingConfig;
use crate::domain::models::criteria::EvaluationCriteria;
use crate::domain::models::evaluation::FinalEvaluation;
use crate::domain::models::metrics::CallContext;
use crate::domain::models::trajectory::Trajectory;
use crate::domain::ports::ContentPart;
use crate::infrastructure::judge::{JudgePrompt, RetryOrchestrator};
use crate::log_meta;
use crate::services::chunk_evaluator::{ChunkEvaluator, WindowPosition};
use crate::services::content_sanitizer::ContentSanitizer;
use crate::services::prompt_builder::PromptBuilder;

/// Drives a session's windows in order, then asks for the final evaluation.
///
/// Window `i + 1` is prompted with the summary of window `i`, so windows of
/// one session are never evaluated concurrently.
pub struct SessionAggregator {
    orchestrator: Arc<RetryOrchestrator>,
    chunk_evaluator: ChunkEvaluator,
    prompts: PromptBuilder,
    chunks_per_call: usize,
    final_model: String,
}

impl SessionAggregator {
    pub fn new(
        orchestrator: Arc<RetryOrchestrator>,
        chunking: &ChunkingConfig,
        chunk_model: impl Into<String>,
        final_model: impl Into<String>,
    ) -> Self {
        Self {
            chunk_evaluator: ChunkEvaluator::new(Arc::clone(&orchestrator), chunking, chunk_model),
            orchestrator,
            prompts: PromptBuilder::new(ContentSanitizer::from_config(chunking)),
            chunks_per_call: chunking.chunks_per_call,
            final_model: final_model.into(),
        }
    }

    pub fn final_model(&self) -> &str {
        &self.final_model
    }

    /// Evaluate every window, then issue exactly one final call.
    pub async fn aggregate(
        &self,
        trajectory: &Trajectory,
        criteria: &EvaluationCriteria,
    ) -> Result<FinalEvaluation, GraderError> {
        let meta = &trajectory.meta;
        let windows = trajectory.windows(self.chunks_per_call);
        let total = windows.len();
        let mut summaries: Vec<String> = Vec::with_capacity(total);

        for (index, window) in windows.iter().enumerate() {
            let summary = self
                .chunk_evaluator
                .evaluate(
                    meta,
                    criteria,
                    window,
                    WindowPosition { index, total },
                    summaries.last().map(String::as_str),
                )
                .await?;
            self.orchestrator.logger().debug(
                "Window evaluated",
                log_meta! {
                    "session_id" => meta.session_id,
                    "chunk_index" => index,
                    "total_windows" => total,
                    "summary_chars" => summary.chars().count(),
                },
            );
            summaries.push(summary);
        }

        let app_usage = AppUsageStats::from_chunks(&trajectory.chunks);
        let prompt = JudgePrompt {
            system: self.prompts.final_system_prompt(meta, criteria),
            content: vec![ContentPart::text(self.prompts.final_user_content(
                &summaries,
                &app_usage,
                meta.target_app(),
            ))],
        };

        self.orchestrator
            .call_with_retries(prompt, CallContext::final_call(&meta.session_id, &self.final_model))
            .await
    }
}
