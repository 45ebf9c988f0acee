//! One judge call per evaluation window.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::errors::GraderError;
use crate::domain::models::chunk::{Chunk, ContentItem};
use crate::domain::models::config::ChunkingConfig;
use crate::domain::models::criteria::EvaluationCriteria;
use crate::domain::models::evaluation::ChunkEvaluation;
use crate::domain::models::metrics::CallContext;
use crate::domain::models::trajectory::TrajectoryMeta;
use crate::domain::ports::ContentPart;
use crate::infrastructure::judge::{JudgePrompt, RetryOrchestrator};
use crate::services::content_sanitizer::ContentSanitizer;
use crate::services::prompt_builder::PromptBuilder;

const NO_TEXT_NOTE: &str =
    "[Context] No text or action log was captured for this segment. Judge it from the screenshots alone.";

/// Position of a window within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPosition {
    pub index: usize,
    pub total: usize,
}

/// Builds content for a window and asks the judge for a running summary.
pub struct ChunkEvaluator {
    orchestrator: Arc<RetryOrchestrator>,
    prompts: PromptBuilder,
    sanitizer: ContentSanitizer,
    max_images: usize,
    model: String,
}

impl ChunkEvaluator {
    pub fn new(
        orchestrator: Arc<RetryOrchestrator>,
        chunking: &ChunkingConfig,
        model: impl Into<String>,
    ) -> Self {
        let sanitizer = ContentSanitizer::from_config(chunking);
        Self {
            orchestrator,
            prompts: PromptBuilder::new(sanitizer),
            sanitizer,
            max_images: chunking.max_images_per_chunk,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Evaluate one window and return its trimmed running summary.
    pub async fn evaluate(
        &self,
        meta: &TrajectoryMeta,
        criteria: &EvaluationCriteria,
        window: &Chunk,
        position: WindowPosition,
        previous_summary: Option<&str>,
    ) -> Result<String, GraderError> {
        let prompt = JudgePrompt {
            system: self.prompts.chunk_system_prompt(
                meta,
                criteria,
                position.index,
                position.total,
                previous_summary,
            ),
            content: self.build_content(window),
        };
        let context = CallContext::chunk(&meta.session_id, position.index, &self.model);

        let evaluation: ChunkEvaluation = self
            .orchestrator
            .call_with_retries(prompt, context)
            .await?;
        Ok(evaluation.summary.trim().to_string())
    }

    /// Content parts for a window, in recording order.
    pub fn build_content(&self, window: &Chunk) -> Vec<ContentPart> {
        let selected = sample_evenly(window.image_count(), self.max_images);
        let mut parts = Vec::with_capacity(window.len() + 1);
        let mut has_text = false;
        let mut image_index = 0;

        for item in window.items() {
            match item {
                ContentItem::Text { text } => {
                    if let Some(text) = self.sanitizer.text(text) {
                        has_text = true;
                        parts.push(ContentPart::Text { text });
                    }
                }
                ContentItem::Image {
                    data,
                    mime_type,
                    crop_note,
                } => {
                    let keep = selected.contains(&image_index);
                    image_index += 1;
                    if !keep {
                        continue;
                    }
                    parts.push(ContentPart::Image {
                        media_type: mime_type.clone(),
                        data: Arc::clone(data),
                    });
                    if let Some(note) = crop_note.as_deref().and_then(|n| self.sanitizer.note(n)) {
                        parts.push(ContentPart::text(format!("[Image note] {note}")));
                    }
                }
                ContentItem::AppFocus {
                    focused_app,
                    available_apps,
                    timestamp,
                } => {
                    let Some(app) = self.sanitizer.note(focused_app) else {
                        continue;
                    };
                    let available: Vec<String> = available_apps
                        .iter()
                        .filter_map(|a| self.sanitizer.note(a))
                        .collect();
                    let line = if available.is_empty() {
                        format!("[App focus {}] {app}", timestamp.to_rfc3339())
                    } else {
                        format!(
                            "[App focus {}] {app} (open: {})",
                            timestamp.to_rfc3339(),
                            available.join(", ")
                        )
                    };
                    parts.push(ContentPart::text(line));
                }
            }
        }

        if !has_text {
            parts.insert(0, ContentPart::text(NO_TEXT_NOTE));
        }
        parts
    }
}

/// Indices of `limit` images spread evenly over `count`, first and last included.
fn sample_evenly(count: usize, limit: usize) -> BTreeSet<usize> {
    if count <= limit {
        return (0..count).collect();
    }
    match limit {
        0 => BTreeSet::new(),
        1 => BTreeSet::from([0]),
        _ => (0..limit)
            .map(|i| (i * (count - 1) + (limit - 1) / 2) / (limit - 1))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::RetryConfig;
    use crate::domain::ports::{JudgeCallError, JudgeClient, JudgeRequest, JudgeResponse, Level, LogMeta, Logger};
    use crate::infrastructure::judge::TokenBucketRateLimiter;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;

    struct Echo(Mutex<Vec<JudgeRequest>>);

    #[async_trait]
    impl JudgeClient for Echo {
        async fn submit(&self, request: JudgeRequest) -> Result<JudgeResponse, JudgeCallError> {
            self.0.lock().unwrap().push(request);
            Ok(JudgeResponse {
                id: "r".into(),
                structured: Some(json!({ "summary": "  user opened settings  " })),
                ..JudgeResponse::default()
            })
        }
    }

    struct Silent;

    impl Logger for Silent {
        fn log(&self, _: Level, _: &str, _: Option<&(dyn std::error::Error + 'static)>, _: LogMeta) {}
    }

    fn evaluator(judge: Arc<Echo>, max_images: usize) -> ChunkEvaluator {
        let orchestrator = RetryOrchestrator::new(
            judge,
            TokenBucketRateLimiter::new(10.0, 10.0),
            &RetryConfig::default(),
            Arc::new(Silent),
        );
        let chunking = ChunkingConfig {
            max_images_per_chunk: max_images,
            ..ChunkingConfig::default()
        };
        ChunkEvaluator::new(Arc::new(orchestrator), &chunking, "judge-model")
    }

    fn image(tag: u8) -> ContentItem {
        ContentItem::image(vec![tag], "image/png")
    }

    fn image_tags(parts: &[ContentPart]) -> Vec<u8> {
        parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Image { data, .. } => Some(data[0]),
                ContentPart::Text { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_sample_evenly_keeps_ends() {
        assert_eq!(sample_evenly(3, 6), BTreeSet::from([0, 1, 2]));
        assert_eq!(sample_evenly(10, 3), BTreeSet::from([0, 5, 9]));
        assert_eq!(sample_evenly(10, 2), BTreeSet::from([0, 9]));
        assert_eq!(sample_evenly(10, 1), BTreeSet::from([0]));
        assert!(sample_evenly(10, 0).is_empty());
        assert_eq!(sample_evenly(7, 6).len(), 6);
    }

    #[test]
    fn test_content_caps_images_and_sanitizes_text() {
        let evaluator = evaluator(Arc::new(Echo(Mutex::new(vec![]))), 2);
        let mut items = vec![ContentItem::text("typed\u{0007} <script>x()</script>hello")];
        items.extend((0..5).map(image));
        let parts = evaluator.build_content(&Chunk::new(items));

        assert_eq!(parts[0], ContentPart::text("typed hello"));
        assert_eq!(image_tags(&parts), vec![0, 4]);
    }

    #[test]
    fn test_crop_notes_follow_their_image() {
        let evaluator = evaluator(Arc::new(Echo(Mutex::new(vec![]))), 6);
        let parts = evaluator.build_content(&Chunk::new(vec![
            ContentItem::text("start"),
            ContentItem::image_with_note(vec![1], "image/png", "zoomed on toolbar"),
        ]));
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], ContentPart::text("[Image note] zoomed on toolbar"));
    }

    #[test]
    fn test_synthetic_note_without_text() {
        let evaluator = evaluator(Arc::new(Echo(Mutex::new(vec![]))), 6);
        let parts = evaluator.build_content(&Chunk::new(vec![
            image(1),
            ContentItem::app_focus("Finder", vec!["Safari".into()], Utc::now()),
            ContentItem::text("  \u{0000} "),
        ]));
        assert_eq!(parts[0], ContentPart::text(NO_TEXT_NOTE));
        assert!(matches!(&parts[2], ContentPart::Text { text } if text.contains("Finder (open: Safari)")));
    }

    #[tokio::test]
    async fn test_evaluate_returns_trimmed_summary() {
        let judge = Arc::new(Echo(Mutex::new(vec![])));
        let evaluator = evaluator(Arc::clone(&judge), 6);
        let meta = TrajectoryMeta::new("s-1");

        let summary = evaluator
            .evaluate(
                &meta,
                &EvaluationCriteria::default(),
                &Chunk::new(vec![ContentItem::text("clicked settings")]),
                WindowPosition { index: 1, total: 2 },
                Some("previous"),
            )
            .await
            .unwrap();

        assert_eq!(summary, "user opened settings");
        let requests = judge.0.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "judge-model");
        assert_eq!(requests[0].schema.name, "record_chunk_summary");
        assert!(requests[0].system.contains("previous"));
    }
}
