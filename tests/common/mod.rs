//! Common test utilities for integration tests
//!
//! Provides a scripted judge, a configurable programmatic grader, and
//! trajectory fixtures shared across the integration test files.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use arbiter::domain::models::{
    Chunk, Config, ContentItem, EfficiencyMetrics, Trajectory, TrajectoryMeta,
};
use arbiter::domain::ports::{
    JudgeCallError, JudgeClient, JudgeRequest, JudgeResponse, Level, LogMeta, Logger,
    ProgrammaticGrader,
};
use arbiter::infrastructure::metrics::InMemoryMetricsCollector;
use arbiter::services::GradingEngine;
use async_trait::async_trait;
use serde_json::{json, Value};

pub const CHUNK_SCHEMA: &str = "record_chunk_summary";
pub const FINAL_SCHEMA: &str = "record_final_evaluation";

pub type Reply = Result<JudgeResponse, JudgeCallError>;

/// Judge that answers from per-schema scripts and records every request.
///
/// When a script runs dry, chunk calls answer `"summary N"` (N counting from
/// 1) and final calls answer the configured final payload.
pub struct ScriptedJudge {
    chunk_replies: Mutex<VecDeque<Reply>>,
    final_replies: Mutex<VecDeque<Reply>>,
    final_payload: Value,
    requests: Mutex<Vec<JudgeRequest>>,
}

impl ScriptedJudge {
    pub fn new(final_payload: Value) -> Arc<Self> {
        Self::with_scripts(vec![], vec![], final_payload)
    }

    pub fn with_scripts(chunk_replies: Vec<Reply>, final_replies: Vec<Reply>, final_payload: Value) -> Arc<Self> {
        Arc::new(Self {
            chunk_replies: Mutex::new(chunk_replies.into()),
            final_replies: Mutex::new(final_replies.into()),
            final_payload,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<JudgeRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, schema: &str) -> Vec<JudgeRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.schema.name == schema)
            .collect()
    }
}

#[async_trait]
impl JudgeClient for ScriptedJudge {
    async fn submit(&self, request: JudgeRequest) -> Result<JudgeResponse, JudgeCallError> {
        let is_final = request.schema.name == FINAL_SCHEMA;
        let chunk_calls = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.iter().filter(|r| r.schema.name == CHUNK_SCHEMA).count()
        };

        let scripted = if is_final {
            self.final_replies.lock().unwrap().pop_front()
        } else {
            self.chunk_replies.lock().unwrap().pop_front()
        };
        scripted.unwrap_or_else(|| {
            if is_final {
                structured(self.final_payload.clone())
            } else {
                structured(json!({ "summary": format!("summary {chunk_calls}") }))
            }
        })
    }
}

pub fn structured(payload: Value) -> Reply {
    Ok(JudgeResponse {
        id: "msg_test".into(),
        structured: Some(payload),
        ..JudgeResponse::default()
    })
}

pub fn text_reply(text: &str) -> Reply {
    Ok(JudgeResponse {
        id: "msg_text".into(),
        text: Some(text.into()),
        ..JudgeResponse::default()
    })
}

pub fn final_payload(outcome: u8, process: u8, efficiency: u8, confidence: u8) -> Value {
    json!({
        "summary": "The user opened System Settings and enabled dark mode.",
        "observations": "- User clicked \"Appearance\" in the sidebar\n- The screenshot at 00:42 shows Dark active\n- Settings window closed afterwards",
        "reasoning": "The final frame shows the requested state.",
        "outcome_achievement": outcome,
        "process_quality": process,
        "efficiency": efficiency,
        "confidence": confidence,
        "outcome_achievement_reasoning": "Dark mode is active at the end.",
        "process_quality_reasoning": "Direct navigation.",
        "efficiency_reasoning": "One detour through Finder.",
        "confidence_reasoning": "Clear screenshots."
    })
}

/// Programmatic grader with fixed answers. `None` makes the check fail.
pub struct StubGrader {
    pub completion_time: Option<f64>,
    pub required_actions: Option<bool>,
    pub efficiency: Option<f64>,
    calls: Mutex<Vec<&'static str>>,
}

impl StubGrader {
    pub fn new(completion_time: Option<f64>, required_actions: Option<bool>, efficiency: Option<f64>) -> Arc<Self> {
        Arc::new(Self {
            completion_time,
            required_actions,
            efficiency,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgrammaticGrader for StubGrader {
    async fn evaluate_completion_time(&self, _chunks: &[Chunk]) -> anyhow::Result<f64> {
        self.calls.lock().unwrap().push("completion_time");
        self.completion_time.ok_or_else(|| anyhow!("no timestamps"))
    }

    async fn check_required_actions(&self, _chunks: &[Chunk], _requirements: &[String]) -> anyhow::Result<bool> {
        self.calls.lock().unwrap().push("required_actions");
        self.required_actions.ok_or_else(|| anyhow!("action log unreadable"))
    }

    async fn calculate_efficiency_metrics(&self, _chunks: &[Chunk]) -> anyhow::Result<EfficiencyMetrics> {
        self.calls.lock().unwrap().push("efficiency");
        self.efficiency
            .map(|score| EfficiencyMetrics {
                score,
                reasoning: "stub".into(),
            })
            .ok_or_else(|| anyhow!("efficiency unavailable"))
    }
}

/// Logger that keeps every message, for asserting on what was logged.
#[derive(Default)]
pub struct CapturingLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl CapturingLogger {
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Logger for CapturingLogger {
    fn log(&self, level: Level, message: &str, _error: Option<&(dyn std::error::Error + 'static)>, _meta: LogMeta) {
        self.entries.lock().unwrap().push((level, message.to_string()));
    }
}

/// A trajectory of `chunks` single-text chunks.
pub fn trajectory(session_id: &str, chunks: usize) -> Trajectory {
    let chunks = (0..chunks)
        .map(|i| Chunk::new(vec![ContentItem::text(format!("step {i}: clicked button {i}"))]))
        .collect();
    Trajectory::new(
        TrajectoryMeta::new(session_id)
            .with_task_description("Enable dark mode")
            .with_requirements(vec!["open appearance settings".into()]),
        chunks,
    )
}

/// Config with fast retries and a roomy rate limit.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.rate_limit.max_tokens = 100.0;
    config.rate_limit.refill_rate = 100.0;
    config.retry.max_retries = 3;
    config.retry.timeout_ms = 5_000;
    config
}

pub struct Harness {
    pub judge: Arc<ScriptedJudge>,
    pub metrics: Arc<InMemoryMetricsCollector>,
    pub logger: Arc<CapturingLogger>,
    pub engine: GradingEngine,
}

pub fn harness(judge: Arc<ScriptedJudge>, config: Config, grader: Option<Arc<StubGrader>>) -> Harness {
    let metrics = Arc::new(InMemoryMetricsCollector::new());
    let logger = Arc::new(CapturingLogger::default());
    let mut builder = GradingEngine::builder(judge.clone(), config, logger.clone()).metrics(metrics.clone());
    if let Some(grader) = grader {
        builder = builder.programmatic_grader(grader);
    }
    Harness {
        judge,
        metrics,
        logger,
        engine: builder.build().expect("engine builds"),
    }
}
