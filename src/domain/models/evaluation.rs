//! Judge outputs and the final grade.

use serde::{Deserialize, Serialize};

/// Version tag stamped on every [`GradeResult`].
pub const GRADE_VERSION: &str = "arbiter-grade/1";

/// Running summary produced for one evaluation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEvaluation {
    pub summary: String,
}

/// Validated session-level output of the judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FinalEvaluation {
    pub summary: String,
    /// Two to six lines or bullet points
    pub observations: String,
    pub reasoning: String,
    pub outcome_achievement: u8,
    pub process_quality: u8,
    pub efficiency: u8,
    pub confidence: u8,
    pub outcome_achievement_reasoning: String,
    pub process_quality_reasoning: String,
    pub efficiency_reasoning: String,
    pub confidence_reasoning: String,
}

impl FinalEvaluation {
    /// Narrative text the evidence-marker heuristic runs over.
    pub fn narrative(&self) -> String {
        format!("{}\n{}\n{}", self.summary, self.observations, self.reasoning)
    }
}

/// Efficiency assessment from a programmatic grader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    pub score: f64,
    pub reasoning: String,
}

/// Results contributed by a programmatic grader. Each check is independent;
/// a failed check is recorded as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgrammaticResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_actions_met: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<EfficiencyMetrics>,
}

/// Guard that altered a score or the confidence during deterministic scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreGuard {
    /// Required actions met; outcome raised to the programmatic floor
    ProgrammaticOutcomeFloor,
    /// Outcome was raised over a low judge outcome; confidence capped
    ProgrammaticContradictionCap,
    /// Too few evidence markers in the narrative; confidence capped
    SparseEvidenceCap,
    /// Near-zero judged outcome despite programmatic success; confidence capped
    ZeroOutcomeContradictionCap,
    /// Efficiency penalty reached its cap
    EfficiencyPenaltyCapped,
    /// Guarded score raised to a success floor
    SuccessFloor,
}

/// All intermediate stages of the deterministic score, retained for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreAudit {
    pub raw_score: u8,
    pub guarded_score: u8,
    pub final_score: u8,
    /// Outcome after clamping and the programmatic floor
    pub outcome_achievement: u8,
    pub process_quality: u8,
    pub efficiency: u8,
    /// Confidence after every cap
    pub confidence: u8,
    pub evidence_markers: usize,
    pub guards: Vec<ScoreGuard>,
    pub criteria_version: u64,
}

/// Immutable grade for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    pub version: String,
    pub session_id: String,
    pub summary: String,
    pub observations: String,
    pub reasoning: String,
    pub score: u8,
    pub confidence: u8,
    pub outcome_achievement: u8,
    pub process_quality: u8,
    pub efficiency: u8,
    pub outcome_achievement_reasoning: String,
    pub process_quality_reasoning: String,
    pub efficiency_reasoning: String,
    pub confidence_reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programmatic_results: Option<ProgrammaticResults>,
    pub audit: ScoreAudit,
}

impl GradeResult {
    pub fn new(
        session_id: impl Into<String>,
        evaluation: FinalEvaluation,
        audit: ScoreAudit,
        programmatic_results: Option<ProgrammaticResults>,
    ) -> Self {
        Self {
            version: GRADE_VERSION.to_string(),
            session_id: session_id.into(),
            summary: evaluation.summary,
            observations: evaluation.observations,
            reasoning: evaluation.reasoning,
            score: audit.final_score,
            confidence: audit.confidence,
            outcome_achievement: audit.outcome_achievement,
            process_quality: audit.process_quality,
            efficiency: audit.efficiency,
            outcome_achievement_reasoning: evaluation.outcome_achievement_reasoning,
            process_quality_reasoning: evaluation.process_quality_reasoning,
            efficiency_reasoning: evaluation.efficiency_reasoning,
            confidence_reasoning: evaluation.confidence_reasoning,
            programmatic_results,
            audit,
        }
    }
}
