//! Deterministic scoring of judged component scores.
//!
//! The judge supplies four 0-100 numbers. This module turns them into the
//! final grade in three audited stages:
//!
//! 1. **raw**: weighted sum under the current criteria
//! 2. **guarded**: outcome/process blend, efficiency allowed only to subtract
//!    (capped), then success floors keyed on the outcome
//! 3. **final**: piecewise calibration of the guarded score plus a
//!    high-outcome bonus
//!
//! Before weighting, the programmatic floor and the confidence caps are
//! applied. Every guard that changes a value is recorded in the audit.

use crate::domain::models::config::CalibrationConfig;
use crate::domain::models::criteria::{CriteriaSnapshot, EvaluationCriteria};
use crate::domain::models::evaluation::{FinalEvaluation, ScoreAudit, ScoreGuard};
use crate::services::evidence::count_evidence_markers;

/// Component scores as produced by the judge, before any guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentScores {
    pub outcome_achievement: f64,
    pub process_quality: f64,
    pub efficiency: f64,
    pub confidence: f64,
}

impl From<&FinalEvaluation> for ComponentScores {
    fn from(evaluation: &FinalEvaluation) -> Self {
        Self {
            outcome_achievement: f64::from(evaluation.outcome_achievement),
            process_quality: f64::from(evaluation.process_quality),
            efficiency: f64::from(evaluation.efficiency),
            confidence: f64::from(evaluation.confidence),
        }
    }
}

/// Pure scorer; identical inputs always give an identical [`ScoreAudit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeterministicScorer {
    calibration: CalibrationConfig,
}

impl DeterministicScorer {
    pub const fn new(calibration: CalibrationConfig) -> Self {
        Self { calibration }
    }

    pub const fn calibration(&self) -> &CalibrationConfig {
        &self.calibration
    }

    /// Score a validated final evaluation.
    ///
    /// `required_actions_met` is the programmatic grader's verdict, `None`
    /// when no grader is configured or its check failed.
    pub fn score(
        &self,
        evaluation: &FinalEvaluation,
        criteria: &CriteriaSnapshot,
        required_actions_met: Option<bool>,
    ) -> ScoreAudit {
        let markers = count_evidence_markers(&evaluation.narrative());
        self.score_components(
            ComponentScores::from(evaluation),
            criteria,
            required_actions_met,
            markers,
        )
    }

    pub fn score_components(
        &self,
        scores: ComponentScores,
        criteria: &CriteriaSnapshot,
        required_actions_met: Option<bool>,
        evidence_markers: usize,
    ) -> ScoreAudit {
        let c = &self.calibration;
        let mut guards = Vec::new();

        let judged_outcome = clamp_score(scores.outcome_achievement);
        let mut outcome = judged_outcome;
        let process = clamp_score(scores.process_quality);
        let efficiency = clamp_score(scores.efficiency);
        let mut confidence = clamp_score(scores.confidence);

        let actions_met = required_actions_met == Some(true);
        if actions_met && outcome < c.programmatic_outcome_floor {
            outcome = c.programmatic_outcome_floor;
            guards.push(ScoreGuard::ProgrammaticOutcomeFloor);

            if judged_outcome < c.contradiction_outcome_threshold {
                cap(
                    &mut confidence,
                    c.contradiction_confidence_cap,
                    ScoreGuard::ProgrammaticContradictionCap,
                    &mut guards,
                );
            }
        }

        if evidence_markers < c.min_evidence_markers {
            cap(
                &mut confidence,
                c.sparse_evidence_confidence_cap,
                ScoreGuard::SparseEvidenceCap,
                &mut guards,
            );
        }
        if actions_met && judged_outcome <= c.zero_outcome_threshold {
            cap(
                &mut confidence,
                c.zero_outcome_confidence_cap,
                ScoreGuard::ZeroOutcomeContradictionCap,
                &mut guards,
            );
        }

        let weights = &criteria.criteria;
        let raw_score = to_score(raw_blend(weights, outcome, process, efficiency));
        let guarded_score = self.guarded(weights, outcome, process, efficiency, &mut guards);
        let final_score = self.calibrate(guarded_score, outcome);

        ScoreAudit {
            raw_score,
            guarded_score,
            final_score,
            outcome_achievement: to_score(outcome),
            process_quality: to_score(process),
            efficiency: to_score(efficiency),
            confidence: to_score(confidence),
            evidence_markers,
            guards,
            criteria_version: criteria.version,
        }
    }

    fn guarded(
        &self,
        weights: &EvaluationCriteria,
        outcome: f64,
        process: f64,
        efficiency: f64,
        guards: &mut Vec<ScoreGuard>,
    ) -> u8 {
        let c = &self.calibration;
        let core_weight = weights.outcome_achievement + weights.process_quality;
        let base = if core_weight > 0.0 {
            (outcome * weights.outcome_achievement + process * weights.process_quality) / core_weight
        } else {
            0.0
        };

        let mut delta = ((efficiency - base) * weights.efficiency / 100.0).min(0.0);
        if delta < -c.max_efficiency_penalty {
            delta = -c.max_efficiency_penalty;
            guards.push(ScoreGuard::EfficiencyPenaltyCapped);
        }

        let mut guarded = base + delta;
        let floor = if outcome >= c.high_success_outcome {
            Some(c.high_success_floor)
        } else if outcome >= c.partial_success_outcome {
            Some(c.partial_success_floor)
        } else {
            None
        };
        if let Some(floor) = floor {
            if guarded < floor {
                guarded = floor;
                guards.push(ScoreGuard::SuccessFloor);
            }
        }

        to_score(guarded)
    }

    fn calibrate(&self, guarded: u8, outcome: f64) -> u8 {
        let c = &self.calibration;
        let g = f64::from(guarded);
        let mut calibrated = if g < c.low_band_upper {
            g * c.low_band_multiplier
        } else if g < c.mid_band_upper {
            g * c.mid_band_multiplier + c.mid_band_offset
        } else {
            g * c.high_band_multiplier + c.high_band_offset
        };
        if outcome >= c.bonus_outcome_threshold {
            calibrated += c.bonus_points;
        }
        to_score(calibrated)
    }
}

fn raw_blend(weights: &EvaluationCriteria, outcome: f64, process: f64, efficiency: f64) -> f64 {
    (outcome * weights.outcome_achievement
        + process * weights.process_quality
        + efficiency * weights.efficiency)
        / 100.0
}

fn cap(value: &mut f64, limit: f64, guard: ScoreGuard, guards: &mut Vec<ScoreGuard>) {
    if *value > limit {
        *value = limit;
        guards.push(guard);
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn to_score(value: f64) -> u8 {
    clamp_score(value).round() as u8
}
