//! Scoring weights.
//!
//! Weights are always stored normalized so the three components sum to 100.
//! Updates produce a new [`CriteriaSnapshot`] that replaces the old one as a
//! whole; readers never observe a half-applied update.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance used when checking that normalized weights sum to 100.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CriteriaError {
    #[error("Invalid weight for {field}: {value}. Must be positive and finite")]
    InvalidWeight { field: &'static str, value: f64 },
}

/// Relative importance of the three judged components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluationCriteria {
    pub outcome_achievement: f64,
    pub process_quality: f64,
    pub efficiency: f64,
}

impl Default for EvaluationCriteria {
    fn default() -> Self {
        Self {
            outcome_achievement: 50.0,
            process_quality: 30.0,
            efficiency: 20.0,
        }
    }
}

impl EvaluationCriteria {
    /// Build normalized criteria from raw positive weights.
    pub fn new(outcome_achievement: f64, process_quality: f64, efficiency: f64) -> Result<Self, CriteriaError> {
        validate_weight("outcome_achievement", outcome_achievement)?;
        validate_weight("process_quality", process_quality)?;
        validate_weight("efficiency", efficiency)?;

        Ok(Self {
            outcome_achievement,
            process_quality,
            efficiency,
        }
        .normalized())
    }

    /// Rescale so the weights sum to exactly 100.
    fn normalized(self) -> Self {
        let total = self.outcome_achievement + self.process_quality + self.efficiency;
        let outcome_achievement = self.outcome_achievement * 100.0 / total;
        let process_quality = self.process_quality * 100.0 / total;
        // Derive the last weight from the other two so rounding error cannot drift the sum.
        let efficiency = 100.0 - outcome_achievement - process_quality;
        Self {
            outcome_achievement,
            process_quality,
            efficiency,
        }
    }

    pub fn sum(&self) -> f64 {
        self.outcome_achievement + self.process_quality + self.efficiency
    }

    /// Apply a partial update, validating every provided value.
    pub fn apply(&self, update: &CriteriaUpdate) -> Result<Self, CriteriaError> {
        Self::new(
            update.outcome_achievement.unwrap_or(self.outcome_achievement),
            update.process_quality.unwrap_or(self.process_quality),
            update.efficiency.unwrap_or(self.efficiency),
        )
    }
}

fn validate_weight(field: &'static str, value: f64) -> Result<(), CriteriaError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CriteriaError::InvalidWeight { field, value })
    }
}

/// Partial weight update. Missing fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaUpdate {
    #[serde(default)]
    pub outcome_achievement: Option<f64>,
    #[serde(default)]
    pub process_quality: Option<f64>,
    #[serde(default)]
    pub efficiency: Option<f64>,
}

impl CriteriaUpdate {
    /// Reject the update if any provided value is non-positive or non-finite.
    pub fn validate(&self) -> Result<(), CriteriaError> {
        for (field, value) in [
            ("outcome_achievement", self.outcome_achievement),
            ("process_quality", self.process_quality),
            ("efficiency", self.efficiency),
        ] {
            if let Some(value) = value {
                validate_weight(field, value)?;
            }
        }
        Ok(())
    }
}

/// Immutable, versioned criteria value owned by a grading engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSnapshot {
    pub version: u64,
    pub criteria: EvaluationCriteria,
}

impl CriteriaSnapshot {
    pub const fn initial(criteria: EvaluationCriteria) -> Self {
        Self {
            version: 1,
            criteria,
        }
    }

    /// Produce the successor snapshot for an update.
    pub fn next(&self, update: &CriteriaUpdate) -> Result<Self, CriteriaError> {
        update.validate()?;
        Ok(Self {
            version: self.version + 1,
            criteria: self.criteria.apply(update)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_100() {
        let criteria = EvaluationCriteria::default();
        assert!((criteria.sum() - 100.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_new_normalizes() {
        let criteria = EvaluationCriteria::new(1.0, 1.0, 2.0).unwrap();
        assert!((criteria.outcome_achievement - 25.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((criteria.efficiency - 50.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((criteria.sum() - 100.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_rejects_invalid_values() {
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let update = CriteriaUpdate {
                efficiency: Some(bad),
                ..CriteriaUpdate::default()
            };
            let snapshot = CriteriaSnapshot::initial(EvaluationCriteria::default());
            assert!(snapshot.next(&update).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn test_partial_update_bumps_version() {
        let snapshot = CriteriaSnapshot::initial(EvaluationCriteria::default());
        let update = CriteriaUpdate {
            outcome_achievement: Some(80.0),
            ..CriteriaUpdate::default()
        };

        let next = snapshot.next(&update).unwrap();

        assert_eq!(next.version, 2);
        // 80 / (80 + 30 + 20) * 100
        assert!((next.criteria.outcome_achievement - 61.538_461_538_461_54).abs() < 1e-9);
        assert!((next.criteria.sum() - 100.0).abs() < WEIGHT_SUM_TOLERANCE);
    }
}
