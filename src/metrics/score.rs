//! Composite efficiency score.
//!
//! ```text
//! score = 0.30 * (1 - redundancy)
//!       + 0.30 * reuse
//!       + 0.20 * (1 - min(loops / 10, 1))
//!       + 0.20 * (1 - min(excess / 3, 1))
//! ```
//!
//! clamped to `[0, 1]`. Weights and divisors are fixed, not configurable.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const REDUNDANCY_WEIGHT: f64 = 0.30;
pub const REUSE_WEIGHT: f64 = 0.30;
pub const LOOPS_WEIGHT: f64 = 0.20;
pub const EXCESS_WEIGHT: f64 = 0.20;

/// Average loop count that zeroes the refinement component.
pub const LOOPS_CEILING: f64 = 10.0;
/// Excess ratio that zeroes the excess component.
pub const EXCESS_CEILING: f64 = 3.0;

/// The four sub-metrics the score is built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInputs {
    #[serde(alias = "redundancy")]
    pub redundancy_rate: f64,
    #[serde(alias = "reuse")]
    pub reuse_rate: f64,
    #[serde(alias = "loops")]
    pub refinement_loops: f64,
    #[serde(alias = "excess")]
    pub excess_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EfficiencyLevel {
    #[serde(rename = "High Efficiency")]
    High,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Wasteful")]
    Wasteful,
}

impl EfficiencyLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            Self::High
        } else if score >= 0.50 {
            Self::Moderate
        } else {
            Self::Wasteful
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High Efficiency",
            Self::Moderate => "Moderate",
            Self::Wasteful => "Wasteful",
        }
    }
}

impl fmt::Display for EfficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Weighted contribution of each sub-metric, already multiplied by its weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub redundancy: f64,
    pub reuse: f64,
    pub refinement: f64,
    pub excess: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EfficiencyScore {
    pub score: f64,
    pub level: EfficiencyLevel,
    pub breakdown: ScoreBreakdown,
}

pub fn composite(inputs: &ScoreInputs) -> EfficiencyScore {
    let breakdown = ScoreBreakdown {
        redundancy: REDUNDANCY_WEIGHT * (1.0 - inputs.redundancy_rate),
        reuse: REUSE_WEIGHT * inputs.reuse_rate,
        refinement: LOOPS_WEIGHT * (1.0 - (inputs.refinement_loops / LOOPS_CEILING).min(1.0)),
        excess: EXCESS_WEIGHT * (1.0 - (inputs.excess_ratio / EXCESS_CEILING).min(1.0)),
    };
    let raw = breakdown.redundancy + breakdown.reuse + breakdown.refinement + breakdown.excess;
    // NaN inputs collapse to 0 instead of escaping the clamp.
    let score = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) };

    EfficiencyScore {
        score,
        level: EfficiencyLevel::from_score(score),
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(redundancy: f64, reuse: f64, loops: f64, excess: f64) -> ScoreInputs {
        ScoreInputs {
            redundancy_rate: redundancy,
            reuse_rate: reuse,
            refinement_loops: loops,
            excess_ratio: excess,
        }
    }

    #[test]
    fn ideal_usage_scores_high() {
        let result = composite(&inputs(0.0, 1.0, 0.0, 1.0));
        assert!((result.score - 0.933_333).abs() < 1e-4, "got {}", result.score);
        assert_eq!(result.level, EfficiencyLevel::High);
    }

    #[test]
    fn breakdown_sums_to_score() {
        let result = composite(&inputs(0.25, 0.5, 3.0, 1.5));
        let b = result.breakdown;
        assert!((b.redundancy + b.reuse + b.refinement + b.excess - result.score).abs() < 1e-12);
        assert_eq!(result.level, EfficiencyLevel::Moderate);
    }

    #[test]
    fn worst_case_is_wasteful() {
        let result = composite(&inputs(1.0, 0.0, 12.0, 5.0));
        assert_eq!(result.score, 0.0);
        assert_eq!(result.level, EfficiencyLevel::Wasteful);
    }

    #[test]
    fn score_is_always_clamped() {
        let extremes = [-10.0, -1.0, 0.0, 0.5, 1.0, 2.0, 100.0];
        for &r in &extremes {
            for &u in &extremes {
                for &l in &extremes {
                    for &e in &extremes {
                        let score = composite(&inputs(r, u, l, e)).score;
                        assert!((0.0..=1.0).contains(&score));
                    }
                }
            }
        }
        assert_eq!(composite(&inputs(f64::NAN, 0.0, 0.0, 0.0)).score, 0.0);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(EfficiencyLevel::from_score(0.75), EfficiencyLevel::High);
        assert_eq!(EfficiencyLevel::from_score(0.7499), EfficiencyLevel::Moderate);
        assert_eq!(EfficiencyLevel::from_score(0.5), EfficiencyLevel::Moderate);
        assert_eq!(EfficiencyLevel::from_score(0.4999), EfficiencyLevel::Wasteful);
    }

    #[test]
    fn inputs_accept_short_aliases() {
        let parsed: ScoreInputs =
            serde_json::from_str(r#"{"redundancy":0.1,"reuse":0.6,"loops":2,"excess":1.2}"#)
                .unwrap();
        assert_eq!(parsed.refinement_loops, 2.0);
        assert_eq!(
            serde_json::to_value(EfficiencyLevel::High).unwrap(),
            serde_json::json!("High Efficiency")
        );
    }
}
