//! Convergence controller.
//!
//! Decides whether a comparison is good enough to stop refining. Auto and
//! manual modes are independent: a candidate can reach the auto-mode target
//! while still failing a manual bound, and the selected mode alone decides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::models::{Comparison, ConvergenceModeKind, RefinementConfig, ThresholdConfig};

/// Convergence rule for one job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergenceMode {
    /// Stop iff `score >= target`
    Auto { target: f64 },
    /// Stop iff every configured threshold passes
    Manual { thresholds: ThresholdConfig },
}

impl ConvergenceMode {
    pub fn from_config(refinement: &RefinementConfig, thresholds: &ThresholdConfig) -> Self {
        match refinement.mode {
            ConvergenceModeKind::Auto => Self::Auto {
                target: refinement.target_score,
            },
            ConvergenceModeKind::Manual => Self::Manual {
                thresholds: *thresholds,
            },
        }
    }
}

/// Named check contributing to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdCheck {
    Score,
    Tempo,
    Key,
    Energy,
    Brightness,
    Kick,
    Snare,
}

impl fmt::Display for ThresholdCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Score => "score",
            Self::Tempo => "tempo",
            Self::Key => "key",
            Self::Energy => "energy",
            Self::Brightness => "brightness",
            Self::Kick => "kick",
            Self::Snare => "snare",
        };
        write!(f, "{name}")
    }
}

/// Outcome of one convergence evaluation, with the per-check map that led to
/// it. The loop only reads `stop`; the checks are for logs and traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceDecision {
    pub stop: bool,
    pub checks: BTreeMap<ThresholdCheck, bool>,
}

impl ConvergenceDecision {
    /// Names of the checks that failed, in a stable order.
    pub fn failed_checks(&self) -> Vec<ThresholdCheck> {
        self.checks
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(check, _)| *check)
            .collect()
    }
}

/// Evaluate `comparison` under `mode`.
pub fn evaluate(comparison: &Comparison, mode: &ConvergenceMode) -> ConvergenceDecision {
    let mut checks = BTreeMap::new();

    match mode {
        ConvergenceMode::Auto { target } => {
            checks.insert(ThresholdCheck::Score, comparison.score >= *target);
        }
        ConvergenceMode::Manual { thresholds } => {
            if let Some(bound) = thresholds.max_tempo_diff {
                checks.insert(ThresholdCheck::Tempo, comparison.tempo_diff <= bound);
            }
            if thresholds.require_key_match {
                checks.insert(ThresholdCheck::Key, comparison.key_match);
            }
            if let Some(bound) = thresholds.max_energy_diff {
                checks.insert(ThresholdCheck::Energy, comparison.energy_diff <= bound);
            }
            if let Some(bound) = thresholds.max_brightness_diff {
                checks.insert(
                    ThresholdCheck::Brightness,
                    comparison.brightness_diff <= bound,
                );
            }
            if let Some(bound) = thresholds.min_kick_similarity {
                checks.insert(ThresholdCheck::Kick, comparison.kick_similarity >= bound);
            }
            if let Some(bound) = thresholds.min_snare_similarity {
                checks.insert(ThresholdCheck::Snare, comparison.snare_similarity >= bound);
            }
        }
    }

    // An empty manual check set is trivially satisfied.
    let stop = checks.values().all(|passed| *passed);
    ConvergenceDecision { stop, checks }
}

pub fn should_stop(comparison: &Comparison, mode: &ConvergenceMode) -> bool {
    evaluate(comparison, mode).stop
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect() -> Comparison {
        Comparison {
            tempo_diff: 0.0,
            key_match: true,
            energy_diff: 0.0,
            brightness_diff: 0.0,
            kick_similarity: 1.0,
            snare_similarity: 1.0,
            score: 100.0,
        }
    }

    #[test]
    fn test_auto_mode_target_is_inclusive() {
        let mut comparison = perfect();
        comparison.score = 85.0;
        assert!(should_stop(&comparison, &ConvergenceMode::Auto { target: 85.0 }));
        comparison.score = 84.999;
        assert!(!should_stop(&comparison, &ConvergenceMode::Auto { target: 85.0 }));
    }

    #[test]
    fn test_manual_mode_tempo_bound_blocks_high_score() {
        let mut comparison = perfect();
        comparison.tempo_diff = 6.0;
        comparison.score = 98.0;
        let mode = ConvergenceMode::Manual {
            thresholds: ThresholdConfig {
                max_tempo_diff: Some(5.0),
                ..ThresholdConfig::unbounded()
            },
        };
        let decision = evaluate(&comparison, &mode);
        assert!(!decision.stop);
        assert_eq!(decision.failed_checks(), vec![ThresholdCheck::Tempo]);
    }

    #[test]
    fn test_manual_mode_every_single_failure_flips_result() {
        let mode = ConvergenceMode::Manual {
            thresholds: ThresholdConfig::default(),
        };
        assert!(should_stop(&perfect(), &mode));

        let breakers: [fn(&mut Comparison); 6] = [
            |c| c.tempo_diff = 50.0,
            |c| c.key_match = false,
            |c| c.energy_diff = 0.9,
            |c| c.brightness_diff = 0.9,
            |c| c.kick_similarity = 0.1,
            |c| c.snare_similarity = 0.1,
        ];
        for breaker in breakers {
            let mut comparison = perfect();
            breaker(&mut comparison);
            assert!(!should_stop(&comparison, &mode));
        }
    }

    #[test]
    fn test_manual_mode_skips_unconfigured_bounds() {
        let mut comparison = perfect();
        comparison.key_match = false;
        comparison.kick_similarity = 0.0;
        let mode = ConvergenceMode::Manual {
            thresholds: ThresholdConfig::unbounded(),
        };
        let decision = evaluate(&comparison, &mode);
        assert!(decision.stop);
        assert!(decision.checks.is_empty());
    }

    #[test]
    fn test_from_config_selects_mode() {
        let mut refinement = RefinementConfig::default();
        let thresholds = ThresholdConfig::default();
        assert_eq!(
            ConvergenceMode::from_config(&refinement, &thresholds),
            ConvergenceMode::Auto { target: 85.0 }
        );
        refinement.mode = ConvergenceModeKind::Manual;
        assert!(matches!(
            ConvergenceMode::from_config(&refinement, &thresholds),
            ConvergenceMode::Manual { .. }
        ));
    }
}
