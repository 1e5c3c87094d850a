//! Feature comparator.
//!
//! Pure scoring of a candidate rendering against the reference. Every
//! discrepancy is turned into a bounded sub-score in [0, 1] and folded into a
//! weighted score in [0, 100]:
//!
//! - tempo, energy, brightness: `1 - min(diff / cap, 1)`
//! - key: 1 on match, 0 otherwise
//! - kick, snare: the rhythm similarity ratio
//!
//! The weighted sum is normalised by the weight total, so overriding weights
//! that do not sum to 1.0 still yields a score within range.

use crate::domain::models::{Comparison, FeatureVector, ScoreCaps, WeightConfig};

/// Window (in beats) within which a candidate onset matches a reference onset.
pub const RHYTHM_TOLERANCE_BEATS: f64 = 0.125;

/// Compare two feature vectors with the default diff caps.
///
/// `weights` falls back to [`WeightConfig::default`].
pub fn compare(
    reference: &FeatureVector,
    candidate: &FeatureVector,
    weights: Option<&WeightConfig>,
) -> Comparison {
    let comparator = FeatureComparator::new(
        weights.copied().unwrap_or_default(),
        ScoreCaps::default(),
    );
    comparator.compare(reference, candidate)
}

/// Comparator bound to one job's weights and caps.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureComparator {
    weights: WeightConfig,
    caps: ScoreCaps,
}

impl FeatureComparator {
    pub const fn new(weights: WeightConfig, caps: ScoreCaps) -> Self {
        Self { weights, caps }
    }

    pub const fn weights(&self) -> &WeightConfig {
        &self.weights
    }

    pub fn compare(&self, reference: &FeatureVector, candidate: &FeatureVector) -> Comparison {
        let tempo_diff = (reference.tempo - candidate.tempo).abs();
        let key_match = reference.key == candidate.key;
        let energy_diff = (reference.energy - candidate.energy).abs();
        let brightness_diff = (reference.brightness - candidate.brightness).abs();
        let kick_similarity =
            rhythm_similarity(&reference.kick_positions, &candidate.kick_positions);
        let snare_similarity =
            rhythm_similarity(&reference.snare_positions, &candidate.snare_positions);

        let w = &self.weights;
        let weighted_sum = w.tempo * capped_sub_score(tempo_diff, self.caps.tempo)
            + w.key * if key_match { 1.0 } else { 0.0 }
            + w.energy * capped_sub_score(energy_diff, self.caps.energy)
            + w.brightness * capped_sub_score(brightness_diff, self.caps.brightness)
            + w.kick * kick_similarity
            + w.snare * snare_similarity;

        let total_weight = w.total();
        let score = if total_weight <= f64::EPSILON {
            0.0
        } else {
            round_score((weighted_sum / total_weight * 100.0).clamp(0.0, 100.0))
        };

        Comparison {
            tempo_diff,
            key_match,
            energy_diff,
            brightness_diff,
            kick_similarity,
            snare_similarity,
            score,
        }
    }
}

/// Fraction of reference onsets with a candidate onset within
/// [`RHYTHM_TOLERANCE_BEATS`].
///
/// Two empty sequences are perfectly similar. If exactly one side is empty
/// there is nothing to match and the result is 0.0. Positions are compared on
/// a straight line; offsets are not wrapped around the cycle boundary.
pub fn rhythm_similarity(reference: &[f64], candidate: &[f64]) -> f64 {
    match (reference.is_empty(), candidate.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let matched = reference
        .iter()
        .filter(|r| {
            candidate
                .iter()
                .any(|c| (*r - c).abs() <= RHYTHM_TOLERANCE_BEATS)
        })
        .count();

    matched as f64 / reference.len() as f64
}

fn capped_sub_score(diff: f64, cap: f64) -> f64 {
    if !diff.is_finite() || cap <= 0.0 {
        return 0.0;
    }
    1.0 - (diff / cap).min(1.0)
}

/// Round to 3 decimals so equal inputs give bit-identical, readable scores.
fn round_score(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MusicalKey;

    fn reference() -> FeatureVector {
        FeatureVector::new(120.0, MusicalKey::major(0))
            .with_energy(0.7)
            .with_brightness(0.4)
            .with_rhythm(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 3.0])
    }

    #[test]
    fn test_identical_features_score_100() {
        let result = compare(&reference(), &reference(), None);
        assert!((result.score - 100.0).abs() < f64::EPSILON);
        assert!(result.key_match);
        assert!((result.kick_similarity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tempo_diff_at_cap_removes_tempo_weight() {
        let mut candidate = reference();
        candidate.tempo = 140.0;
        let result = compare(&reference(), &candidate, None);
        assert!((result.tempo_diff - 20.0).abs() < f64::EPSILON);
        assert!((result.score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_diff_beyond_cap_is_clamped() {
        let mut candidate = reference();
        candidate.tempo = 200.0;
        let result = compare(&reference(), &candidate, None);
        assert!((result.score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_half_cap_gives_half_weight() {
        let mut candidate = reference();
        candidate.energy = 0.45;
        let result = compare(&reference(), &candidate, None);
        // energy weight 0.15, half lost
        assert!((result.score - 92.5).abs() < 1e-9);
    }

    #[test]
    fn test_key_mismatch_costs_key_weight() {
        let mut candidate = reference();
        candidate.key = MusicalKey::minor(9);
        let result = compare(&reference(), &candidate, None);
        assert!(!result.key_match);
        assert!((result.score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_weights_are_normalised() {
        let weights = WeightConfig {
            tempo: 2.0,
            key: 2.0,
            energy: 0.0,
            brightness: 0.0,
            kick: 0.0,
            snare: 0.0,
        };
        let mut candidate = reference();
        candidate.key = MusicalKey::minor(2);
        let result = compare(&reference(), &candidate, Some(&weights));
        assert!((result.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights_score_zero() {
        let weights = WeightConfig {
            tempo: 0.0,
            key: 0.0,
            energy: 0.0,
            brightness: 0.0,
            kick: 0.0,
            snare: 0.0,
        };
        let result = compare(&reference(), &reference(), Some(&weights));
        assert!(result.score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_rhythm_similarity_edges() {
        assert!((rhythm_similarity(&[], &[]) - 1.0).abs() < f64::EPSILON);
        assert!(rhythm_similarity(&[0.0, 1.0], &[]).abs() < f64::EPSILON);
        assert!(rhythm_similarity(&[], &[0.0]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rhythm_similarity_tolerance_window() {
        let reference = [0.0, 1.0, 2.0, 3.0];
        let candidate = [0.1, 1.2, 2.0];
        // 0.0 matches 0.1, 1.0 misses 1.2, 2.0 matches, 3.0 misses
        assert!((rhythm_similarity(&reference, &candidate) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_compare_is_deterministic() {
        let mut candidate = reference();
        candidate.tempo = 113.3;
        candidate.brightness = 0.61;
        let first = compare(&reference(), &candidate, None);
        let second = compare(&reference(), &candidate, None);
        assert_eq!(first, second);
    }
}
