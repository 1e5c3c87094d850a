//! Comparison results and the scoring/threshold configuration that produces them.

use serde::{Deserialize, Serialize};

/// Per-metric discrepancy between a reference and a candidate rendering.
///
/// Derived from two [`FeatureVector`](super::FeatureVector)s; never stored
/// independently of the iteration it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub tempo_diff: f64,
    pub key_match: bool,
    pub energy_diff: f64,
    pub brightness_diff: f64,
    /// Fraction of reference kick positions matched (0.0-1.0)
    pub kick_similarity: f64,
    /// Fraction of reference snare positions matched (0.0-1.0)
    pub snare_similarity: f64,
    /// Weighted similarity score (0-100)
    pub score: f64,
}

/// Weights used in auto mode to fold sub-scores into a single score.
///
/// Defaults sum to 1.0. Callers may override per job; the comparator
/// normalises by the weight total so the score stays within 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WeightConfig {
    #[serde(default = "default_tempo_weight")]
    pub tempo: f64,

    #[serde(default = "default_key_weight")]
    pub key: f64,

    #[serde(default = "default_energy_weight")]
    pub energy: f64,

    #[serde(default = "default_brightness_weight")]
    pub brightness: f64,

    #[serde(default = "default_kick_weight")]
    pub kick: f64,

    #[serde(default = "default_snare_weight")]
    pub snare: f64,
}

const fn default_tempo_weight() -> f64 {
    0.3
}

const fn default_key_weight() -> f64 {
    0.2
}

const fn default_energy_weight() -> f64 {
    0.15
}

const fn default_brightness_weight() -> f64 {
    0.15
}

const fn default_kick_weight() -> f64 {
    0.1
}

const fn default_snare_weight() -> f64 {
    0.1
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            tempo: default_tempo_weight(),
            key: default_key_weight(),
            energy: default_energy_weight(),
            brightness: default_brightness_weight(),
            kick: default_kick_weight(),
            snare: default_snare_weight(),
        }
    }
}

impl WeightConfig {
    pub fn total(&self) -> f64 {
        self.tempo + self.key + self.energy + self.brightness + self.kick + self.snare
    }

    /// All six weights paired with their metric names.
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("tempo", self.tempo),
            ("key", self.key),
            ("energy", self.energy),
            ("brightness", self.brightness),
            ("kick", self.kick),
            ("snare", self.snare),
        ]
    }
}

/// Diff values at or beyond which a metric contributes nothing to the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoreCaps {
    /// BPM
    #[serde(default = "default_tempo_cap")]
    pub tempo: f64,

    #[serde(default = "default_energy_cap")]
    pub energy: f64,

    #[serde(default = "default_brightness_cap")]
    pub brightness: f64,
}

const fn default_tempo_cap() -> f64 {
    20.0
}

const fn default_energy_cap() -> f64 {
    0.5
}

const fn default_brightness_cap() -> f64 {
    0.5
}

impl Default for ScoreCaps {
    fn default() -> Self {
        Self {
            tempo: default_tempo_cap(),
            energy: default_energy_cap(),
            brightness: default_brightness_cap(),
        }
    }
}

/// Pass/fail bounds used in manual mode.
///
/// A `None` bound is not configured and is skipped by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ThresholdConfig {
    #[serde(default = "default_max_tempo_diff")]
    pub max_tempo_diff: Option<f64>,

    #[serde(default = "default_require_key_match")]
    pub require_key_match: bool,

    #[serde(default = "default_max_descriptor_diff")]
    pub max_energy_diff: Option<f64>,

    #[serde(default = "default_max_descriptor_diff")]
    pub max_brightness_diff: Option<f64>,

    #[serde(default = "default_min_similarity")]
    pub min_kick_similarity: Option<f64>,

    #[serde(default = "default_min_similarity")]
    pub min_snare_similarity: Option<f64>,
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_tempo_diff() -> Option<f64> {
    Some(5.0)
}

const fn default_require_key_match() -> bool {
    true
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_descriptor_diff() -> Option<f64> {
    Some(0.1)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_min_similarity() -> Option<f64> {
    Some(0.8)
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_tempo_diff: default_max_tempo_diff(),
            require_key_match: default_require_key_match(),
            max_energy_diff: default_max_descriptor_diff(),
            max_brightness_diff: default_max_descriptor_diff(),
            min_kick_similarity: default_min_similarity(),
            min_snare_similarity: default_min_similarity(),
        }
    }
}

impl ThresholdConfig {
    /// Thresholds with every bound unset and key match not required.
    pub fn unbounded() -> Self {
        Self {
            max_tempo_diff: None,
            require_key_match: false,
            max_energy_diff: None,
            max_brightness_diff: None,
            min_kick_similarity: None,
            min_snare_similarity: None,
        }
    }
}
