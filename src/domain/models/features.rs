//! Acoustic feature vectors produced by the analysis collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Mode of a musical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    Major,
    Minor,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("Empty key")]
    Empty,

    #[error("Unknown key root: {0}")]
    UnknownRoot(String),

    #[error("Unknown key mode: {0}")]
    UnknownMode(String),
}

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Categorical key: root pitch class plus mode.
///
/// Roots are stored as pitch classes (0 = C) so enharmonic spellings such as
/// `C#` and `Db` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MusicalKey {
    pitch_class: u8,
    mode: KeyMode,
}

impl MusicalKey {
    pub fn new(pitch_class: u8, mode: KeyMode) -> Self {
        Self {
            pitch_class: pitch_class % 12,
            mode,
        }
    }

    pub fn major(pitch_class: u8) -> Self {
        Self::new(pitch_class, KeyMode::Major)
    }

    pub fn minor(pitch_class: u8) -> Self {
        Self::new(pitch_class, KeyMode::Minor)
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch_class
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    /// Root name using sharps, e.g. `"F#"`.
    pub fn root_name(&self) -> &'static str {
        SHARP_NAMES[usize::from(self.pitch_class)]
    }

    /// Lowercase root suitable for pattern scale names, e.g. `"f#"`.
    pub fn scale_root(&self) -> String {
        self.root_name().to_lowercase()
    }
}

impl Default for MusicalKey {
    fn default() -> Self {
        Self::major(0)
    }
}

impl fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.root_name(), self.mode)
    }
}

fn parse_root(letter: char) -> Option<u8> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

impl FromStr for MusicalKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or(KeyParseError::Empty)?;
        let mut pitch_class =
            parse_root(letter).ok_or_else(|| KeyParseError::UnknownRoot(trimmed.to_string()))?;

        let mut rest = chars.as_str();
        if let Some(stripped) = rest.strip_prefix(&['#', '♯'][..]) {
            pitch_class = (pitch_class + 1) % 12;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix(&['b', '♭'][..]) {
            pitch_class = (pitch_class + 11) % 12;
            rest = stripped;
        }

        let mode = match rest.trim().to_lowercase().as_str() {
            "" | "maj" | "major" => KeyMode::Major,
            "m" | "min" | "minor" => KeyMode::Minor,
            other => return Err(KeyParseError::UnknownMode(other.to_string())),
        };

        Ok(Self::new(pitch_class, mode))
    }
}

impl TryFrom<String> for MusicalKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MusicalKey> for String {
    fn from(key: MusicalKey) -> Self {
        key.to_string()
    }
}

/// Acoustic description of one audio rendering.
///
/// Produced by the analysis collaborator for either the reference audio or a
/// rendered candidate and never mutated afterwards. Rhythm positions are beat
/// offsets within one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Tempo in beats per minute
    pub tempo: f64,

    pub key: MusicalKey,

    /// Duration in seconds
    #[serde(default)]
    pub duration: f64,

    #[serde(default)]
    pub energy: f64,

    /// Normalised spectral brightness (0.0-1.0)
    #[serde(default)]
    pub brightness: f64,

    #[serde(default)]
    pub rms: f64,

    #[serde(default)]
    pub kick_positions: Vec<f64>,

    #[serde(default)]
    pub snare_positions: Vec<f64>,
}

impl FeatureVector {
    /// Feature vector with the given tempo and key and neutral descriptors.
    pub fn new(tempo: f64, key: MusicalKey) -> Self {
        Self {
            tempo,
            key,
            duration: 0.0,
            energy: 0.0,
            brightness: 0.0,
            rms: 0.0,
            kick_positions: Vec::new(),
            snare_positions: Vec::new(),
        }
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy;
        self
    }

    pub fn with_brightness(mut self, brightness: f64) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_rhythm(mut self, kick: Vec<f64>, snare: Vec<f64>) -> Self {
        self.kick_positions = kick;
        self.snare_positions = snare;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_root_is_major() {
        let key: MusicalKey = "C".parse().unwrap();
        assert_eq!(key, MusicalKey::major(0));
        assert_eq!(key.to_string(), "C major");
    }

    #[test]
    fn test_parse_minor_forms() {
        assert_eq!("Am".parse::<MusicalKey>().unwrap(), MusicalKey::minor(9));
        assert_eq!(
            "A minor".parse::<MusicalKey>().unwrap(),
            MusicalKey::minor(9)
        );
        assert_eq!("f#min".parse::<MusicalKey>().unwrap(), MusicalKey::minor(6));
    }

    #[test]
    fn test_enharmonic_roots_are_equal() {
        let sharp: MusicalKey = "C#".parse().unwrap();
        let flat: MusicalKey = "Db major".parse().unwrap();
        assert_eq!(sharp, flat);
        assert_eq!("Cb".parse::<MusicalKey>().unwrap(), MusicalKey::major(11));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<MusicalKey>(), Err(KeyParseError::Empty));
        assert!(matches!(
            "H".parse::<MusicalKey>(),
            Err(KeyParseError::UnknownRoot(_))
        ));
        assert!(matches!(
            "C lydian".parse::<MusicalKey>(),
            Err(KeyParseError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_feature_vector_json_defaults() {
        let json = r#"{"tempo": 120.0, "key": "C"}"#;
        let features: FeatureVector = serde_json::from_str(json).unwrap();
        assert!((features.tempo - 120.0).abs() < f64::EPSILON);
        assert_eq!(features.key, MusicalKey::major(0));
        assert!(features.kick_positions.is_empty());

        let round_trip = serde_json::to_value(&features).unwrap();
        assert_eq!(round_trip["key"], "C major");
    }
}
