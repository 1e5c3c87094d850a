//! Structural decomposition of a song used by the hierarchical builder.
//!
//! Sections, measures and layers are derived once from the reference audio
//! and are read-only for the rest of a build.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Intro,
    Verse,
    PreChorus,
    Chorus,
    Bridge,
    Breakdown,
    Drop,
    Outro,
    #[serde(other)]
    Other,
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Intro => "intro",
            Self::Verse => "verse",
            Self::PreChorus => "pre_chorus",
            Self::Chorus => "chorus",
            Self::Bridge => "bridge",
            Self::Breakdown => "breakdown",
            Self::Drop => "drop",
            Self::Outro => "outro",
            Self::Other => "other",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Drums,
    Bass,
    Harmony,
    Melody,
    Fx,
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Drums => "drums",
            Self::Bass => "bass",
            Self::Harmony => "harmony",
            Self::Melody => "melody",
            Self::Fx => "fx",
        };
        write!(f, "{name}")
    }
}

/// One instrument track active in a measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub name: String,
    pub layer_type: LayerType,
}

impl Layer {
    pub fn new(id: impl Into<String>, layer_type: LayerType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            layer_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub index: u32,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub index: u32,
    pub section_type: SectionType,
    /// Relative energy level (0.0-1.0)
    pub energy: f64,
    pub bars: u32,
    /// Duration in seconds
    pub duration: f64,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

impl Section {
    /// Pick `count` evenly spaced measures, always including the first.
    pub fn representative_measures(&self, count: usize) -> Vec<&Measure> {
        let total = self.measures.len();
        if count == 0 || total == 0 {
            return Vec::new();
        }
        if count >= total {
            return self.measures.iter().collect();
        }

        let mut picked = Vec::with_capacity(count);
        let mut last = None;
        for slot in 0..count {
            let idx = slot * total / count;
            if last != Some(idx) {
                picked.push(&self.measures[idx]);
                last = Some(idx);
            }
        }
        picked
    }
}

/// Ordered sections of a song, as returned by structure analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongStructure {
    pub sections: Vec<Section>,
}

impl SongStructure {
    pub fn total_duration(&self) -> f64 {
        self.sections.iter().map(|s| s.duration).sum()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.sections.is_empty() {
            return Err(DomainError::InvalidStructure(
                "structure has no sections".to_string(),
            ));
        }

        for section in &self.sections {
            if section.measures.is_empty() {
                return Err(DomainError::InvalidStructure(format!(
                    "section {} ({}) has no measures",
                    section.index, section.section_type
                )));
            }
            if !section.duration.is_finite() || section.duration < 0.0 {
                return Err(DomainError::InvalidStructure(format!(
                    "section {} has invalid duration {}",
                    section.index, section.duration
                )));
            }
            for measure in &section.measures {
                let mut seen = HashSet::new();
                for layer in &measure.layers {
                    if !seen.insert(layer.id.as_str()) {
                        return Err(DomainError::InvalidStructure(format!(
                            "duplicate layer id '{}' in section {} measure {}",
                            layer.id, section.index, measure.index
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
