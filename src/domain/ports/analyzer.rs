//! Analyzer port: audio bytes in, acoustic features out.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{FeatureVector, SongStructure};

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Analyzer unavailable: {0}")]
    Unavailable(String),

    #[error("Analysis failed: {0}")]
    Failed(String),

    #[error("Malformed analysis output: {0}")]
    MalformedOutput(String),
}

/// Port for the external DSP feature extraction service.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Extract the fixed feature schema from one rendering.
    async fn analyze(&self, audio: &[u8]) -> Result<FeatureVector, AnalyzerError>;

    /// Derive the section/measure/layer decomposition of a reference song.
    async fn analyze_structure(&self, audio: &[u8]) -> Result<SongStructure, AnalyzerError>;
}
