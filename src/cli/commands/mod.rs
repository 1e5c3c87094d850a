//! Subcommand implementations and the wiring they share.

pub mod build;
pub mod compare;
pub mod cover;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::domain::models::{Config, FeatureVector};
use crate::infrastructure::analysis::CommandAnalyzer;
use crate::infrastructure::llm::AnthropicRefiner;
use crate::infrastructure::render::CommandRenderer;

/// Concrete collaborators built from the configuration.
pub struct Collaborators {
    pub renderer: Arc<CommandRenderer>,
    pub analyzer: Arc<CommandAnalyzer>,
    pub refiner: Arc<AnthropicRefiner>,
}

impl Collaborators {
    pub fn from_config(config: &Config) -> Result<Self> {
        let refiner =
            AnthropicRefiner::new(&config.llm).context("Failed to initialise the refiner")?;
        Ok(Self {
            renderer: Arc::new(CommandRenderer::new(config.renderer.clone())),
            analyzer: Arc::new(CommandAnalyzer::new(config.analyzer.clone())),
            refiner: Arc::new(refiner),
        })
    }
}

/// Features for `path`: parsed directly from a `.json` file, otherwise
/// extracted from the audio by the analyzer.
pub async fn load_features(analyzer: &CommandAnalyzer, path: &Path) -> Result<FeatureVector> {
    if is_json(path) {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("Invalid feature JSON in {}", path.display()));
    }

    analyzer
        .analyze_file(path)
        .await
        .with_context(|| format!("Failed to analyse {}", path.display()))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AnalyzerConfig, MusicalKey};

    #[tokio::test]
    async fn test_load_features_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.JSON");
        std::fs::write(&path, r#"{"tempo": 100.0, "key": "Eb minor"}"#).unwrap();

        let analyzer = CommandAnalyzer::new(AnalyzerConfig::default());
        let features = load_features(&analyzer, &path).await.unwrap();

        assert!((features.tempo - 100.0).abs() < f64::EPSILON);
        assert_eq!(features.key, MusicalKey::minor(3));
    }

    #[tokio::test]
    async fn test_load_features_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();

        let analyzer = CommandAnalyzer::new(AnalyzerConfig::default());
        let err = load_features(&analyzer, &path).await.unwrap_err();
        assert!(err.to_string().contains("Invalid feature JSON"));
    }
}
