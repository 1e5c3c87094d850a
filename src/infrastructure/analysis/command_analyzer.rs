//! Analyzer that shells out to an external DSP command.
//!
//! The audio is written to a temporary file passed as `{input}`; the command
//! prints a JSON [`FeatureVector`] or [`SongStructure`] on stdout.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::time::Duration;

use crate::domain::models::{AnalyzerConfig, FeatureVector, SongStructure};
use crate::domain::ports::{Analyzer, AnalyzerError};
use crate::infrastructure::process::{expand_args, run, ProcessError};

pub struct CommandAnalyzer {
    config: AnalyzerConfig,
}

impl CommandAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Analyze audio already on disk, e.g. the reference track.
    pub async fn analyze_file(&self, path: &std::path::Path) -> Result<FeatureVector, AnalyzerError> {
        self.invoke(&self.config.feature_args, &path.to_string_lossy())
            .await
    }

    async fn invoke_on_bytes<T: DeserializeOwned>(
        &self,
        arg_template: &[String],
        audio: &[u8],
    ) -> Result<T, AnalyzerError> {
        let mut input = tempfile::Builder::new()
            .prefix("coverloop-analyze-")
            .suffix(".audio")
            .tempfile()
            .map_err(|e| AnalyzerError::Unavailable(format!("Cannot create temp file: {e}")))?;
        input
            .write_all(audio)
            .and_then(|()| input.flush())
            .map_err(|e| AnalyzerError::Unavailable(format!("Cannot write temp file: {e}")))?;

        let path = input.path().to_string_lossy().to_string();
        self.invoke(arg_template, &path).await
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        arg_template: &[String],
        input: &str,
    ) -> Result<T, AnalyzerError> {
        let args = expand_args(arg_template, &[("input", input)]);
        let output = run(
            &self.config.command,
            &args,
            None,
            Duration::from_secs(self.config.timeout_secs),
        )
        .await
        .map_err(|e| match e {
            ProcessError::Spawn { .. } => AnalyzerError::Unavailable(e.to_string()),
            ProcessError::Timeout { .. } | ProcessError::Io { .. } => {
                AnalyzerError::Failed(e.to_string())
            }
        })?;

        if !output.status.success() {
            return Err(AnalyzerError::Failed(format!(
                "exit {:?}: {}",
                output.code(),
                output.stderr
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AnalyzerError::MalformedOutput(e.to_string()))
    }
}

#[async_trait]
impl Analyzer for CommandAnalyzer {
    async fn analyze(&self, audio: &[u8]) -> Result<FeatureVector, AnalyzerError> {
        self.invoke_on_bytes(&self.config.feature_args, audio).await
    }

    async fn analyze_structure(&self, audio: &[u8]) -> Result<SongStructure, AnalyzerError> {
        self.invoke_on_bytes(&self.config.structure_args, audio)
            .await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::models::MusicalKey;

    fn shell(features: &str, structure: &str) -> CommandAnalyzer {
        let args = |script: &str| {
            vec![
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
                "{input}".to_string(),
            ]
        };
        CommandAnalyzer::new(AnalyzerConfig {
            command: "sh".to_string(),
            feature_args: args(features),
            structure_args: args(structure),
            timeout_secs: 5,
        })
    }

    #[tokio::test]
    async fn test_analyze_parses_features() {
        let analyzer = shell(
            r#"test -s "$1" && echo '{"tempo": 128.0, "key": "A minor", "energy": 0.4}'"#,
            "exit 1",
        );
        let features = analyzer.analyze(b"RIFF").await.unwrap();
        assert!((features.tempo - 128.0).abs() < f64::EPSILON);
        assert_eq!(features.key, MusicalKey::minor(9));
        assert!((features.energy - 0.4).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_analyze_structure() {
        let analyzer = shell(
            "exit 1",
            r#"echo '{"sections": [{"index": 0, "section_type": "verse", "energy": 0.5, "bars": 4, "duration": 8.0, "measures": [{"index": 0, "layers": [{"id": "d", "name": "d", "layer_type": "drums"}]}]}]}'"#,
        );
        let structure = analyzer.analyze_structure(b"RIFF").await.unwrap();
        assert_eq!(structure.sections.len(), 1);
        assert!(structure.validate().is_ok());
    }

    #[tokio::test]
    async fn test_malformed_output() {
        let analyzer = shell("echo not-json", "exit 1");
        assert!(matches!(
            analyzer.analyze(b"x").await,
            Err(AnalyzerError::MalformedOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let analyzer = shell("echo boom >&2; exit 3", "exit 1");
        let err = analyzer.analyze(b"x").await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Failed(ref msg) if msg.contains("boom")));
    }
}
