//! JSON trace of a refinement run.
//!
//! Layout of one run directory:
//!
//! ```text
//! <trace_dir>/<timestamp>-<id>/
//!   iterations.jsonl      one IterationTrace per line
//!   artifacts/<id>.audio  rendered audio (when kept)
//!   final.json            the CoverOutcome
//! ```
//!
//! Write failures are logged and never interrupt the run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::domain::models::{AudioArtifact, CoverOutcome, IterationRecord};
use crate::services::{ConvergenceDecision, LoopObserver, ThresholdCheck};

const ITERATIONS_FILE: &str = "iterations.jsonl";
const FINAL_FILE: &str = "final.json";
const ARTIFACTS_DIR: &str = "artifacts";

/// One line of `iterations.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationTrace {
    #[serde(flatten)]
    pub record: IterationRecord,
    pub stop: bool,
    pub checks: BTreeMap<ThresholdCheck, bool>,
}

pub struct TraceRecorder {
    run_dir: PathBuf,
    keep_artifacts: bool,
}

impl TraceRecorder {
    /// Create a fresh run directory under `trace_dir`.
    pub async fn create(trace_dir: impl AsRef<Path>, keep_artifacts: bool) -> Result<Self> {
        let id = Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S"), &id[..8]);
        let run_dir = trace_dir.as_ref().join(name);

        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create trace directory {}", run_dir.display()))?;
        if keep_artifacts {
            fs::create_dir_all(run_dir.join(ARTIFACTS_DIR))
                .await
                .context("Failed to create artifacts directory")?;
        }

        tracing::info!(path = %run_dir.display(), "Recording trace");
        Ok(Self {
            run_dir,
            keep_artifacts,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Read back every iteration line of a run directory.
    pub async fn read_iterations(run_dir: impl AsRef<Path>) -> Result<Vec<IterationTrace>> {
        let text = fs::read_to_string(run_dir.as_ref().join(ITERATIONS_FILE))
            .await
            .context("Failed to read iteration trace")?;
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Malformed iteration trace line"))
            .collect()
    }

    async fn append_iteration(&self, trace: &IterationTrace) -> Result<()> {
        let mut line = serde_json::to_string(trace)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.run_dir.join(ITERATIONS_FILE))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn write_artifact(&self, artifact: &AudioArtifact) -> Result<()> {
        let path = self
            .run_dir
            .join(ARTIFACTS_DIR)
            .join(format!("{}.audio", artifact.id));
        fs::write(path, &artifact.bytes).await?;
        Ok(())
    }

    async fn write_final(&self, outcome: &CoverOutcome) -> Result<()> {
        let json = serde_json::to_vec_pretty(outcome)?;
        fs::write(self.run_dir.join(FINAL_FILE), json).await?;
        Ok(())
    }
}

#[async_trait]
impl LoopObserver for TraceRecorder {
    async fn on_artifact_rendered(&self, iteration: u32, artifact: &AudioArtifact) {
        if !self.keep_artifacts {
            return;
        }
        if let Err(e) = self.write_artifact(artifact).await {
            tracing::warn!(iteration, error = %e, "Failed to persist artifact");
        }
    }

    async fn on_iteration_completed(&self, record: &IterationRecord, decision: &ConvergenceDecision) {
        let trace = IterationTrace {
            record: record.clone(),
            stop: decision.stop,
            checks: decision.checks.clone(),
        };
        if let Err(e) = self.append_iteration(&trace).await {
            tracing::warn!(iteration = record.iteration, error = %e, "Failed to append iteration trace");
        }
    }

    async fn on_finished(&self, outcome: &CoverOutcome) {
        if let Err(e) = self.write_final(outcome).await {
            tracing::warn!(run_id = %outcome.run_id, error = %e, "Failed to write final trace");
        }
    }
}
