//! Renderer that shells out to an external render command.
//!
//! The candidate is written to the command's stdin. Exit code 0 means audio
//! was written to `{output}`, exit code 2 means the render completed but was
//! silent, anything else is a render error described on stderr.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::models::RendererConfig;
use crate::domain::ports::{RenderOutcome, Renderer, RendererError};
use crate::infrastructure::process::{expand_args, run, ProcessError};

const SILENT_EXIT_CODE: i32 = 2;

pub struct CommandRenderer {
    config: RendererConfig,
    /// Scratch directory held between `open` and `close`
    scratch: Mutex<Option<TempDir>>,
}

impl CommandRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            scratch: Mutex::new(None),
        }
    }

    async fn output_path(&self) -> Result<(PathBuf, Option<TempDir>), RendererError> {
        let name = format!("{}.audio", Uuid::new_v4());
        if let Some(dir) = self.scratch.lock().await.as_ref() {
            return Ok((dir.path().join(name), None));
        }
        // Rendering without `open` gets a directory scoped to this call.
        let dir = scratch_dir()?;
        Ok((dir.path().join(name), Some(dir)))
    }
}

fn scratch_dir() -> Result<TempDir, RendererError> {
    tempfile::Builder::new()
        .prefix("coverloop-render-")
        .tempdir()
        .map_err(|e| RendererError::Unavailable(format!("Cannot create scratch directory: {e}")))
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn open(&self) -> Result<(), RendererError> {
        let mut scratch = self.scratch.lock().await;
        if scratch.is_none() {
            let dir = scratch_dir()?;
            tracing::debug!(path = %dir.path().display(), "Opened render scratch directory");
            *scratch = Some(dir);
        }
        Ok(())
    }

    #[instrument(skip(self, candidate), fields(command = %self.config.command))]
    async fn render(
        &self,
        candidate: &str,
        duration_secs: f64,
    ) -> Result<RenderOutcome, RendererError> {
        let (output_path, _call_scratch) = self.output_path().await?;
        let output_str = output_path.to_string_lossy().to_string();
        let duration = format!("{duration_secs}");
        let args = expand_args(
            &self.config.args,
            &[("duration", duration.as_str()), ("output", output_str.as_str())],
        );

        let output = run(
            &self.config.command,
            &args,
            Some(candidate.as_bytes()),
            Duration::from_secs(self.config.timeout_secs),
        )
        .await
        .map_err(|e| match e {
            ProcessError::Spawn { .. } => RendererError::Unavailable(e.to_string()),
            ProcessError::Timeout { secs, .. } => RendererError::Timeout(secs),
            ProcessError::Io { .. } => RendererError::Failed(e.to_string()),
        })?;

        match output.code() {
            Some(0) => {
                let audio = match tokio::fs::read(&output_path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        return Ok(RenderOutcome::error(format!(
                            "Render command wrote no audio: {e}"
                        )))
                    }
                };
                if let Err(e) = tokio::fs::remove_file(&output_path).await {
                    tracing::debug!(error = %e, "Could not remove render output");
                }
                if audio.is_empty() {
                    return Ok(RenderOutcome::error("Render command wrote an empty file"));
                }
                Ok(RenderOutcome::ok(audio))
            }
            Some(SILENT_EXIT_CODE) => Ok(RenderOutcome::silent()),
            code => {
                let detail = if output.stderr.is_empty() {
                    format!("Render command exited with {code:?}")
                } else {
                    output.stderr
                };
                Ok(RenderOutcome::error(detail))
            }
        }
    }

    async fn close(&self) -> Result<(), RendererError> {
        if let Some(dir) = self.scratch.lock().await.take() {
            dir.close()
                .map_err(|e| RendererError::Failed(format!("Cannot remove scratch directory: {e}")))?;
        }
        Ok(())
    }
}
