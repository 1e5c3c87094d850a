//! Renderer port: candidate pattern text in, audio bytes out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status reported by the renderer for one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    Ok,
    /// Render completed but the output is silent or near-silent
    Silent,
    Error,
}

/// Result of a single render call.
///
/// Silence is reported through `status`, never inferred from the bytes.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub status: RenderStatus,
    pub audio: Option<Vec<u8>>,
    pub error_detail: Option<String>,
}

impl RenderOutcome {
    pub fn ok(audio: Vec<u8>) -> Self {
        Self {
            status: RenderStatus::Ok,
            audio: Some(audio),
            error_detail: None,
        }
    }

    pub fn silent() -> Self {
        Self {
            status: RenderStatus::Silent,
            audio: None,
            error_detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: RenderStatus::Error,
            audio: None,
            error_detail: Some(detail.into()),
        }
    }
}

/// Errors raised by a renderer, as opposed to a reported bad status.
#[derive(Debug, Error)]
pub enum RendererError {
    /// The render backend itself cannot be reached; fatal, never retried
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),

    /// The render exceeded its time budget
    #[error("Render timed out after {0}s")]
    Timeout(u64),

    /// The render raised an exception caused by the candidate
    #[error("Render failed: {0}")]
    Failed(String),
}

/// Port for the black-box "candidate → audio" service.
///
/// Implementations must be idempotent per call and respect the requested
/// duration. `open`/`close` bracket a job so backends holding an external
/// resource (a browser session, a scratch directory) can release it on every
/// exit path, including cancellation.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Acquire any resource the renderer needs for a job.
    async fn open(&self) -> Result<(), RendererError> {
        Ok(())
    }

    /// Render `candidate` to at most `duration_secs` seconds of audio.
    async fn render(
        &self,
        candidate: &str,
        duration_secs: f64,
    ) -> Result<RenderOutcome, RendererError>;

    /// Release whatever `open` acquired. Called exactly once per `open`.
    async fn close(&self) -> Result<(), RendererError> {
        Ok(())
    }
}
