//! Render recovery loop.
//!
//! Wraps one render with bounded retries and a guaranteed-safe fallback:
//!
//! ```text
//! Attempting --ok--> Success
//!     |
//!     +--fail, retries left--> classify, ask refiner --> Attempting
//!     |
//!     +--fail, exhausted--> Fallback --ok--> Success
//!                              |
//!                              +--fail--> FatalRender
//! ```
//!
//! `max_retries` counts renders of generated candidates. With N retries a call
//! performs at most N renders plus exactly one fallback render.

use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AudioArtifact, ErrorAttempt, RecoveryConfig};
use crate::domain::ports::{Refiner, RenderStatus, Renderer, RendererError};

use super::cancellation::CancellationSignal;
use super::error_classifier::{classify, FailureKind, RenderFailure};
use super::prompts::corrective_conversation;
use super::refiner_call::request_candidate;

/// Successful result of [`RecoveryLoop::render_with_recovery`].
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub artifact: AudioArtifact,
    /// Candidate whose render produced `artifact`
    pub final_candidate: String,
    /// Every rejected candidate with its error, in order
    pub attempts: Vec<ErrorAttempt>,
    pub used_fallback: bool,
    /// Renderer calls made, fallback included
    pub render_attempts: u32,
}

pub struct RecoveryLoop {
    renderer: Arc<dyn Renderer>,
    refiner: Arc<dyn Refiner>,
    config: RecoveryConfig,
    refiner_timeout: Duration,
    cancel: CancellationSignal,
}

impl RecoveryLoop {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        refiner: Arc<dyn Refiner>,
        config: RecoveryConfig,
        refiner_timeout: Duration,
    ) -> Self {
        Self {
            renderer,
            refiner,
            config,
            refiner_timeout,
            cancel: CancellationSignal::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Render `candidate`, repairing it through the refiner on failure.
    ///
    /// `fallback` is rendered once after the retries are exhausted, provided
    /// fallbacks are enabled. Without one the call ends in
    /// [`DomainError::RenderFailed`]; a failing fallback ends in
    /// [`DomainError::FatalRender`]. A renderer reporting itself unavailable
    /// aborts immediately.
    #[instrument(skip_all, fields(max_retries = self.config.max_retries, duration_secs = duration_secs))]
    pub async fn render_with_recovery(
        &self,
        candidate: &str,
        duration_secs: f64,
        fallback: Option<&str>,
    ) -> DomainResult<RecoveryOutcome> {
        let max_attempts = self.config.max_retries.max(1);
        let mut current = candidate.to_string();
        let mut attempts: Vec<ErrorAttempt> = Vec::new();
        let mut render_attempts = 0;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            render_attempts += 1;
            match self.try_render(&current, duration_secs).await? {
                Ok(bytes) => {
                    if !attempts.is_empty() {
                        tracing::info!(attempt, "Render recovered after failures");
                    }
                    return Ok(RecoveryOutcome {
                        artifact: AudioArtifact::new(bytes),
                        final_candidate: current,
                        attempts,
                        used_fallback: false,
                        render_attempts,
                    });
                }
                Err(failure) => {
                    let diagnosis = classify(&failure, &current);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        kind = ?failure.kind,
                        causes = diagnosis.causes.len(),
                        error = %failure.message,
                        "Render attempt failed"
                    );
                    attempts.push(ErrorAttempt::new(current.clone(), failure.message.clone()));
                    last_error = failure.message;

                    if attempt < max_attempts {
                        if self.cancel.is_cancelled() {
                            return Err(DomainError::Cancelled);
                        }
                        let conversation = corrective_conversation(&attempts, &diagnosis);
                        current = request_candidate(
                            self.refiner.as_ref(),
                            &conversation,
                            self.refiner_timeout,
                        )
                        .await?;
                    }
                }
            }
        }

        let fallback = match fallback {
            Some(pattern) if self.config.fallback_enabled => pattern,
            _ => {
                return Err(DomainError::RenderFailed {
                    attempts: render_attempts,
                    last_error,
                })
            }
        };

        tracing::warn!(
            failed_attempts = attempts.len(),
            "Retries exhausted, rendering fallback pattern"
        );
        render_attempts += 1;
        match self.try_render(fallback, duration_secs).await? {
            Ok(bytes) => Ok(RecoveryOutcome {
                artifact: AudioArtifact::new(bytes),
                final_candidate: fallback.to_string(),
                attempts,
                used_fallback: true,
                render_attempts,
            }),
            Err(failure) => {
                tracing::error!(error = %failure.message, "Fallback render failed");
                Err(DomainError::FatalRender(failure.message))
            }
        }
    }

    /// One renderer call. The outer `Result` carries fatal conditions, the
    /// inner one candidate-caused failures.
    async fn try_render(
        &self,
        candidate: &str,
        duration_secs: f64,
    ) -> DomainResult<Result<Vec<u8>, RenderFailure>> {
        render_once(self.renderer.as_ref(), candidate, duration_secs).await
    }
}

/// Render without any recovery, mapping the outcome for callers that only
/// need success or a classified failure.
pub async fn render_once(
    renderer: &dyn Renderer,
    candidate: &str,
    duration_secs: f64,
) -> DomainResult<Result<Vec<u8>, RenderFailure>> {
    match renderer.render(candidate, duration_secs).await {
        Ok(outcome) => Ok(match (outcome.status, outcome.audio) {
            (RenderStatus::Ok, Some(bytes)) if !bytes.is_empty() => Ok(bytes),
            (RenderStatus::Ok, _) => Err(RenderFailure::new(
                FailureKind::ErrorStatus,
                "renderer reported ok but returned no audio",
            )),
            (RenderStatus::Silent, _) => Err(RenderFailure::silent()),
            (RenderStatus::Error, _) => Err(RenderFailure::new(
                FailureKind::ErrorStatus,
                outcome
                    .error_detail
                    .unwrap_or_else(|| "renderer reported an error".to_string()),
            )),
        }),
        Err(RendererError::Unavailable(reason)) => {
            Err(DomainError::unavailable("renderer", reason))
        }
        Err(e @ RendererError::Timeout(_)) => {
            Ok(Err(RenderFailure::new(FailureKind::Timeout, e.to_string())))
        }
        Err(RendererError::Failed(message)) => {
            Ok(Err(RenderFailure::new(FailureKind::Exception, message)))
        }
    }
}
