//! Refinement loop: render, analyze, score, decide, refine.
//!
//! Strictly sequential. Each iteration renders the current candidate through
//! the recovery loop, compares its features to the reference, records the
//! result and either stops or asks the refiner for the next candidate. The
//! caller always receives the best-scoring candidate seen, which is not
//! necessarily the last one produced.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AudioArtifact, Comparison, Config, CoverOutcome, FeatureVector, IterationRecord,
    RecoveryConfig, RefinementConfig, StopReason,
};
use crate::domain::ports::{Analyzer, Refiner, Renderer};

use super::cancellation::CancellationSignal;
use super::comparator::FeatureComparator;
use super::convergence::{evaluate, ConvergenceMode};
use super::fallback::fallback_pattern;
use super::observer::LoopObserver;
use super::prompts::{refinement_conversation, validation_retry};
use super::recovery::{render_once, RecoveryLoop};
use super::refiner_call::request_candidate;
use super::validation::validate;

/// Best candidate seen so far. Replaced only on a strictly higher score, so
/// the first-seen maximum wins ties.
#[derive(Debug, Clone)]
struct BestSoFar {
    pattern: String,
    score: f64,
    iteration: u32,
}

pub struct RefinementLoop {
    renderer: Arc<dyn Renderer>,
    analyzer: Arc<dyn Analyzer>,
    refiner: Arc<dyn Refiner>,
    refinement: RefinementConfig,
    recovery: RecoveryConfig,
    comparator: FeatureComparator,
    mode: ConvergenceMode,
    observers: Vec<Arc<dyn LoopObserver>>,
    cancel: CancellationSignal,
}

impl RefinementLoop {
    /// Build a loop from the job configuration. The convergence mode follows
    /// `refinement.mode`.
    pub fn new(
        renderer: Arc<dyn Renderer>,
        analyzer: Arc<dyn Analyzer>,
        refiner: Arc<dyn Refiner>,
        config: &Config,
    ) -> Self {
        Self {
            renderer,
            analyzer,
            refiner,
            refinement: config.refinement.clone(),
            recovery: config.recovery.clone(),
            comparator: FeatureComparator::new(config.scoring.weights, config.scoring.caps),
            mode: ConvergenceMode::from_config(&config.refinement, &config.thresholds),
            observers: Vec::new(),
            cancel: CancellationSignal::new(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ConvergenceMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one cover job.
    ///
    /// The renderer is opened before the first iteration and closed on every
    /// exit path. Reaching `max_iterations` without converging is a normal
    /// outcome. Cancellation before anything was rendered is an error;
    /// afterwards the best-so-far result is returned with
    /// [`StopReason::Cancelled`].
    #[instrument(skip_all, fields(max_iterations = self.refinement.max_iterations))]
    pub async fn run(&self, reference: &FeatureVector, initial: &str) -> DomainResult<CoverOutcome> {
        if self.refinement.max_iterations == 0 {
            return Err(DomainError::InvalidConfiguration(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        self.renderer
            .open()
            .await
            .map_err(|e| DomainError::unavailable("renderer", e.to_string()))?;

        let result = self.run_inner(reference, initial).await;

        if let Err(e) = self.renderer.close().await {
            tracing::warn!(error = %e, "Failed to close renderer");
        }

        if let Ok(outcome) = &result {
            for observer in &self.observers {
                observer.on_finished(outcome).await;
            }
        }
        result
    }

    async fn run_inner(&self, reference: &FeatureVector, initial: &str) -> DomainResult<CoverOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let duration = self.refinement.render_duration_secs;
        let fallback = fallback_pattern(reference.tempo, &reference.key);
        let recovery = RecoveryLoop::new(
            Arc::clone(&self.renderer),
            Arc::clone(&self.refiner),
            self.recovery.clone(),
            self.refiner_timeout(),
        )
        .with_cancellation(self.cancel.clone());

        tracing::info!(%run_id, mode = ?self.mode, "Starting refinement run");

        let mut history: Vec<IterationRecord> = Vec::new();
        let mut best: Option<BestSoFar> = None;
        let mut current = initial.to_string();
        let mut stop_reason = StopReason::MaxIterations;

        for iteration in 0..self.refinement.max_iterations {
            if self.cancel.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }
            for observer in &self.observers {
                observer.on_iteration_started(iteration).await;
            }

            let rendered = match recovery
                .render_with_recovery(&current, duration, Some(&fallback))
                .await
            {
                Ok(outcome) => Rendered {
                    artifact: outcome.artifact,
                    candidate: outcome.final_candidate,
                    used_fallback: outcome.used_fallback,
                    recovery_attempts: outcome.attempts.len(),
                },
                Err(DomainError::RenderFailed { attempts, last_error }) => {
                    tracing::warn!(
                        iteration,
                        attempts,
                        error = %last_error,
                        "Recovery exhausted, rendering last-resort fallback"
                    );
                    self.render_last_resort(&fallback, duration, attempts as usize)
                        .await?
                }
                Err(DomainError::Cancelled) => {
                    stop_reason = StopReason::Cancelled;
                    break;
                }
                Err(e) => return Err(e),
            };

            for observer in &self.observers {
                observer.on_artifact_rendered(iteration, &rendered.artifact).await;
            }

            let features = self
                .analyzer
                .analyze(&rendered.artifact.bytes)
                .await
                .map_err(|e| DomainError::unavailable("analyzer", e.to_string()))?;
            let comparison = self.comparator.compare(reference, &features);
            let decision = evaluate(&comparison, &self.mode);

            if best.as_ref().map_or(true, |b| comparison.score > b.score) {
                best = Some(BestSoFar {
                    pattern: rendered.candidate.clone(),
                    score: comparison.score,
                    iteration,
                });
            }

            let record = IterationRecord {
                iteration,
                candidate: rendered.candidate.clone(),
                comparison,
                artifact: rendered.artifact.reference(),
                used_fallback: rendered.used_fallback,
                recovery_attempts: rendered.recovery_attempts,
                recorded_at: Utc::now(),
            };
            tracing::info!(
                iteration,
                score = comparison.score,
                best_score = best.as_ref().map_or(0.0, |b| b.score),
                stop = decision.stop,
                used_fallback = rendered.used_fallback,
                "Iteration complete"
            );
            for observer in &self.observers {
                observer.on_iteration_completed(&record, &decision).await;
            }
            history.push(record);

            if decision.stop {
                stop_reason = StopReason::Converged;
                break;
            }
            if iteration + 1 >= self.refinement.max_iterations {
                break;
            }

            match self
                .refine(&rendered.candidate, reference, &features, &comparison)
                .await
            {
                Ok(next) => current = next,
                Err(DomainError::Cancelled) => {
                    stop_reason = StopReason::Cancelled;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let Some(best) = best else {
            return Err(DomainError::Cancelled);
        };

        tracing::info!(
            %run_id,
            best_score = best.score,
            best_iteration = best.iteration,
            iterations = history.len(),
            ?stop_reason,
            "Refinement run finished"
        );

        Ok(CoverOutcome {
            run_id,
            best_pattern: best.pattern,
            best_score: best.score,
            best_iteration: best.iteration,
            stop_reason,
            history,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Render `fallback` directly, without re-entering recovery.
    async fn render_last_resort(
        &self,
        fallback: &str,
        duration: f64,
        failed_attempts: usize,
    ) -> DomainResult<Rendered> {
        match render_once(self.renderer.as_ref(), fallback, duration).await? {
            Ok(bytes) => Ok(Rendered {
                artifact: AudioArtifact::new(bytes),
                candidate: fallback.to_string(),
                used_fallback: true,
                recovery_attempts: failed_attempts,
            }),
            Err(failure) => Err(DomainError::FatalRender(failure.message)),
        }
    }

    /// Ask for the next candidate, re-asking while it fails the static check.
    ///
    /// A candidate still invalid after `max_validation_retries` is returned
    /// anyway; the recovery loop deals with it at render time.
    async fn refine(
        &self,
        candidate: &str,
        reference: &FeatureVector,
        rendered: &FeatureVector,
        comparison: &Comparison,
    ) -> DomainResult<String> {
        if self.cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        let mut conversation = refinement_conversation(candidate, reference, rendered, comparison);
        let mut next =
            request_candidate(self.refiner.as_ref(), &conversation, self.refiner_timeout()).await?;

        for retry in 1..=self.refinement.max_validation_retries {
            let Err(issue) = validate(&next) else {
                return Ok(next);
            };
            tracing::debug!(retry, %issue, "Refined candidate failed static check");
            if self.cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }
            conversation = validation_retry(conversation, &next, &issue);
            next = request_candidate(self.refiner.as_ref(), &conversation, self.refiner_timeout())
                .await?;
        }

        if let Err(issue) = validate(&next) {
            tracing::warn!(%issue, "Refined candidate still invalid, leaving it to recovery");
        }
        Ok(next)
    }

    fn refiner_timeout(&self) -> Duration {
        Duration::from_secs(self.refinement.refiner_timeout_secs)
    }
}

struct Rendered {
    artifact: AudioArtifact,
    candidate: String,
    used_fallback: bool,
    recovery_attempts: usize,
}
