//! Side-effect hooks for the refinement loop.
//!
//! Progress bars, trace files and similar extras attach here instead of
//! living in copies of the loop. Every method defaults to a no-op and none of
//! them can fail the run.

use async_trait::async_trait;

use crate::domain::models::{AudioArtifact, CoverOutcome, IterationRecord};

use super::convergence::ConvergenceDecision;

#[async_trait]
pub trait LoopObserver: Send + Sync {
    async fn on_iteration_started(&self, _iteration: u32) {}

    /// Called with the audio that will be analysed for `iteration`.
    async fn on_artifact_rendered(&self, _iteration: u32, _artifact: &AudioArtifact) {}

    async fn on_iteration_completed(&self, _record: &IterationRecord, _decision: &ConvergenceDecision) {}

    async fn on_finished(&self, _outcome: &CoverOutcome) {}
}
