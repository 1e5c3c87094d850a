//! Iteration history, audio artifacts and error attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Comparison;

/// Audio produced by one successful render.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub id: Uuid,
    pub bytes: Vec<u8>,
}

impl AudioArtifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes,
        }
    }

    /// Lightweight reference stored in the iteration history.
    pub fn reference(&self) -> ArtifactRef {
        ArtifactRef {
            id: self.id,
            size_bytes: self.bytes.len(),
        }
    }
}

/// Reference to a rendered artifact, kept in history instead of the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub id: Uuid,
    pub size_bytes: usize,
}

/// A candidate that was rejected, paired with the reason.
///
/// Accumulated across retries and replayed to the refiner so it can see
/// every earlier failed variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAttempt {
    pub candidate: String,
    pub error: String,
}

impl ErrorAttempt {
    pub fn new(candidate: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            error: error.into(),
        }
    }
}

/// Append-only history entry for one refinement iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    /// Candidate that was actually rendered (after any recovery)
    pub candidate: String,
    pub comparison: Comparison,
    pub artifact: ArtifactRef,
    /// Whether the recovery loop had to substitute a fallback candidate
    pub used_fallback: bool,
    /// Number of failed render attempts absorbed by recovery
    pub recovery_attempts: usize,
    pub recorded_at: DateTime<Utc>,
}

/// Why a refinement run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The convergence controller signalled stop
    Converged,
    /// `max_iterations` was reached without convergence
    MaxIterations,
    /// A cancellation signal was observed between iterations
    Cancelled,
}

/// Final record of a refinement run.
///
/// `best_pattern` is the highest-scoring candidate seen, which is not
/// necessarily the last one produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverOutcome {
    pub run_id: Uuid,
    pub best_pattern: String,
    pub best_score: f64,
    pub best_iteration: u32,
    pub stop_reason: StopReason,
    pub history: Vec<IterationRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CoverOutcome {
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Converged
    }

    pub fn iterations(&self) -> usize {
        self.history.len()
    }
}
