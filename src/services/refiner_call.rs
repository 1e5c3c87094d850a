//! Guarded refiner calls.
//!
//! Every core component asks the refiner for text the same way: bounded by a
//! timeout, with provider failures mapped to a fatal domain error and the
//! reply sanitised into a bare candidate.

use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{ChatMessage, Refiner};

use super::validation::sanitize_candidate;

/// Send `conversation` and return the sanitised reply.
///
/// An elapsed timeout or any [`RefinerError`](crate::domain::ports::RefinerError)
/// becomes [`DomainError::CollaboratorUnavailable`]. Infrastructure retries are
/// the client's concern, not ours.
pub async fn request_candidate(
    refiner: &dyn Refiner,
    conversation: &[ChatMessage],
    timeout: Duration,
) -> DomainResult<String> {
    match tokio::time::timeout(timeout, refiner.complete(conversation)).await {
        Ok(Ok(raw)) => Ok(sanitize_candidate(&raw)),
        Ok(Err(e)) => Err(DomainError::unavailable("refiner", e.to_string())),
        Err(_) => Err(DomainError::unavailable(
            "refiner",
            format!("no completion within {}s", timeout.as_secs()),
        )),
    }
}
