//! Domain errors for the coverloop refinement system.

use thiserror::Error;

/// Domain-level errors that can surface from a cover or build job.
///
/// Render failures that the recovery loop can still absorb never reach this
/// type; only exhausted or fatal conditions do.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Render failed after {attempts} attempts: {last_error}")]
    RenderFailed { attempts: u32, last_error: String },

    #[error("Fallback render failed: {0}")]
    FatalRender(String),

    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid song structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Build a `CollaboratorUnavailable` error for the named collaborator.
    pub fn unavailable(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator,
            reason: reason.into(),
        }
    }

    /// Fatal errors abort the whole job and are never retried by the core.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RenderFailed { .. } | Self::ValidationFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::RenderFailed {
            attempts: 3,
            last_error: "silent output".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Render failed after 3 attempts: silent output"
        );

        let err = DomainError::unavailable("refiner", "connection refused");
        assert_eq!(err.to_string(), "refiner unavailable: connection refused");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DomainError::Cancelled.is_fatal());
        assert!(DomainError::FatalRender("boom".into()).is_fatal());
        assert!(DomainError::unavailable("renderer", "down").is_fatal());
        assert!(!DomainError::ValidationFailed("empty".into()).is_fatal());
        assert!(!DomainError::RenderFailed {
            attempts: 1,
            last_error: String::new()
        }
        .is_fatal());
    }
}
