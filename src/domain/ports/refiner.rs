//! Refiner port: the text-generation collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of a refiner conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RefinerError {
    /// The provider cannot be reached or rejected the request permanently
    #[error("Refiner unavailable: {0}")]
    Unavailable(String),

    /// The provider answered but with no usable text
    #[error("Refiner returned no content")]
    EmptyResponse,
}

/// Port for the black-box "messages → completion" service.
///
/// The returned text is untrusted: callers sanitise and validate it before
/// treating it as a candidate.
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn complete(&self, conversation: &[ChatMessage]) -> Result<String, RefinerError>;
}
