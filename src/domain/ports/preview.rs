//! Live-preview sink port.
//!
//! Used by the hierarchical builder so a human can audibly monitor
//! construction. Notifications are fire-and-forget.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Preview player unavailable: {0}")]
    Unavailable(String),

    #[error("Preview delivery failed: {0}")]
    Delivery(String),
}

/// Receiver of builder progress for a live player.
///
/// The builder never awaits these calls directly; a forwarder task delivers
/// them with a per-event timeout, and errors are only logged.
#[async_trait]
pub trait PreviewSink: Send + Sync {
    /// A fragment for `layer_id` passed validation and was appended.
    async fn on_fragment_accepted(&self, layer_id: &str, fragment: &str) -> Result<(), PreviewError>;

    /// The live accumulator changed; `composite` is its full current text.
    async fn on_accumulator_updated(&self, composite: &str) -> Result<(), PreviewError>;
}

/// A preview sink that drops every notification.
///
/// Use this when no player is attached.
#[derive(Debug, Clone, Default)]
pub struct NullPreviewSink;

impl NullPreviewSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PreviewSink for NullPreviewSink {
    async fn on_fragment_accepted(&self, _layer_id: &str, _fragment: &str) -> Result<(), PreviewError> {
        Ok(())
    }

    async fn on_accumulator_updated(&self, _composite: &str) -> Result<(), PreviewError> {
        Ok(())
    }
}
