//! Preview sink that mirrors the live composite into a file.
//!
//! A live-coding player watching the file picks up every accepted layer.
//! Each update is written to a sibling temp file and renamed into place so a
//! watcher never reads a half-written pattern.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::ports::{PreviewError, PreviewSink};

pub struct FilePreviewSink {
    path: PathBuf,
}

impl FilePreviewSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PreviewSink for FilePreviewSink {
    async fn on_fragment_accepted(&self, layer_id: &str, fragment: &str) -> Result<(), PreviewError> {
        tracing::debug!(layer_id, bytes = fragment.len(), "Fragment accepted");
        Ok(())
    }

    async fn on_accumulator_updated(&self, composite: &str) -> Result<(), PreviewError> {
        let staging = self.path.with_extension("partial");
        fs::write(&staging, composite)
            .await
            .map_err(|e| PreviewError::Delivery(format!("{}: {e}", staging.display())))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| PreviewError::Delivery(format!("{}: {e}", self.path.display())))
    }
}
