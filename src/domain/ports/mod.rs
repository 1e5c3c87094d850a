//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces the infrastructure adapters implement:
//! - Renderer: candidate pattern text to audio bytes
//! - Analyzer: audio bytes to features and song structure
//! - Refiner: conversation to completion text
//! - PreviewSink: live monitoring of the hierarchical builder
//!
//! The core services depend only on these traits, never on a concrete
//! browser, DSP tool or text-generation provider.

pub mod analyzer;
pub mod preview;
pub mod refiner;
pub mod renderer;

pub use analyzer::{Analyzer, AnalyzerError};
pub use preview::{NullPreviewSink, PreviewError, PreviewSink};
pub use refiner::{ChatMessage, Refiner, RefinerError, Role};
pub use renderer::{RenderOutcome, RenderStatus, Renderer, RendererError};
