//! Infrastructure layer module
//!
//! Adapters that satisfy the domain ports, plus ambient plumbing:
//! - Configuration loading (figment)
//! - Logging initialisation (tracing-subscriber, tracing-appender)
//! - Messages API client implementing the refiner
//! - Subprocess-backed renderer and analyzer
//! - File-backed live preview
//! - JSON trace recorder

pub mod analysis;
pub mod config;
pub mod llm;
pub mod logging;
pub mod preview;
pub mod process;
pub mod render;
pub mod trace;
