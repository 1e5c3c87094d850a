//! Persisted search trace.

pub mod recorder;

pub use recorder::{IterationTrace, TraceRecorder};
