//! Preview sinks for the hierarchical builder.

pub mod file_sink;

pub use file_sink::FilePreviewSink;
