//! Analyzer adapters.

pub mod command_analyzer;

pub use command_analyzer::CommandAnalyzer;
