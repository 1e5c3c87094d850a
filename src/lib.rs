//! coverloop - recreate a reference song as a generated music pattern
//!
//! A feedback loop: generate a candidate pattern, render it to audio, extract
//! acoustic features, score them against the reference, decide whether to
//! stop, and otherwise ask a text-generation model for a refined candidate.
//! A hierarchical builder offers a second strategy that assembles the pattern
//! layer by layer from the reference's section structure.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, collaborator ports, domain errors
//! - **Service Layer** (`services`): comparator, convergence controller,
//!   error classifier, recovery loop, refinement loop, hierarchical builder
//! - **Infrastructure Layer** (`infrastructure`): config, logging, the
//!   Messages API refiner, subprocess renderer/analyzer, trace recording
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use coverloop::{Config, RefinementLoop};
//!
//! let cover = RefinementLoop::new(renderer, analyzer, refiner, &Config::default());
//! let outcome = cover.run(&reference_features, initial_pattern).await?;
//! println!("best score {}", outcome.best_score);
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Comparison, Config, CoverOutcome, FeatureVector, IterationRecord, MusicalKey, SongStructure,
    StopReason,
};
pub use domain::ports::{Analyzer, PreviewSink, Refiner, Renderer};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CancellationSignal, ConvergenceMode, FeatureComparator, HierarchicalBuilder, RecoveryLoop,
    RefinementLoop,
};
