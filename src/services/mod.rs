//! Core services: scoring, convergence, recovery and the two generation loops.
//!
//! Everything here is written against the domain ports only and runs
//! sequentially; suspension happens at collaborator calls.

pub mod cancellation;
pub mod comparator;
pub mod composition;
pub mod convergence;
pub mod error_classifier;
pub mod fallback;
pub mod hierarchical_builder;
pub mod observer;
pub mod prompts;
pub mod recovery;
pub mod refinement_loop;
pub mod refiner_call;
pub mod validation;

pub use cancellation::CancellationSignal;
pub use comparator::{compare, rhythm_similarity, FeatureComparator};
pub use convergence::{evaluate, should_stop, ConvergenceDecision, ConvergenceMode, ThresholdCheck};
pub use error_classifier::{classify, Diagnosis, FailureKind, ProbableCause, RenderFailure};
pub use hierarchical_builder::{
    BuildOutcome, BuildPhase, HierarchicalBuilder, LiveAccumulator, PreviewEvent, SectionResult,
};
pub use observer::LoopObserver;
pub use recovery::{RecoveryLoop, RecoveryOutcome};
pub use refinement_loop::RefinementLoop;
pub use validation::{sanitize_candidate, validate, PatternIssue};
