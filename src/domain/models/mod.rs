pub mod comparison;
pub mod config;
pub mod features;
pub mod iteration;
pub mod structure;

pub use comparison::{Comparison, ScoreCaps, ThresholdConfig, WeightConfig};
pub use config::{
    AnalyzerConfig, BuilderConfig, Config, ConvergenceModeKind, LlmConfig, LoggingConfig,
    OutputConfig, RecoveryConfig, RefinementConfig, RendererConfig, ScoringConfig,
};
pub use features::{FeatureVector, KeyMode, KeyParseError, MusicalKey};
pub use iteration::{
    ArtifactRef, AudioArtifact, CoverOutcome, ErrorAttempt, IterationRecord, StopReason,
};
pub use structure::{Layer, LayerType, Measure, Section, SectionType, SongStructure};
