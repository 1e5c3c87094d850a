use serde::{Deserialize, Serialize};

use super::comparison::{ScoreCaps, ThresholdConfig, WeightConfig};

/// Main configuration structure for coverloop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Refinement loop settings
    #[serde(default)]
    pub refinement: RefinementConfig,

    /// Auto-mode scoring weights and diff caps
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Manual-mode pass/fail bounds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Render recovery settings
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Hierarchical builder settings
    #[serde(default)]
    pub builder: BuilderConfig,

    /// Text-generation client settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// External render command
    #[serde(default)]
    pub renderer: RendererConfig,

    /// External analysis command
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Trace output
    #[serde(default)]
    pub output: OutputConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Which convergence rule ends a refinement run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceModeKind {
    /// Stop once the weighted score reaches `target_score`
    #[default]
    Auto,
    /// Stop once every configured threshold passes
    Manual,
}

/// Refinement loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RefinementConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Seconds of audio requested per render
    #[serde(default = "default_render_duration_secs")]
    pub render_duration_secs: f64,

    #[serde(default)]
    pub mode: ConvergenceModeKind,

    /// Auto-mode target score (0-100)
    #[serde(default = "default_target_score")]
    pub target_score: f64,

    /// Refiner re-asks allowed when a refined candidate fails the static check
    #[serde(default = "default_max_validation_retries")]
    pub max_validation_retries: u32,

    /// Upper bound for one text-generation call
    #[serde(default = "default_refiner_timeout_secs")]
    pub refiner_timeout_secs: u64,
}

const fn default_max_iterations() -> u32 {
    5
}

const fn default_render_duration_secs() -> f64 {
    30.0
}

const fn default_target_score() -> f64 {
    85.0
}

const fn default_max_validation_retries() -> u32 {
    2
}

const fn default_refiner_timeout_secs() -> u64 {
    180
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            render_duration_secs: default_render_duration_secs(),
            mode: ConvergenceModeKind::default(),
            target_score: default_target_score(),
            max_validation_retries: default_max_validation_retries(),
            refiner_timeout_secs: default_refiner_timeout_secs(),
        }
    }
}

/// Scoring configuration for auto mode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: WeightConfig,

    #[serde(default)]
    pub caps: ScoreCaps,
}

/// Render recovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecoveryConfig {
    /// Render attempts with generated candidates before the fallback is used
    #[serde(default = "default_recovery_retries")]
    pub max_retries: u32,

    /// Substitute the known-good fallback once retries are exhausted
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
}

const fn default_recovery_retries() -> u32 {
    3
}

const fn default_true() -> bool {
    true
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_recovery_retries(),
            fallback_enabled: default_true(),
        }
    }
}

/// Hierarchical builder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BuilderConfig {
    /// Measures generated per section (evenly spaced, first always included)
    #[serde(default = "default_measures_per_section")]
    pub measures_per_section: usize,

    /// Regeneration attempts per layer before the fallback fragment is used
    #[serde(default = "default_max_layer_retries")]
    pub max_layer_retries: u32,

    /// Repeat the arrangement until it lasts at least this long
    #[serde(default)]
    pub min_total_duration_secs: Option<f64>,

    /// Delay after each accepted layer while a preview sink is attached
    #[serde(default)]
    pub preview_pacing_ms: u64,

    /// Upper bound for delivering one preview notification
    #[serde(default = "default_preview_timeout_ms")]
    pub preview_timeout_ms: u64,

    /// Render each assembled section through the recovery loop
    #[serde(default = "default_true")]
    pub render_sections: bool,
}

const fn default_measures_per_section() -> usize {
    2
}

const fn default_max_layer_retries() -> u32 {
    3
}

const fn default_preview_timeout_ms() -> u64 {
    2_000
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            measures_per_section: default_measures_per_section(),
            max_layer_retries: default_max_layer_retries(),
            min_total_duration_secs: None,
            preview_pacing_ms: 0,
            preview_timeout_ms: default_preview_timeout_ms(),
            render_sections: default_true(),
        }
    }
}

/// Text-generation client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Falls back to `ANTHROPIC_API_KEY` when unset
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_requests_per_second")]
    pub rate_limit_rps: f64,

    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

const fn default_max_tokens() -> u32 {
    4096
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_requests_per_second() -> f64 {
    2.0
}

const fn default_llm_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    2_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

const fn default_llm_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            rate_limit_rps: default_requests_per_second(),
            max_retries: default_llm_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// External render command.
///
/// Argument templates may use `{duration}` and `{output}`; the candidate is
/// written to the command's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RendererConfig {
    #[serde(default = "default_render_command")]
    pub command: String,

    #[serde(default = "default_render_args")]
    pub args: Vec<String>,

    /// Time allowed for one complete render
    #[serde(default = "default_render_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_render_command() -> String {
    "coverloop-render".to_string()
}

fn default_render_args() -> Vec<String> {
    vec![
        "--duration".to_string(),
        "{duration}".to_string(),
        "--output".to_string(),
        "{output}".to_string(),
    ]
}

const fn default_render_timeout_secs() -> u64 {
    240
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: default_render_command(),
            args: default_render_args(),
            timeout_secs: default_render_timeout_secs(),
        }
    }
}

/// External analysis command.
///
/// Argument templates may use `{input}`; the command prints JSON on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnalyzerConfig {
    #[serde(default = "default_analyze_command")]
    pub command: String,

    #[serde(default = "default_feature_args")]
    pub feature_args: Vec<String>,

    #[serde(default = "default_structure_args")]
    pub structure_args: Vec<String>,

    #[serde(default = "default_analyze_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_analyze_command() -> String {
    "coverloop-analyze".to_string()
}

fn default_feature_args() -> Vec<String> {
    vec!["features".to_string(), "{input}".to_string()]
}

fn default_structure_args() -> Vec<String> {
    vec!["structure".to_string(), "{input}".to_string()]
}

const fn default_analyze_timeout_secs() -> u64 {
    120
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            command: default_analyze_command(),
            feature_args: default_feature_args(),
            structure_args: default_structure_args(),
            timeout_secs: default_analyze_timeout_secs(),
        }
    }
}

/// Trace output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    /// Directory receiving per-run trace folders
    #[serde(default = "default_trace_dir")]
    pub trace_dir: String,

    /// Also persist rendered audio next to the trace
    #[serde(default = "default_true")]
    pub keep_artifacts: bool,
}

fn default_trace_dir() -> String {
    ".coverloop/runs".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            trace_dir: default_trace_dir(),
            keep_artifacts: default_true(),
        }
    }
}
