use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid recovery max_retries: {0}. Must be at least 1")]
    InvalidRecoveryRetries(u32),

    #[error("Invalid render_duration_secs: {0}. Must be positive")]
    InvalidRenderDuration(f64),

    #[error("Invalid target_score: {0}. Must be between 0 and 100")]
    InvalidTargetScore(f64),

    #[error("Invalid weight for {0}: {1}. Weights must be non-negative")]
    NegativeWeight(&'static str, f64),

    #[error("Scoring weights sum to zero")]
    ZeroWeights,

    #[error("Invalid cap for {0}: {1}. Caps must be positive")]
    InvalidCap(&'static str, f64),

    #[error("Invalid similarity bound for {0}: {1}. Must be between 0 and 1")]
    InvalidSimilarityBound(&'static str, f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("{0} command cannot be empty")]
    EmptyCommand(&'static str),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid min_total_duration_secs: {0}. Must be finite and positive")]
    InvalidMinDuration(f64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .coverloop/config.yaml (project config)
    /// 3. .coverloop/local.yaml (local overrides, optional)
    /// 4. Environment variables (COVERLOOP_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".coverloop/config.yaml"))
            .merge(Yaml::file(".coverloop/local.yaml"))
            .merge(Env::prefixed("COVERLOOP_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file on top of the defaults.
    ///
    /// Environment overrides still apply.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("COVERLOOP_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let refinement = &config.refinement;
        if refinement.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(refinement.max_iterations));
        }
        if !(refinement.render_duration_secs > 0.0) {
            return Err(ConfigError::InvalidRenderDuration(
                refinement.render_duration_secs,
            ));
        }
        if !(0.0..=100.0).contains(&refinement.target_score) {
            return Err(ConfigError::InvalidTargetScore(refinement.target_score));
        }

        if config.recovery.max_retries == 0 {
            return Err(ConfigError::InvalidRecoveryRetries(
                config.recovery.max_retries,
            ));
        }

        let weights = &config.scoring.weights;
        for (name, weight) in weights.entries() {
            if !(weight >= 0.0) {
                return Err(ConfigError::NegativeWeight(name, weight));
            }
        }
        if weights.total() <= f64::EPSILON {
            return Err(ConfigError::ZeroWeights);
        }

        let caps = &config.scoring.caps;
        for (name, cap) in [
            ("tempo", caps.tempo),
            ("energy", caps.energy),
            ("brightness", caps.brightness),
        ] {
            if !(cap > 0.0) {
                return Err(ConfigError::InvalidCap(name, cap));
            }
        }

        let thresholds = &config.thresholds;
        for (name, bound) in [
            ("kick", thresholds.min_kick_similarity),
            ("snare", thresholds.min_snare_similarity),
        ] {
            if let Some(bound) = bound {
                if !(0.0..=1.0).contains(&bound) {
                    return Err(ConfigError::InvalidSimilarityBound(name, bound));
                }
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        if config.renderer.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand("renderer"));
        }
        if config.analyzer.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand("analyzer"));
        }

        if !(config.llm.rate_limit_rps > 0.0) {
            return Err(ConfigError::InvalidRateLimit(config.llm.rate_limit_rps));
        }
        if config.llm.initial_backoff_ms >= config.llm.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.llm.initial_backoff_ms,
                config.llm.max_backoff_ms,
            ));
        }

        if config.builder.measures_per_section == 0 {
            return Err(ConfigError::ValidationFailed(
                "builder.measures_per_section must be at least 1".to_string(),
            ));
        }
        if config.builder.max_layer_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "builder.max_layer_retries must be at least 1".to_string(),
            ));
        }
        if let Some(min) = config.builder.min_total_duration_secs {
            if !(min.is_finite() && min > 0.0) {
                return Err(ConfigError::InvalidMinDuration(min));
            }
        }

        Ok(())
    }
}
