//! `coverloop cover`: run the refinement loop against a reference.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::output::{output, table, CommandOutput};
use crate::cli::progress::ProgressObserver;
use crate::domain::models::{Config, ConvergenceModeKind, CoverOutcome, StopReason};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::trace::TraceRecorder;
use crate::services::fallback::fallback_pattern;
use crate::services::{CancellationSignal, RefinementLoop};

use super::{load_features, Collaborators};

#[derive(Args, Debug)]
pub struct CoverArgs {
    /// Reference audio, or its features as a `.json` file
    pub reference: PathBuf,

    /// Starting candidate (defaults to a plain groove in the reference key)
    #[arg(short, long)]
    pub initial: Option<PathBuf>,

    #[arg(long)]
    pub max_iterations: Option<u32>,

    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Auto-mode target score (0-100)
    #[arg(long)]
    pub target: Option<f64>,

    /// Write the best pattern to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not record a trace directory
    #[arg(long)]
    pub no_trace: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Auto,
    Manual,
}

impl From<ModeArg> for ConvergenceModeKind {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => Self::Auto,
            ModeArg::Manual => Self::Manual,
        }
    }
}

impl CoverArgs {
    fn apply(&self, mut config: Config) -> Result<Config> {
        if let Some(max) = self.max_iterations {
            config.refinement.max_iterations = max;
        }
        if let Some(mode) = self.mode {
            config.refinement.mode = mode.into();
        }
        if let Some(target) = self.target {
            config.refinement.target_score = target;
        }
        ConfigLoader::validate(&config).context("Invalid command-line overrides")?;
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
pub struct IterationRow {
    pub iteration: u32,
    pub score: f64,
    pub tempo_diff: f64,
    pub key_match: bool,
    pub kick_similarity: f64,
    pub snare_similarity: f64,
    pub used_fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct CoverOutput {
    pub run_id: Uuid,
    pub stop_reason: StopReason,
    pub converged: bool,
    pub best_score: f64,
    pub best_iteration: u32,
    pub iterations: Vec<IterationRow>,
    pub best_pattern: String,
    pub trace_dir: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
}

impl CoverOutput {
    fn new(outcome: &CoverOutcome, trace_dir: Option<PathBuf>, output_file: Option<PathBuf>) -> Self {
        Self {
            run_id: outcome.run_id,
            stop_reason: outcome.stop_reason,
            converged: outcome.converged(),
            best_score: outcome.best_score,
            best_iteration: outcome.best_iteration,
            iterations: outcome
                .history
                .iter()
                .map(|r| IterationRow {
                    iteration: r.iteration,
                    score: r.comparison.score,
                    tempo_diff: r.comparison.tempo_diff,
                    key_match: r.comparison.key_match,
                    kick_similarity: r.comparison.kick_similarity,
                    snare_similarity: r.comparison.snare_similarity,
                    used_fallback: r.used_fallback,
                })
                .collect(),
            best_pattern: outcome.best_pattern.clone(),
            trace_dir,
            output_file,
        }
    }
}

impl CommandOutput for CoverOutput {
    fn to_human(&self) -> String {
        let mut history = table(&["#", "Score", "Tempo Δ", "Key", "Kick", "Snare", "Fallback"]);
        for row in &self.iterations {
            let marker = if row.iteration == self.best_iteration { "*" } else { "" };
            history.add_row(vec![
                format!("{}{marker}", row.iteration + 1),
                format!("{:.1}", row.score),
                format!("{:.1}", row.tempo_diff),
                (if row.key_match { "✓" } else { "✗" }).to_string(),
                format!("{:.2}", row.kick_similarity),
                format!("{:.2}", row.snare_similarity),
                (if row.used_fallback { "yes" } else { "" }).to_string(),
            ]);
        }

        let stop = match self.stop_reason {
            StopReason::Converged => "converged",
            StopReason::MaxIterations => "iteration limit reached",
            StopReason::Cancelled => "cancelled",
        };
        let mut lines = vec![
            format!("Run {} ({stop})", self.run_id),
            format!(
                "Best score {:.1} at iteration {}",
                self.best_score,
                self.best_iteration + 1
            ),
            history.to_string(),
        ];
        if let Some(dir) = &self.trace_dir {
            lines.push(format!("Trace: {}", dir.display()));
        }
        match &self.output_file {
            Some(path) => lines.push(format!("Best pattern written to {}", path.display())),
            None => {
                lines.push(String::new());
                lines.push(self.best_pattern.clone());
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(
    args: CoverArgs,
    config: Config,
    cancel: CancellationSignal,
    json_mode: bool,
) -> Result<()> {
    let config = args.apply(config)?;
    let collaborators = Collaborators::from_config(&config)?;

    let reference = load_features(&collaborators.analyzer, &args.reference).await?;
    let initial = match &args.initial {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read initial candidate {}", path.display()))?,
        None => fallback_pattern(reference.tempo, &reference.key),
    };

    let progress = if json_mode {
        ProgressObserver::hidden()
    } else {
        ProgressObserver::new(config.refinement.max_iterations)
    };
    let mut cover = RefinementLoop::new(
        collaborators.renderer,
        collaborators.analyzer,
        collaborators.refiner,
        &config,
    )
    .with_cancellation(cancel)
    .with_observer(Arc::new(progress));

    let trace_dir = if args.no_trace {
        None
    } else {
        let recorder =
            TraceRecorder::create(&config.output.trace_dir, config.output.keep_artifacts).await?;
        let dir = recorder.run_dir().to_path_buf();
        cover = cover.with_observer(Arc::new(recorder));
        Some(dir)
    };

    let outcome = cover
        .run(&reference, &initial)
        .await
        .context("Refinement run failed")?;

    if let Some(path) = &args.output {
        tokio::fs::write(path, &outcome.best_pattern)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    output(&CoverOutput::new(&outcome, trace_dir, args.output), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CoverArgs {
        CoverArgs {
            reference: PathBuf::from("ref.json"),
            initial: None,
            max_iterations: Some(9),
            mode: Some(ModeArg::Manual),
            target: None,
            output: None,
            no_trace: true,
        }
    }

    #[test]
    fn test_overrides_apply() {
        let config = args().apply(Config::default()).unwrap();
        assert_eq!(config.refinement.max_iterations, 9);
        assert_eq!(config.refinement.mode, ConvergenceModeKind::Manual);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut bad = args();
        bad.max_iterations = Some(0);
        assert!(bad.apply(Config::default()).is_err());
    }
}
