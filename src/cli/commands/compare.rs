//! `coverloop compare`: score a candidate against a reference once.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::cli::output::{output, table, CommandOutput};
use crate::domain::models::{Comparison, Config};
use crate::infrastructure::analysis::CommandAnalyzer;
use crate::services::{evaluate, ConvergenceMode, FeatureComparator, ThresholdCheck};

use super::load_features;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Reference audio, or its features as a `.json` file
    pub reference: PathBuf,

    /// Candidate audio, or its features as a `.json` file
    pub candidate: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct CompareOutput {
    pub comparison: Comparison,
    /// Manual-mode checks under the configured thresholds
    pub checks: BTreeMap<ThresholdCheck, bool>,
    pub passes_thresholds: bool,
    pub meets_target: bool,
}

impl CompareOutput {
    pub fn new(comparison: Comparison, config: &Config) -> Self {
        let manual = evaluate(
            &comparison,
            &ConvergenceMode::Manual {
                thresholds: config.thresholds,
            },
        );
        let auto = evaluate(
            &comparison,
            &ConvergenceMode::Auto {
                target: config.refinement.target_score,
            },
        );
        Self {
            comparison,
            checks: manual.checks,
            passes_thresholds: manual.stop,
            meets_target: auto.stop,
        }
    }
}

impl CommandOutput for CompareOutput {
    fn to_human(&self) -> String {
        let c = &self.comparison;
        let verdict = |check: ThresholdCheck| match self.checks.get(&check) {
            Some(true) => "pass",
            Some(false) => "FAIL",
            None => "-",
        };

        let rows = [
            ("tempo diff (BPM)", format!("{:.2}", c.tempo_diff), ThresholdCheck::Tempo),
            ("key match", c.key_match.to_string(), ThresholdCheck::Key),
            ("energy diff", format!("{:.3}", c.energy_diff), ThresholdCheck::Energy),
            ("brightness diff", format!("{:.3}", c.brightness_diff), ThresholdCheck::Brightness),
            ("kick similarity", format!("{:.2}", c.kick_similarity), ThresholdCheck::Kick),
            ("snare similarity", format!("{:.2}", c.snare_similarity), ThresholdCheck::Snare),
        ];
        let mut metrics = table(&["Metric", "Value", "Threshold"]);
        for (name, value, check) in rows {
            metrics.add_row(vec![name.to_string(), value, verdict(check).to_string()]);
        }

        format!(
            "{metrics}\nScore: {:.1} ({})\nThresholds: {}",
            c.score,
            if self.meets_target { "meets target" } else { "below target" },
            if self.passes_thresholds { "all pass" } else { "not met" },
        )
    }
}

pub async fn execute(args: CompareArgs, config: Config, json_mode: bool) -> Result<()> {
    let analyzer = CommandAnalyzer::new(config.analyzer.clone());
    let reference = load_features(&analyzer, &args.reference).await?;
    let candidate = load_features(&analyzer, &args.candidate).await?;

    let comparison =
        FeatureComparator::new(config.scoring.weights, config.scoring.caps).compare(&reference, &candidate);

    output(&CompareOutput::new(comparison, &config), json_mode);
    Ok(())
}
