//! `coverloop build`: construct a pattern section by section.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::output::{first_line, output, table, truncate, CommandOutput};
use crate::domain::models::{Comparison, Config, SongStructure};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::preview::FilePreviewSink;
use crate::services::{BuildOutcome, CancellationSignal, HierarchicalBuilder, SectionResult};

use super::Collaborators;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Reference audio file
    pub reference: PathBuf,

    /// Use this structure JSON instead of analysing the reference
    #[arg(long)]
    pub structure: Option<PathBuf>,

    /// Skip reference feature analysis (no key context, no final score)
    #[arg(long)]
    pub no_compare: bool,

    /// Representative measures generated per section
    #[arg(long)]
    pub measures: Option<usize>,

    /// Repeat the arrangement until it lasts at least this many seconds
    #[arg(long)]
    pub min_duration: Option<f64>,

    /// Mirror the live composite into this file while building
    #[arg(long)]
    pub preview: Option<PathBuf>,

    /// Write the composition to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl BuildArgs {
    fn apply(&self, mut config: Config) -> Result<Config> {
        if let Some(measures) = self.measures {
            config.builder.measures_per_section = measures;
        }
        if self.min_duration.is_some() {
            config.builder.min_total_duration_secs = self.min_duration;
        }
        ConfigLoader::validate(&config).context("Invalid command-line overrides")?;
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
pub struct BuildOutput {
    pub sections: Vec<SectionResult>,
    pub final_comparison: Option<Comparison>,
    pub composition: String,
    pub output_file: Option<PathBuf>,
}

impl BuildOutput {
    fn new(outcome: BuildOutcome, output_file: Option<PathBuf>) -> Self {
        Self {
            sections: outcome.sections,
            final_comparison: outcome.final_comparison,
            composition: outcome.composition,
            output_file,
        }
    }
}

impl CommandOutput for BuildOutput {
    fn to_human(&self) -> String {
        let mut sections = table(&["#", "Type", "Seconds", "Fallback layers", "Pattern"]);
        for section in &self.sections {
            sections.add_row(vec![
                section.index.to_string(),
                section.section_type.to_string(),
                format!("{:.1}", section.duration),
                if section.used_fallback {
                    "whole section".to_string()
                } else {
                    section.fallback_layers.to_string()
                },
                truncate(first_line(&section.pattern), 48),
            ]);
        }

        let mut lines = vec![
            format!("Built {} section(s)", self.sections.len()),
            sections.to_string(),
        ];
        if let Some(comparison) = &self.final_comparison {
            lines.push(format!("Final score against reference: {:.1}", comparison.score));
        }
        match &self.output_file {
            Some(path) => lines.push(format!("Composition written to {}", path.display())),
            None => {
                lines.push(String::new());
                lines.push(self.composition.clone());
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(
    args: BuildArgs,
    config: Config,
    cancel: CancellationSignal,
    json_mode: bool,
) -> Result<()> {
    let config = args.apply(config)?;
    let collaborators = Collaborators::from_config(&config)?;

    let audio = tokio::fs::read(&args.reference)
        .await
        .with_context(|| format!("Failed to read {}", args.reference.display()))?;

    let reference = if args.no_compare {
        None
    } else {
        Some(
            collaborators
                .analyzer
                .analyze_file(&args.reference)
                .await
                .context("Failed to analyse reference features")?,
        )
    };

    let mut builder = HierarchicalBuilder::new(
        collaborators.renderer,
        collaborators.analyzer,
        collaborators.refiner,
        &config,
    )
    .with_cancellation(cancel);
    if let Some(path) = &args.preview {
        builder = builder.with_preview(Arc::new(FilePreviewSink::new(path)));
    }

    let outcome = match &args.structure {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let structure: SongStructure = serde_json::from_str(&text)
                .with_context(|| format!("Invalid structure JSON in {}", path.display()))?;
            builder
                .build_from_structure(&structure, reference.as_ref())
                .await
        }
        None => builder.build(&audio, reference.as_ref()).await,
    }
    .context("Build failed")?;

    if let Some(path) = &args.output {
        tokio::fs::write(path, &outcome.composition)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    output(&BuildOutput::new(outcome, args.output), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> BuildArgs {
        BuildArgs {
            reference: PathBuf::from("ref.wav"),
            structure: None,
            no_compare: false,
            measures: Some(3),
            min_duration: Some(120.0),
            preview: None,
            output: None,
        }
    }

    #[test]
    fn test_overrides_apply() {
        let config = args().apply(Config::default()).unwrap();
        assert_eq!(config.builder.measures_per_section, 3);
        assert_eq!(config.builder.min_total_duration_secs, Some(120.0));
    }

    #[test]
    fn test_unbounded_min_duration_rejected() {
        let mut bad = args();
        bad.min_duration = Some(f64::INFINITY);
        assert!(bad.apply(Config::default()).is_err());
    }
}
