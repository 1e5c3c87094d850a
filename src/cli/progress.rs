//! Terminal progress for refinement runs.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::domain::models::{CoverOutcome, IterationRecord};
use crate::services::{ConvergenceDecision, LoopObserver};

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// [`LoopObserver`] that drives an `indicatif` bar, one tick per iteration.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(max_iterations: u32) -> Self {
        let bar = ProgressBar::new(u64::from(max_iterations));
        if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            bar.set_style(style.progress_chars(PROGRESS_CHARS));
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Observer that draws nothing, for `--json` runs.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

#[async_trait]
impl LoopObserver for ProgressObserver {
    async fn on_iteration_started(&self, iteration: u32) {
        self.bar
            .set_message(format!("iteration {}: rendering", iteration + 1));
    }

    async fn on_iteration_completed(&self, record: &IterationRecord, decision: &ConvergenceDecision) {
        let failed = decision.failed_checks();
        let detail = if failed.is_empty() {
            String::new()
        } else {
            let names: Vec<String> = failed.iter().map(ToString::to_string).collect();
            format!(" (failing: {})", names.join(", "))
        };
        self.bar.set_message(format!(
            "score {:.1}{}{detail}",
            record.comparison.score,
            if record.used_fallback { " [fallback]" } else { "" },
        ));
        self.bar.inc(1);
    }

    async fn on_finished(&self, outcome: &CoverOutcome) {
        self.bar.finish_with_message(format!(
            "✓ best {:.1} at iteration {}",
            outcome.best_score,
            outcome.best_iteration + 1
        ));
    }
}
