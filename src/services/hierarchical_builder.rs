//! Hierarchical incremental builder.
//!
//! Builds a composition bottom-up: for each section, a representative subset
//! of its measures, and for each measure every active layer. Each layer
//! fragment is generated in the context of the layers already accepted for
//! the same measure, statically validated, retried a bounded number of times
//! and finally replaced by a per-layer fallback so construction never stalls.
//!
//! Progress is streamed to an optional [`PreviewSink`] through a bounded
//! channel. The builder only ever `try_send`s, so a slow or stuck player
//! cannot hold up construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BuilderConfig, Comparison, Config, ErrorAttempt, FeatureVector, MusicalKey, RecoveryConfig,
    Section, SectionType, SongStructure,
};
use crate::domain::ports::{Analyzer, PreviewSink, Refiner, Renderer};

use super::cancellation::CancellationSignal;
use super::comparator::FeatureComparator;
use super::composition::{assemble, measure_pattern, section_pattern, SectionPart};
use super::fallback::{fallback_fragment, fallback_pattern, fallback_section};
use super::prompts::{layer_conversation, LayerContext};
use super::recovery::RecoveryLoop;
use super::refiner_call::request_candidate;
use super::validation::validate;

const PREVIEW_QUEUE_CAPACITY: usize = 64;
const DEFAULT_TEMPO: f64 = 120.0;

/// Build state, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Analyzing,
    SectionLoop,
    MeasureLoop,
    LayerLoop,
    Assembling,
    Done,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Analyzing => "analyzing",
            Self::SectionLoop => "section_loop",
            Self::MeasureLoop => "measure_loop",
            Self::LayerLoop => "layer_loop",
            Self::Assembling => "assembling",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Notification queued for the preview sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEvent {
    FragmentAccepted { layer_id: String, fragment: String },
    AccumulatorUpdated { composite: String },
}

/// Concatenation of every accepted fragment, in acceptance order.
///
/// Append-only for the whole build: later measures and sections extend it,
/// nothing is ever rewritten or dropped.
#[derive(Debug, Clone, Default)]
pub struct LiveAccumulator {
    fragments: Vec<String>,
}

impl LiveAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, fragment: &str) {
        self.fragments.push(fragment.to_string());
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn composite(&self) -> String {
        self.fragments.join("\n")
    }
}

/// Result for one section of the build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResult {
    pub index: u32,
    pub section_type: SectionType,
    pub pattern: String,
    pub duration: f64,
    /// Layers that ended on their fallback fragment
    pub fallback_layers: usize,
    /// Whether the section render check substituted the section fallback
    pub used_fallback: bool,
}

/// Final result of a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub composition: String,
    pub sections: Vec<SectionResult>,
    /// Comparison of `composition` against the reference, when reference
    /// features were supplied and the composition (or its repaired form)
    /// rendered without falling back
    pub final_comparison: Option<Comparison>,
}

pub struct HierarchicalBuilder {
    renderer: Arc<dyn Renderer>,
    analyzer: Arc<dyn Analyzer>,
    refiner: Arc<dyn Refiner>,
    config: BuilderConfig,
    recovery: RecoveryConfig,
    render_duration_secs: f64,
    refiner_timeout: Duration,
    comparator: FeatureComparator,
    preview: Option<Arc<dyn PreviewSink>>,
    cancel: CancellationSignal,
}

impl HierarchicalBuilder {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        analyzer: Arc<dyn Analyzer>,
        refiner: Arc<dyn Refiner>,
        config: &Config,
    ) -> Self {
        Self {
            renderer,
            analyzer,
            refiner,
            config: config.builder.clone(),
            recovery: config.recovery.clone(),
            render_duration_secs: config.refinement.render_duration_secs,
            refiner_timeout: Duration::from_secs(config.refinement.refiner_timeout_secs),
            comparator: FeatureComparator::new(config.scoring.weights, config.scoring.caps),
            preview: None,
            cancel: CancellationSignal::new(),
        }
    }

    #[must_use]
    pub fn with_preview(mut self, sink: Arc<dyn PreviewSink>) -> Self {
        self.preview = Some(sink);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Analyse the reference audio's structure, then build from it.
    pub async fn build(
        &self,
        reference_audio: &[u8],
        reference: Option<&FeatureVector>,
    ) -> DomainResult<BuildOutcome> {
        enter(BuildPhase::Analyzing);
        let structure = self
            .analyzer
            .analyze_structure(reference_audio)
            .await
            .map_err(|e| DomainError::unavailable("analyzer", e.to_string()))?;
        self.build_from_structure(&structure, reference).await
    }

    /// Build from an already analysed structure.
    ///
    /// The renderer is opened for the whole build and closed on every exit
    /// path; the preview forwarder is drained before returning.
    #[instrument(skip_all, fields(sections = structure.sections.len()))]
    pub async fn build_from_structure(
        &self,
        structure: &SongStructure,
        reference: Option<&FeatureVector>,
    ) -> DomainResult<BuildOutcome> {
        structure.validate()?;

        let (preview_tx, forwarder) = match &self.preview {
            Some(sink) => {
                let (tx, handle) = spawn_preview_forwarder(
                    Arc::clone(sink),
                    Duration::from_millis(self.config.preview_timeout_ms),
                );
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        self.renderer
            .open()
            .await
            .map_err(|e| DomainError::unavailable("renderer", e.to_string()))?;

        let result = self
            .build_inner(structure, reference, preview_tx.as_ref())
            .await;

        if let Err(e) = self.renderer.close().await {
            tracing::warn!(error = %e, "Failed to close renderer");
        }

        drop(preview_tx);
        if let Some(handle) = forwarder {
            let drain_budget =
                Duration::from_millis(self.config.preview_timeout_ms.saturating_mul(2));
            let abort = handle.abort_handle();
            if tokio::time::timeout(drain_budget, handle).await.is_err() {
                tracing::warn!("Preview forwarder did not drain in time, aborting it");
                abort.abort();
            }
        }

        result
    }

    async fn build_inner(
        &self,
        structure: &SongStructure,
        reference: Option<&FeatureVector>,
        preview: Option<&mpsc::Sender<PreviewEvent>>,
    ) -> DomainResult<BuildOutcome> {
        let key = reference.map(|r| r.key).unwrap_or_default();
        let tempo = reference.map_or(DEFAULT_TEMPO, |r| r.tempo);
        let recovery = RecoveryLoop::new(
            Arc::clone(&self.renderer),
            Arc::clone(&self.refiner),
            self.recovery.clone(),
            self.refiner_timeout,
        )
        .with_cancellation(self.cancel.clone());

        let mut accumulator = LiveAccumulator::new();
        let mut sections = Vec::with_capacity(structure.sections.len());

        enter(BuildPhase::SectionLoop);
        for section in &structure.sections {
            let mut result = self
                .build_section(section, reference, &key, &mut accumulator, preview)
                .await?;

            if self.config.render_sections {
                if self.cancel.is_cancelled() {
                    return Err(DomainError::Cancelled);
                }
                let duration = section.duration.max(1.0).min(self.render_duration_secs);
                let fallback = fallback_section(&key);
                let checked = recovery
                    .render_with_recovery(&result.pattern, duration, Some(&fallback))
                    .await?;
                result.used_fallback = checked.used_fallback;
                result.pattern = checked.final_candidate;
            }

            tracing::info!(
                section = section.index,
                section_type = %section.section_type,
                fallback_layers = result.fallback_layers,
                used_fallback = result.used_fallback,
                "Section built"
            );
            sections.push(result);
        }

        enter(BuildPhase::Assembling);
        let parts: Vec<SectionPart<'_>> = sections
            .iter()
            .map(|s| SectionPart {
                pattern: &s.pattern,
                duration: s.duration,
            })
            .collect();
        let composition = assemble(tempo, &parts, self.config.min_total_duration_secs)?;

        let (composition, final_comparison) = match reference {
            Some(reference) => {
                self.compare_composition(&recovery, composition, reference)
                    .await?
            }
            None => (composition, None),
        };

        enter(BuildPhase::Done);
        Ok(BuildOutcome {
            composition,
            sections,
            final_comparison,
        })
    }

    async fn build_section(
        &self,
        section: &Section,
        reference: Option<&FeatureVector>,
        key: &MusicalKey,
        accumulator: &mut LiveAccumulator,
        preview: Option<&mpsc::Sender<PreviewEvent>>,
    ) -> DomainResult<SectionResult> {
        enter(BuildPhase::MeasureLoop);
        let mut measure_patterns = Vec::new();
        let mut fallback_layers = 0;

        for measure in section.representative_measures(self.config.measures_per_section) {
            enter(BuildPhase::LayerLoop);
            let mut accepted: Vec<(String, String)> = Vec::with_capacity(measure.layers.len());

            for layer in &measure.layers {
                if self.cancel.is_cancelled() {
                    return Err(DomainError::Cancelled);
                }

                let context = LayerContext {
                    section,
                    measure,
                    layer,
                    accepted: &accepted,
                    reference,
                };
                let (fragment, used_fallback) = self.build_layer(&context, key).await?;
                if used_fallback {
                    fallback_layers += 1;
                }

                accumulator.append(&fragment);
                if let Some(tx) = preview {
                    notify(
                        tx,
                        PreviewEvent::FragmentAccepted {
                            layer_id: layer.id.clone(),
                            fragment: fragment.clone(),
                        },
                    );
                    notify(
                        tx,
                        PreviewEvent::AccumulatorUpdated {
                            composite: accumulator.composite(),
                        },
                    );
                    if self.config.preview_pacing_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.config.preview_pacing_ms))
                            .await;
                    }
                }
                accepted.push((layer.id.clone(), fragment));
            }

            let fragments: Vec<String> = accepted.into_iter().map(|(_, f)| f).collect();
            if let Some(pattern) = measure_pattern(&fragments) {
                measure_patterns.push(pattern);
            }
        }

        let pattern = section_pattern(&measure_patterns).unwrap_or_else(|| {
            tracing::warn!(section = section.index, "Section has no layers, using fallback");
            fallback_section(key)
        });

        Ok(SectionResult {
            index: section.index,
            section_type: section.section_type,
            pattern,
            duration: section.duration,
            fallback_layers,
            used_fallback: false,
        })
    }

    /// Generate one layer fragment. Returns the fragment and whether it is the
    /// per-layer fallback.
    #[instrument(skip_all, fields(layer = %context.layer.id, measure = context.measure.index))]
    async fn build_layer(
        &self,
        context: &LayerContext<'_>,
        key: &MusicalKey,
    ) -> DomainResult<(String, bool)> {
        let mut errors: Vec<ErrorAttempt> = Vec::new();

        for attempt in 1..=self.config.max_layer_retries {
            if self.cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }
            let conversation = layer_conversation(context, &errors);
            let fragment =
                request_candidate(self.refiner.as_ref(), &conversation, self.refiner_timeout)
                    .await?;

            match validate(&fragment) {
                Ok(()) => return Ok((fragment, false)),
                Err(issue) => {
                    tracing::debug!(attempt, %issue, "Layer fragment rejected");
                    errors.push(ErrorAttempt::new(fragment, issue.to_string()));
                }
            }
        }

        tracing::warn!(
            layer_type = %context.layer.layer_type,
            rejected = errors.len(),
            "Layer retries exhausted, using fallback fragment"
        );
        Ok((fallback_fragment(context.layer.layer_type, key), true))
    }

    /// Render the composition and score it against `reference`.
    ///
    /// Returns the text that was actually rendered and scored: a candidate
    /// repaired by the recovery loop replaces the assembled composition.
    async fn compare_composition(
        &self,
        recovery: &RecoveryLoop,
        composition: String,
        reference: &FeatureVector,
    ) -> DomainResult<(String, Option<Comparison>)> {
        if self.cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }
        let fallback = fallback_pattern(reference.tempo, &reference.key);
        let rendered = recovery
            .render_with_recovery(&composition, self.render_duration_secs, Some(&fallback))
            .await?;
        if rendered.used_fallback {
            tracing::warn!("Composition did not render, skipping final comparison");
            return Ok((composition, None));
        }
        if rendered.final_candidate != composition {
            tracing::warn!(
                repairs = rendered.attempts.len(),
                "Composition was repaired during rendering, returning the repaired text"
            );
        }

        let features = self
            .analyzer
            .analyze(&rendered.artifact.bytes)
            .await
            .map_err(|e| DomainError::unavailable("analyzer", e.to_string()))?;
        let comparison = self.comparator.compare(reference, &features);
        tracing::info!(score = comparison.score, "Composition compared to reference");
        Ok((rendered.final_candidate, Some(comparison)))
    }
}

fn enter(phase: BuildPhase) {
    tracing::debug!(%phase, "Build phase");
}

fn notify(tx: &mpsc::Sender<PreviewEvent>, event: PreviewEvent) {
    if let Err(e) = tx.try_send(event) {
        tracing::debug!(error = %e, "Preview event dropped");
    }
}

/// Deliver queued events to `sink`, giving each one at most `timeout`.
fn spawn_preview_forwarder(
    sink: Arc<dyn PreviewSink>,
    timeout: Duration,
) -> (mpsc::Sender<PreviewEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<PreviewEvent>(PREVIEW_QUEUE_CAPACITY);

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let delivery = async {
                match &event {
                    PreviewEvent::FragmentAccepted { layer_id, fragment } => {
                        sink.on_fragment_accepted(layer_id, fragment).await
                    }
                    PreviewEvent::AccumulatorUpdated { composite } => {
                        sink.on_accumulator_updated(composite).await
                    }
                }
            };
            match tokio::time::timeout(timeout, delivery).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Preview sink rejected event"),
                Err(_) => tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Preview sink timed out"
                ),
            }
        }
    });

    (tx, handle)
}
