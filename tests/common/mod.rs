//! Scripted collaborators shared by the integration tests.
//!
//! The renderer echoes the candidate text back as "audio" unless scripted
//! otherwise, so analyzers can key their answers on the candidate that was
//! rendered.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use coverloop::domain::models::{
    Config, FeatureVector, Layer, LayerType, Measure, MusicalKey, Section, SectionType,
    SongStructure,
};
use coverloop::domain::ports::{
    Analyzer, AnalyzerError, ChatMessage, PreviewError, PreviewSink, Refiner, RefinerError,
    RenderOutcome, Renderer, RendererError,
};

/// Reference used across scenarios: 120 BPM, C major, energy 0.7.
pub fn reference() -> FeatureVector {
    FeatureVector::new(120.0, MusicalKey::major(0)).with_energy(0.7)
}

/// Defaults with short timeouts and no per-test surprises.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.refinement.refiner_timeout_secs = 5;
    config.builder.preview_timeout_ms = 200;
    config
}

pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// ---------------------------------------------------------------------------
// Renderer

#[derive(Default)]
pub struct ScriptedRenderer {
    script: Mutex<VecDeque<Result<RenderOutcome, RendererError>>>,
    silent_marker: Option<String>,
    rendered: Mutex<Vec<String>>,
    opens: AtomicU32,
    closes: AtomicU32,
}

impl ScriptedRenderer {
    /// Renderer that echoes every candidate.
    pub fn echo() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Renderer that plays `script` in order, then echoes.
    pub fn scripted(script: Vec<Result<RenderOutcome, RendererError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    /// Renderer reporting silence for any candidate containing `marker`.
    pub fn silent_when_contains(marker: &str) -> Arc<Self> {
        Arc::new(Self {
            silent_marker: Some(marker.to_string()),
            ..Self::default()
        })
    }

    pub async fn rendered(&self) -> Vec<String> {
        self.rendered.lock().await.clone()
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn open(&self) -> Result<(), RendererError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn render(
        &self,
        candidate: &str,
        _duration_secs: f64,
    ) -> Result<RenderOutcome, RendererError> {
        self.rendered.lock().await.push(candidate.to_string());
        if let Some(next) = self.script.lock().await.pop_front() {
            return next;
        }
        match &self.silent_marker {
            Some(marker) if candidate.contains(marker.as_str()) => Ok(RenderOutcome::silent()),
            _ => Ok(RenderOutcome::ok(candidate.as_bytes().to_vec())),
        }
    }

    async fn close(&self) -> Result<(), RendererError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Analyzer

type FeatureFn = Box<dyn Fn(&str) -> FeatureVector + Send + Sync>;

pub struct ScriptedAnalyzer {
    features: FeatureFn,
    structure: Option<SongStructure>,
    fail: bool,
    calls: AtomicU32,
}

impl ScriptedAnalyzer {
    /// Analyzer answering with `f(rendered candidate text)`.
    pub fn by_candidate(f: impl Fn(&str) -> FeatureVector + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            features: Box::new(f),
            structure: None,
            fail: false,
            calls: AtomicU32::new(0),
        })
    }

    /// Analyzer that always returns `features`.
    pub fn constant(features: FeatureVector) -> Arc<Self> {
        Self::by_candidate(move |_| features.clone())
    }

    pub fn with_structure(features: FeatureVector, structure: SongStructure) -> Arc<Self> {
        Arc::new(Self {
            features: Box::new(move |_| features.clone()),
            structure: Some(structure),
            fail: false,
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            features: Box::new(|_| reference()),
            structure: None,
            fail: true,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, audio: &[u8]) -> Result<FeatureVector, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AnalyzerError::Unavailable("dsp service down".to_string()));
        }
        Ok((self.features)(&String::from_utf8_lossy(audio)))
    }

    async fn analyze_structure(&self, _audio: &[u8]) -> Result<SongStructure, AnalyzerError> {
        self.structure
            .clone()
            .ok_or_else(|| AnalyzerError::Failed("no structure scripted".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Refiner

pub struct ScriptedRefiner {
    replies: Mutex<VecDeque<Result<String, RefinerError>>>,
    fallback_reply: String,
    delay: Option<Duration>,
    conversations: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedRefiner {
    /// Refiner that always answers `reply`.
    pub fn constant(reply: &str) -> Arc<Self> {
        Self::scripted(Vec::new(), reply)
    }

    /// Refiner that plays `replies` in order, then answers `then`.
    pub fn scripted(replies: Vec<&str>, then: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            fallback_reply: then.to_string(),
            delay: None,
            conversations: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([Err(RefinerError::Unavailable(
                "connection refused".to_string(),
            ))])),
            fallback_reply: String::new(),
            delay: None,
            conversations: Mutex::new(Vec::new()),
        })
    }

    /// Refiner that takes `delay` before every answer.
    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            fallback_reply: reply.to_string(),
            delay: Some(delay),
            conversations: Mutex::new(Vec::new()),
        })
    }

    pub async fn calls(&self) -> usize {
        self.conversations.lock().await.len()
    }

    pub async fn conversations(&self) -> Vec<Vec<ChatMessage>> {
        self.conversations.lock().await.clone()
    }
}

#[async_trait]
impl Refiner for ScriptedRefiner {
    async fn complete(&self, conversation: &[ChatMessage]) -> Result<String, RefinerError> {
        self.conversations.lock().await.push(conversation.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.replies.lock().await.pop_front() {
            Some(reply) => reply,
            None => Ok(self.fallback_reply.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Preview

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Fragment(String, String),
    Composite(String),
}

#[derive(Default)]
pub struct RecordingPreview {
    seen: Mutex<Vec<Seen>>,
    delay: Option<Duration>,
}

impl RecordingPreview {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sink that sleeps `delay` inside every notification.
    pub fn stalled(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub async fn seen(&self) -> Vec<Seen> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl PreviewSink for RecordingPreview {
    async fn on_fragment_accepted(&self, layer_id: &str, fragment: &str) -> Result<(), PreviewError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.seen
            .lock()
            .await
            .push(Seen::Fragment(layer_id.to_string(), fragment.to_string()));
        Ok(())
    }

    async fn on_accumulator_updated(&self, composite: &str) -> Result<(), PreviewError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.seen
            .lock()
            .await
            .push(Seen::Composite(composite.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Structures

pub fn section(index: u32, section_type: SectionType, measures: u32, layers: &[(&str, LayerType)]) -> Section {
    Section {
        index,
        section_type,
        energy: 0.5,
        bars: measures,
        duration: 8.0,
        measures: (0..measures)
            .map(|m| Measure {
                index: m,
                layers: layers
                    .iter()
                    .map(|(id, layer_type)| Layer::new(*id, *layer_type))
                    .collect(),
            })
            .collect(),
    }
}

/// Verse, chorus, verse; the verses share a layer layout.
pub fn verse_chorus_verse() -> SongStructure {
    let verse_layers = [("drums", LayerType::Drums), ("bass", LayerType::Bass)];
    SongStructure {
        sections: vec![
            section(0, SectionType::Verse, 4, &verse_layers),
            section(1, SectionType::Chorus, 4, &[("drums", LayerType::Drums)]),
            section(2, SectionType::Verse, 4, &verse_layers),
        ],
    }
}
