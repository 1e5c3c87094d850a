//! Integration tests for the hierarchical builder.

mod common;

use std::time::Duration;

use common::{
    reference, test_config, verse_chorus_verse, RecordingPreview, ScriptedAnalyzer,
    ScriptedRefiner, ScriptedRenderer, Seen,
};
use coverloop::domain::models::SongStructure;
use coverloop::services::validate;
use coverloop::{CancellationSignal, DomainError, HierarchicalBuilder};

const KICK: &str = "s(\"bd*4\").gain(0.9)";

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_repeated_sections_defined_once() {
    common::setup_test_logging();
    let renderer = ScriptedRenderer::echo();
    let builder = HierarchicalBuilder::new(
        renderer.clone(),
        ScriptedAnalyzer::constant(reference()),
        ScriptedRefiner::constant(KICK),
        &test_config(),
    );

    let outcome = builder
        .build_from_structure(&verse_chorus_verse(), Some(&reference()))
        .await
        .unwrap();

    assert_eq!(outcome.composition.matches("let section_").count(), 2);
    assert!(outcome
        .composition
        .ends_with("cat(section_0, section_1, section_0)"));
    assert_eq!(validate(&outcome.composition), Ok(()));

    assert_eq!(outcome.sections.len(), 3);
    assert!(outcome.sections.iter().all(|s| s.fallback_layers == 0));
    assert!(outcome.sections.iter().all(|s| !s.used_fallback));

    let comparison = outcome.final_comparison.expect("reference was supplied");
    assert!((comparison.score - 100.0).abs() < f64::EPSILON);

    assert_eq!(renderer.opens(), 1);
    assert_eq!(renderer.closes(), 1);
    // Three section checks plus the final composition
    assert_eq!(renderer.rendered().await.len(), 4);
}

#[tokio::test]
async fn test_build_analyzes_structure_first() {
    let analyzer = ScriptedAnalyzer::with_structure(reference(), verse_chorus_verse());
    let builder = HierarchicalBuilder::new(
        ScriptedRenderer::echo(),
        analyzer,
        ScriptedRefiner::constant(KICK),
        &test_config(),
    );

    let outcome = builder.build(b"reference audio", Some(&reference())).await.unwrap();

    assert_eq!(outcome.sections.len(), 3);
    assert_eq!(outcome.sections[1].section_type.to_string(), "chorus");
}

#[tokio::test]
async fn test_no_reference_uses_default_tempo() {
    let builder = HierarchicalBuilder::new(
        ScriptedRenderer::echo(),
        ScriptedAnalyzer::constant(reference()),
        ScriptedRefiner::constant(KICK),
        &test_config(),
    );

    let outcome = builder
        .build_from_structure(&verse_chorus_verse(), None)
        .await
        .unwrap();

    assert!(outcome.composition.starts_with("setcps(0.5000)"));
    assert!(outcome.final_comparison.is_none());
}

#[tokio::test]
async fn test_layers_see_earlier_layers_of_the_measure() {
    let refiner = ScriptedRefiner::constant(KICK);
    let builder = HierarchicalBuilder::new(
        ScriptedRenderer::echo(),
        ScriptedAnalyzer::constant(reference()),
        refiner.clone(),
        &test_config(),
    );

    builder
        .build_from_structure(&verse_chorus_verse(), None)
        .await
        .unwrap();

    let conversations = refiner.conversations().await;
    let first = &conversations[0].last().unwrap().content;
    let second = &conversations[1].last().unwrap().content;
    assert!(first.contains("first layer"));
    assert!(second.contains(&format!("- drums: {KICK}")), "{second}");
}

// ---------------------------------------------------------------------------
// Fallbacks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_invalid_fragments_fall_back_per_layer() {
    let refiner = ScriptedRefiner::constant("stack(s(\"bd\")");
    let builder = HierarchicalBuilder::new(
        ScriptedRenderer::echo(),
        ScriptedAnalyzer::constant(reference()),
        refiner.clone(),
        &test_config(),
    );

    let outcome = builder
        .build_from_structure(&verse_chorus_verse(), Some(&reference()))
        .await
        .unwrap();

    // Two representative measures per section
    assert_eq!(outcome.sections[0].fallback_layers, 4);
    assert_eq!(outcome.sections[1].fallback_layers, 2);
    assert_eq!(validate(&outcome.composition), Ok(()));

    // Every layer was asked max_layer_retries times
    let layers = 4 + 2 + 4;
    assert_eq!(refiner.calls().await, layers * 3);
}

#[tokio::test]
async fn test_silent_section_is_replaced() {
    let renderer = ScriptedRenderer::silent_when_contains("hh*16");
    let builder = HierarchicalBuilder::new(
        renderer,
        ScriptedAnalyzer::constant(reference()),
        ScriptedRefiner::constant("s(\"hh*16\")"),
        &test_config(),
    );

    let outcome = builder
        .build_from_structure(&verse_chorus_verse(), Some(&reference()))
        .await
        .unwrap();

    assert!(outcome.sections.iter().all(|s| s.used_fallback));
    assert_eq!(outcome.composition.matches("let section_").count(), 1);
    assert!(!outcome.composition.contains("hh*16"));
    assert!(outcome.final_comparison.is_some());
}

#[tokio::test]
async fn test_repaired_composition_is_the_one_returned() {
    let renderer = ScriptedRenderer::silent_when_contains("section_0");
    let builder = HierarchicalBuilder::new(
        renderer.clone(),
        ScriptedAnalyzer::constant(reference()),
        ScriptedRefiner::constant(KICK),
        &test_config(),
    );

    let outcome = builder
        .build_from_structure(&verse_chorus_verse(), Some(&reference()))
        .await
        .unwrap();

    // The assembled text went silent and the refiner's correction rendered
    assert!(outcome.final_comparison.is_some());
    assert_eq!(outcome.composition, KICK);
    let rendered = renderer.rendered().await;
    assert_eq!(rendered.last().map(String::as_str), Some(outcome.composition.as_str()));
}

#[tokio::test]
async fn test_unreachable_min_duration_fails_assembly() {
    let mut config = test_config();
    config.builder.min_total_duration_secs = Some(1e12);
    let renderer = ScriptedRenderer::echo();
    let builder = HierarchicalBuilder::new(
        renderer.clone(),
        ScriptedAnalyzer::constant(reference()),
        ScriptedRefiner::constant(KICK),
        &config,
    );

    let err = builder
        .build_from_structure(&verse_chorus_verse(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::InvalidConfiguration(_)), "{err}");
    assert_eq!(renderer.closes(), 1);
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_preview_receives_every_fragment() {
    let preview = RecordingPreview::new();
    let builder = HierarchicalBuilder::new(
        ScriptedRenderer::echo(),
        ScriptedAnalyzer::constant(reference()),
        ScriptedRefiner::constant(KICK),
        &test_config(),
    )
    .with_preview(preview.clone());

    builder
        .build_from_structure(&verse_chorus_verse(), None)
        .await
        .unwrap();

    let seen = preview.seen().await;
    let fragments = seen
        .iter()
        .filter(|e| matches!(e, Seen::Fragment(..)))
        .count();
    assert_eq!(fragments, 10);

    let composites: Vec<&String> = seen
        .iter()
        .filter_map(|e| match e {
            Seen::Composite(c) => Some(c),
            Seen::Fragment(..) => None,
        })
        .collect();
    assert_eq!(composites.len(), 10);
    for pair in composites.windows(2) {
        assert!(pair[1].starts_with(pair[0].as_str()), "accumulator rewrote history");
    }
    assert_eq!(composites[9].lines().count(), 10);
}

#[tokio::test]
async fn test_stalled_preview_does_not_block_build() {
    let mut config = test_config();
    config.builder.preview_timeout_ms = 50;
    let builder = HierarchicalBuilder::new(
        ScriptedRenderer::echo(),
        ScriptedAnalyzer::constant(reference()),
        ScriptedRefiner::constant(KICK),
        &config,
    )
    .with_preview(RecordingPreview::stalled(Duration::from_secs(30)));

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        builder.build_from_structure(&verse_chorus_verse(), None),
    )
    .await
    .expect("build stalled on the preview sink")
    .unwrap();

    assert_eq!(outcome.sections.len(), 3);
}

// ---------------------------------------------------------------------------
// Errors and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_invalid_structure_never_opens_renderer() {
    let renderer = ScriptedRenderer::echo();
    let builder = HierarchicalBuilder::new(
        renderer.clone(),
        ScriptedAnalyzer::constant(reference()),
        ScriptedRefiner::constant(KICK),
        &test_config(),
    );

    let err = builder
        .build_from_structure(&SongStructure { sections: vec![] }, None)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::InvalidStructure(_)));
    assert_eq!(renderer.opens(), 0);
}

#[tokio::test]
async fn test_cancelled_build_closes_renderer() {
    let renderer = ScriptedRenderer::echo();
    let refiner = ScriptedRefiner::constant(KICK);
    let cancel = CancellationSignal::new();
    cancel.cancel();
    let builder = HierarchicalBuilder::new(
        renderer.clone(),
        ScriptedAnalyzer::constant(reference()),
        refiner.clone(),
        &test_config(),
    )
    .with_cancellation(cancel);

    let err = builder
        .build_from_structure(&verse_chorus_verse(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Cancelled));
    assert_eq!(refiner.calls().await, 0);
    assert_eq!(renderer.opens(), 1);
    assert_eq!(renderer.closes(), 1);
}

#[tokio::test]
async fn test_refiner_outage_fails_build() {
    let renderer = ScriptedRenderer::echo();
    let builder = HierarchicalBuilder::new(
        renderer.clone(),
        ScriptedAnalyzer::constant(reference()),
        ScriptedRefiner::unavailable(),
        &test_config(),
    );

    let err = builder
        .build_from_structure(&verse_chorus_verse(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::CollaboratorUnavailable { .. }), "{err}");
    assert_eq!(renderer.closes(), 1);
}
