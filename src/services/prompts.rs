//! Prompt construction for the refiner.
//!
//! The core owns every conversation it sends: numeric diffs for refinement,
//! the full error history for recovery, and earlier layers for the builder.

use std::fmt::Write as _;

use crate::domain::models::{Comparison, ErrorAttempt, FeatureVector, Layer, Measure, Section};
use crate::domain::ports::{ChatMessage, Role};

use super::error_classifier::Diagnosis;
use super::validation::PatternIssue;

const SYSTEM_PROMPT: &str = "You write live-coding music patterns. \
Answer with a single pattern expression and nothing else: no prose, no markdown. \
Use sound sources such as s(\"bd sd\"), note(\"c3 e3\") or n(\"0 2 4\").scale(\"c3:major\"), \
combine layers with stack(...), sequence with cat(...), and chain effects as methods. \
Never define functions, arrows, loops or imports.";

const LAYER_SYSTEM_PROMPT: &str = "You write one instrument layer of a live-coding music \
pattern at a time. Answer with a single chained pattern expression for that layer only, \
without stack(...) around it and without prose or markdown. \
Never define functions, arrows, loops or imports.";

fn fenced(candidate: &str) -> String {
    format!("```\n{candidate}\n```")
}

/// Conversation asking for an improved candidate given the measured diffs.
pub fn refinement_conversation(
    candidate: &str,
    reference: &FeatureVector,
    rendered: &FeatureVector,
    comparison: &Comparison,
) -> Vec<ChatMessage> {
    let mut body = String::new();
    let _ = writeln!(body, "Current pattern:\n{}\n", fenced(candidate));
    let _ = writeln!(
        body,
        "Its rendering scored {:.1}/100 against the reference song:",
        comparison.score
    );
    let _ = writeln!(
        body,
        "- tempo: reference {:.1} BPM, pattern {:.1} BPM (off by {:.1})",
        reference.tempo, rendered.tempo, comparison.tempo_diff
    );
    let _ = writeln!(
        body,
        "- key: reference {}, pattern {} ({})",
        reference.key,
        rendered.key,
        if comparison.key_match { "match" } else { "mismatch" }
    );
    let _ = writeln!(
        body,
        "- energy: reference {:.2}, pattern {:.2} (off by {:.2})",
        reference.energy, rendered.energy, comparison.energy_diff
    );
    let _ = writeln!(
        body,
        "- brightness: reference {:.2}, pattern {:.2} (off by {:.2})",
        reference.brightness, rendered.brightness, comparison.brightness_diff
    );
    let _ = writeln!(
        body,
        "- kick placement similarity: {:.0}%",
        comparison.kick_similarity * 100.0
    );
    let _ = writeln!(
        body,
        "- snare placement similarity: {:.0}%",
        comparison.snare_similarity * 100.0
    );
    if !reference.kick_positions.is_empty() {
        let _ = writeln!(
            body,
            "Reference kick positions (beats): {}",
            format_positions(&reference.kick_positions)
        );
    }
    if !reference.snare_positions.is_empty() {
        let _ = writeln!(
            body,
            "Reference snare positions (beats): {}",
            format_positions(&reference.snare_positions)
        );
    }
    body.push_str("\nEdit the pattern to reduce these differences. Return only the new pattern.");

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(body)]
}

/// Conversation asking for a fix after one or more failed renders.
///
/// Every earlier attempt is replayed as an assistant turn followed by its
/// error, so the refiner can see each failed variant and why it failed.
pub fn corrective_conversation(attempts: &[ErrorAttempt], diagnosis: &Diagnosis) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];

    for (idx, attempt) in attempts.iter().enumerate() {
        if idx == 0 {
            messages.push(ChatMessage::user(format!(
                "This pattern failed to render:\n{}\nError: {}",
                fenced(&attempt.candidate),
                attempt.error
            )));
        } else {
            messages.push(ChatMessage::assistant(attempt.candidate.clone()));
            messages.push(ChatMessage::user(format!(
                "That pattern also failed. Error: {}",
                attempt.error
            )));
        }
    }

    let closing = format!(
        "\n\nProbable causes:\n{}\n\nDo not repeat any earlier failed pattern. \
         Return only the corrected pattern.",
        diagnosis.to_prompt_lines()
    );
    match messages.last_mut() {
        Some(last) if last.role == Role::User => {
            last.content.push_str(&closing);
        }
        _ => messages.push(ChatMessage::user(closing.trim_start().to_string())),
    }

    messages
}

/// Context for generating a single layer fragment.
#[derive(Debug, Clone, Copy)]
pub struct LayerContext<'a> {
    pub section: &'a Section,
    pub measure: &'a Measure,
    pub layer: &'a Layer,
    /// Fragments already accepted for earlier layers of this measure
    pub accepted: &'a [(String, String)],
    pub reference: Option<&'a FeatureVector>,
}

/// Conversation asking for one layer fragment.
///
/// Carried-over errors for this layer are replayed the same way as in
/// [`corrective_conversation`].
pub fn layer_conversation(context: &LayerContext<'_>, errors: &[ErrorAttempt]) -> Vec<ChatMessage> {
    let LayerContext {
        section,
        measure,
        layer,
        accepted,
        reference,
    } = *context;

    let mut body = String::new();
    let _ = writeln!(
        body,
        "Section {} ({}), energy {:.2}, {} bars, {:.1}s. Measure {}.",
        section.index,
        section.section_type,
        section.energy,
        section.bars,
        section.duration,
        measure.index
    );
    if let Some(reference) = reference {
        let _ = writeln!(
            body,
            "The song is at {:.1} BPM in {}.",
            reference.tempo, reference.key
        );
    }
    let _ = writeln!(
        body,
        "Write the {} layer '{}' ({}).",
        layer.layer_type, layer.name, layer.id
    );
    if accepted.is_empty() {
        body.push_str("It is the first layer of this measure.\n");
    } else {
        body.push_str("It must complement the layers already written for this measure:\n");
        for (layer_id, fragment) in accepted {
            let _ = writeln!(body, "- {layer_id}: {fragment}");
        }
    }
    body.push_str("Return only the layer expression.");

    let mut messages = vec![
        ChatMessage::system(LAYER_SYSTEM_PROMPT),
        ChatMessage::user(body),
    ];
    for attempt in errors {
        messages.push(ChatMessage::assistant(attempt.candidate.clone()));
        messages.push(ChatMessage::user(format!(
            "That layer was rejected: {}. Return a corrected layer expression only.",
            attempt.error
        )));
    }
    messages
}

/// Extend `conversation` after the refiner returned a candidate that failed
/// the static check.
pub fn validation_retry(
    mut conversation: Vec<ChatMessage>,
    candidate: &str,
    issue: &PatternIssue,
) -> Vec<ChatMessage> {
    conversation.push(ChatMessage::assistant(candidate.to_string()));
    conversation.push(ChatMessage::user(format!(
        "That pattern is invalid: {issue}. Return a corrected pattern only."
    )));
    conversation
}

fn format_positions(positions: &[f64]) -> String {
    positions
        .iter()
        .map(|p| format!("{p:.2}"))
        .collect::<Vec<_>>()
        .join(", ")
}
