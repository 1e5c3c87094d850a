//! Joining fragments into measures, sections and the final arrangement.

use std::collections::HashMap;

use crate::domain::errors::{DomainError, DomainResult};

use super::fallback::tempo_line;

/// Upper bound on how often the section sequence may be repeated.
pub const MAX_REPEATS: usize = 64;

/// Combine the accepted layer fragments of one measure.
pub fn measure_pattern(fragments: &[String]) -> Option<String> {
    match fragments {
        [] => None,
        [single] => Some(single.clone()),
        many => Some(format!("stack(\n  {}\n)", many.join(",\n  "))),
    }
}

/// Sequence the measure patterns of one section.
pub fn section_pattern(measures: &[String]) -> Option<String> {
    match measures {
        [] => None,
        [single] => Some(single.clone()),
        many => Some(format!("cat(\n  {}\n)", many.join(",\n  "))),
    }
}

/// One section ready for assembly.
#[derive(Debug, Clone, Copy)]
pub struct SectionPart<'a> {
    pub pattern: &'a str,
    /// Seconds
    pub duration: f64,
}

/// Build the final composition.
///
/// Byte-identical section patterns are defined once as `section_<n>` and
/// referenced wherever they occur. Sections keep their original order. When
/// `min_total_duration` exceeds the summed section durations the whole
/// sequence is repeated until it is reached, at most [`MAX_REPEATS`] times.
pub fn assemble(
    tempo: f64,
    sections: &[SectionPart<'_>],
    min_total_duration: Option<f64>,
) -> DomainResult<String> {
    let mut definitions: Vec<&str> = Vec::new();
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    let mut sequence: Vec<usize> = Vec::with_capacity(sections.len());

    for part in sections {
        let idx = *index_of.entry(part.pattern).or_insert_with(|| {
            definitions.push(part.pattern);
            definitions.len() - 1
        });
        sequence.push(idx);
    }

    let repeats = repeat_count(
        sections.iter().map(|s| s.duration).sum(),
        min_total_duration,
    )?;

    let mut out = tempo_line(tempo);
    out.push('\n');
    for (idx, definition) in definitions.iter().enumerate() {
        out.push_str(&format!("let section_{idx} = {definition}\n"));
    }

    let references: Vec<String> = sequence
        .iter()
        .map(|idx| format!("section_{idx}"))
        .collect();
    let once = references.join(", ");
    let full = vec![once; repeats].join(", ");
    out.push_str(&format!("cat({full})"));
    Ok(out)
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn repeat_count(total: f64, min_total: Option<f64>) -> DomainResult<usize> {
    let Some(min) = min_total else {
        return Ok(1);
    };
    if !(total > 0.0) || min <= total {
        return Ok(1);
    }

    let needed = (min / total).ceil();
    if !needed.is_finite() || needed > MAX_REPEATS as f64 {
        return Err(DomainError::InvalidConfiguration(format!(
            "reaching {min}s from {total}s of sections needs more than {MAX_REPEATS} repeats"
        )));
    }
    Ok(needed as usize)
}
