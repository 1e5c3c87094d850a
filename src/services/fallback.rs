//! Known-good fallback patterns.
//!
//! Used when generation keeps failing: the recovery loop substitutes a full
//! song fallback, the hierarchical builder a per-layer fragment. Both are
//! deterministic given tempo and key and pass [`validate`](super::validation::validate).

use crate::domain::models::{LayerType, MusicalKey};

const DEFAULT_TEMPO: f64 = 120.0;

/// Cycles per second for `tempo` BPM, assuming four beats per cycle.
///
/// Non-finite or non-positive tempos fall back to 120 BPM.
pub fn cycles_per_second(tempo: f64) -> f64 {
    let tempo = if tempo.is_finite() && tempo > 0.0 {
        tempo
    } else {
        DEFAULT_TEMPO
    };
    tempo / 60.0 / 4.0
}

/// `setcps(...)` line for `tempo`.
pub fn tempo_line(tempo: f64) -> String {
    format!("setcps({:.4})", cycles_per_second(tempo))
}

fn scale_name(key: &MusicalKey, octave: u8) -> String {
    format!("{}{}:{}", key.scale_root(), octave, key.mode())
}

/// Complete pattern playing a plain groove in `key` at `tempo`.
pub fn fallback_pattern(tempo: f64, key: &MusicalKey) -> String {
    format!("{}\n{}", tempo_line(tempo), fallback_section(key))
}

/// Tempo-less groove usable as one section of a larger arrangement.
pub fn fallback_section(key: &MusicalKey) -> String {
    format!(
        "stack(\n  {},\n  {},\n  {}\n)",
        fallback_fragment(LayerType::Drums, key),
        fallback_fragment(LayerType::Bass, key),
        fallback_fragment(LayerType::Melody, key),
    )
}

/// Single-layer fragment for `layer_type` in `key`.
pub fn fallback_fragment(layer_type: LayerType, key: &MusicalKey) -> String {
    match layer_type {
        LayerType::Drums => r#"s("bd*4, ~ sd ~ sd, hh*8").gain(0.8)"#.to_string(),
        LayerType::Bass => format!(
            r#"n("0 ~ 0 4").scale("{}").s("sawtooth").lpf(600).gain(0.7)"#,
            scale_name(key, 2)
        ),
        LayerType::Harmony => format!(
            r#"n("<[0,2,4] [3,5,7]>").scale("{}").s("triangle").gain(0.4)"#,
            scale_name(key, 3)
        ),
        LayerType::Melody => format!(
            r#"n("0 2 4 2").scale("{}").s("sine").gain(0.5)"#,
            scale_name(key, 4)
        ),
        LayerType::Fx => r#"s("~ ~ ~ crash").room(0.6).gain(0.3)"#.to_string(),
    }
}
