//! Render failure classification.
//!
//! Turns a failed render (an exception message, an error status or a silent
//! output) into probable causes with fix suggestions. The output is written
//! into corrective prompts, so every cause is phrased for the refiner.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::validation::{scan, PatternIssue, DEFAULT_BANNED_OPERATORS};

static UNKNOWN_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:ReferenceError:\s*)?([A-Za-z_$][\w$]*) is not defined").expect("valid regex")
});

static NOT_A_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\w$.]+) is not a function").expect("valid regex")
});

static ZERO_GAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(?:gain|velocity)\(\s*0(?:\.0+)?\s*\)").expect("valid regex")
});

/// How a render failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The renderer raised while evaluating the candidate
    Exception,
    /// Render completed but produced silence
    Silent,
    /// Renderer reported `status: error`
    ErrorStatus,
    /// Render ran past its time budget
    Timeout,
}

/// A failed render, as seen by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RenderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn silent() -> Self {
        Self::new(FailureKind::Silent, "render produced silent output")
    }
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseCategory {
    Syntax,
    Quoting,
    BannedOperator,
    UnknownIdentifier,
    Silence,
    Timeout,
    Unknown,
}

/// One probable cause with a suggested fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbableCause {
    pub category: CauseCategory,
    pub description: String,
    pub suggestion: String,
}

impl ProbableCause {
    fn new(
        category: CauseCategory,
        description: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            category,
            description: description.into(),
            suggestion: suggestion.into(),
        }
    }
}

/// Classifier result. Never empty: when no heuristic matches a generic cause
/// carrying the raw message is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub causes: Vec<ProbableCause>,
}

impl Diagnosis {
    pub fn has_category(&self, category: CauseCategory) -> bool {
        self.causes.iter().any(|c| c.category == category)
    }

    /// Bullet list used inside corrective prompts.
    pub fn to_prompt_lines(&self) -> String {
        self.causes
            .iter()
            .map(|c| format!("- {} Fix: {}", c.description, c.suggestion))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Classify `failure` for `candidate`.
pub fn classify(failure: &RenderFailure, candidate: &str) -> Diagnosis {
    let mut causes: Vec<ProbableCause> = scan(candidate, DEFAULT_BANNED_OPERATORS)
        .iter()
        .map(cause_from_issue)
        .collect();

    if let Some(caps) = UNKNOWN_IDENTIFIER.captures(&failure.message) {
        let name = &caps[1];
        causes.push(ProbableCause::new(
            CauseCategory::UnknownIdentifier,
            format!("'{name}' is not a known function or variable."),
            format!("Replace '{name}' with a built-in pattern function or remove it."),
        ));
    } else if let Some(caps) = NOT_A_FUNCTION.captures(&failure.message) {
        let name = &caps[1];
        causes.push(ProbableCause::new(
            CauseCategory::UnknownIdentifier,
            format!("'{name}' was called but is not a function."),
            "Check the method name and that it is chained on a pattern.",
        ));
    }

    let lowered = failure.message.to_lowercase();
    if failure.kind == FailureKind::Exception
        && (lowered.contains("syntaxerror") || lowered.contains("unexpected token"))
        && !causes.iter().any(|c| c.category == CauseCategory::Syntax)
    {
        causes.push(ProbableCause::new(
            CauseCategory::Syntax,
            format!("The renderer could not parse the pattern ({}).", failure.message),
            "Check commas between arguments and close every bracket and string.",
        ));
    }

    match failure.kind {
        FailureKind::Silent => causes.extend(silence_causes(candidate)),
        FailureKind::Timeout => causes.push(ProbableCause::new(
            CauseCategory::Timeout,
            "Rendering did not finish within the time budget.",
            "Simplify the pattern: fewer stacked layers and lower event density.",
        )),
        FailureKind::Exception | FailureKind::ErrorStatus => {}
    }

    if causes.is_empty() {
        causes.push(ProbableCause::new(
            CauseCategory::Unknown,
            format!("Render failed: {}", failure.message),
            "Rewrite the pattern using only basic sound, note and stack functions.",
        ));
    }

    Diagnosis { causes }
}

fn cause_from_issue(issue: &PatternIssue) -> ProbableCause {
    match issue {
        PatternIssue::Empty => ProbableCause::new(
            CauseCategory::Syntax,
            "The pattern is empty.",
            "Return a complete pattern expression.",
        ),
        PatternIssue::UnbalancedDelimiter { .. } => ProbableCause::new(
            CauseCategory::Syntax,
            format!("Brackets do not balance: {issue}."),
            "Close every '(', '[' and '{' in the reverse order it was opened.",
        ),
        PatternIssue::UnterminatedQuote { quote, .. } => ProbableCause::new(
            CauseCategory::Quoting,
            format!("A string opened with {quote} is never closed."),
            "Wrap every mini-notation string in matching double quotes.",
        ),
        PatternIssue::BannedOperator(op) => ProbableCause::new(
            CauseCategory::BannedOperator,
            format!("The construct '{}' is not allowed.", op.trim()),
            "Use only chained pattern methods; no functions, loops, imports or arrows.",
        ),
    }
}

fn silence_causes(candidate: &str) -> Vec<ProbableCause> {
    let mut causes = Vec::new();

    if ZERO_GAIN.is_match(candidate) {
        causes.push(ProbableCause::new(
            CauseCategory::Silence,
            "A gain or velocity of 0 mutes the output.",
            "Use a gain between 0.5 and 1.0.",
        ));
    }

    if only_rests(candidate) {
        causes.push(ProbableCause::new(
            CauseCategory::Silence,
            "Every mini-notation string contains only rests.",
            "Add at least one sounding event such as \"bd\" or \"c3\".",
        ));
    }

    if !candidate.contains("s(") && !candidate.contains("sound(") && !candidate.contains("note(") {
        causes.push(ProbableCause::new(
            CauseCategory::Silence,
            "No sound source is selected.",
            "Start each layer with s(\"...\"), sound(\"...\") or note(\"...\").",
        ));
    }

    if causes.is_empty() {
        causes.push(ProbableCause::new(
            CauseCategory::Silence,
            "The pattern rendered but produced no audible output.",
            "Make sure at least one layer plays within the first cycle and is not filtered out.",
        ));
    }

    causes
}

fn only_rests(candidate: &str) -> bool {
    let strings: Vec<&str> = candidate.split('"').skip(1).step_by(2).collect();
    !strings.is_empty()
        && strings.iter().all(|s| {
            s.split(|c: char| c.is_whitespace() || "[]<>*,".contains(c))
                .filter(|tok| !tok.is_empty())
                .all(|tok| tok == "~" || tok == "-" || tok.chars().all(|c| c.is_ascii_digit()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_identifier_extracted() {
        let failure = RenderFailure::new(
            FailureKind::Exception,
            "ReferenceError: wobble is not defined",
        );
        let diagnosis = classify(&failure, "wobble(s(\"bd\"))");
        assert!(diagnosis.has_category(CauseCategory::UnknownIdentifier));
        assert!(diagnosis.causes[0].description.contains("wobble"));
    }

    #[test]
    fn test_static_issues_become_causes() {
        let failure = RenderFailure::new(FailureKind::Exception, "SyntaxError: missing )");
        let diagnosis = classify(&failure, "stack(s(\"bd\")");
        assert!(diagnosis.has_category(CauseCategory::Syntax));
        // the static bracket cause replaces the generic syntax one
        assert_eq!(
            diagnosis
                .causes
                .iter()
                .filter(|c| c.category == CauseCategory::Syntax)
                .count(),
            1
        );
    }

    #[test]
    fn test_silence_with_zero_gain() {
        let diagnosis = classify(&RenderFailure::silent(), "s(\"bd*4\").gain(0)");
        assert_eq!(diagnosis.causes.len(), 1);
        assert!(diagnosis.causes[0].description.contains("gain"));
    }

    #[test]
    fn test_silence_with_only_rests() {
        let diagnosis = classify(&RenderFailure::silent(), "s(\"~ ~ [~ ~]\")");
        assert!(diagnosis
            .causes
            .iter()
            .any(|c| c.description.contains("rests")));
    }

    #[test]
    fn test_silence_generic_cause() {
        let diagnosis = classify(&RenderFailure::silent(), "note(\"c3 e3\").lpf(20)");
        assert!(diagnosis.has_category(CauseCategory::Silence));
        assert!(!diagnosis.causes.is_empty());
    }

    #[test]
    fn test_unmatched_error_gets_generic_cause() {
        let failure = RenderFailure::new(FailureKind::ErrorStatus, "audio context closed");
        let diagnosis = classify(&failure, "s(\"bd\")");
        assert_eq!(diagnosis.causes.len(), 1);
        assert_eq!(diagnosis.causes[0].category, CauseCategory::Unknown);
        assert!(diagnosis.to_prompt_lines().starts_with("- Render failed"));
    }
}
