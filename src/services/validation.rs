//! Cheap static checks on candidate pattern text.
//!
//! These run before a candidate ever reaches the renderer. They do not parse
//! the pattern language; they only catch the mistakes text generation makes
//! most often (empty output, stray fences, unbalanced brackets, unterminated
//! strings and constructs the renderer refuses to evaluate).

use std::fmt;

/// Constructs rejected before rendering.
pub const DEFAULT_BANNED_OPERATORS: &[&str] = &[
    "=>",
    "function",
    "eval(",
    "import ",
    "require(",
    "while (",
    "while(",
    "for (",
    "for(",
    "fetch(",
    "process.",
];

/// One problem found by [`scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternIssue {
    Empty,
    UnbalancedDelimiter {
        /// Closing delimiter that was expected, if any opener was pending
        expected: Option<char>,
        /// Delimiter actually found, `None` at end of input
        found: Option<char>,
        /// Byte offset of the offending character (or the input length)
        position: usize,
    },
    UnterminatedQuote {
        quote: char,
        position: usize,
    },
    BannedOperator(String),
}

impl fmt::Display for PatternIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "pattern is empty"),
            Self::UnbalancedDelimiter {
                expected,
                found,
                position,
            } => match (expected, found) {
                (Some(e), Some(c)) => {
                    write!(f, "unbalanced delimiter: expected '{e}' but found '{c}' at {position}")
                }
                (Some(e), None) => write!(f, "unbalanced delimiter: missing closing '{e}'"),
                (None, Some(c)) => write!(f, "unbalanced delimiter: unexpected '{c}' at {position}"),
                (None, None) => write!(f, "unbalanced delimiter at {position}"),
            },
            Self::UnterminatedQuote { quote, position } => {
                write!(f, "unterminated string: {quote} opened at {position} is never closed")
            }
            Self::BannedOperator(op) => write!(f, "banned construct '{}'", op.trim()),
        }
    }
}

/// Collect every issue in `candidate`.
///
/// Delimiters inside string literals and `//` line comments are ignored.
/// At most one delimiter issue is reported since the first mismatch makes the
/// rest of the nesting meaningless.
pub fn scan(candidate: &str, banned: &[&str]) -> Vec<PatternIssue> {
    let mut issues = Vec::new();
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        issues.push(PatternIssue::Empty);
        return issues;
    }

    if let Some(issue) = scan_structure(candidate) {
        issues.push(issue);
    }

    for op in banned {
        if candidate.contains(op) {
            issues.push(PatternIssue::BannedOperator((*op).to_string()));
        }
    }

    issues
}

/// First issue in `candidate`, using the default banned list.
pub fn validate(candidate: &str) -> Result<(), PatternIssue> {
    match scan(candidate, DEFAULT_BANNED_OPERATORS).into_iter().next() {
        Some(issue) => Err(issue),
        None => Ok(()),
    }
}

fn scan_structure(candidate: &str) -> Option<PatternIssue> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut quote: Option<(char, usize)> = None;
    let mut escaped = false;
    let mut chars = candidate.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        if let Some((open, _)) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' | '`' => quote = Some((ch, pos)),
            '/' if chars.peek().map(|(_, c)| *c) == Some('/') => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => stack.push((ch, pos)),
            ')' | ']' | '}' => match stack.pop() {
                Some((open, _)) if closer_for(open) == ch => {}
                Some((open, _)) => {
                    return Some(PatternIssue::UnbalancedDelimiter {
                        expected: Some(closer_for(open)),
                        found: Some(ch),
                        position: pos,
                    })
                }
                None => {
                    return Some(PatternIssue::UnbalancedDelimiter {
                        expected: None,
                        found: Some(ch),
                        position: pos,
                    })
                }
            },
            _ => {}
        }
    }

    if let Some((open, position)) = quote {
        return Some(PatternIssue::UnterminatedQuote {
            quote: open,
            position,
        });
    }

    stack
        .pop()
        .map(|(open, _)| PatternIssue::UnbalancedDelimiter {
            expected: Some(closer_for(open)),
            found: None,
            position: candidate.len(),
        })
}

const fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Turn raw text-generation output into a bare candidate.
///
/// Strips a surrounding markdown code fence (with or without a language tag)
/// and surrounding whitespace.
pub fn sanitize_candidate(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    tracing::debug!(input_length = trimmed.len(), "Stripping markdown fence from candidate");

    let body_start = trimmed.find('\n').map_or(3, |pos| pos + 1);
    let body = &trimmed[body_start..];
    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}
