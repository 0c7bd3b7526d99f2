//! Reasoner response scanning.
//!
//! Replies are single lines. The adapter only relies on four conventions:
//! the `:error` marker, the `NIL` no-result token, the `T` truth token, and
//! `#name` quoting of identifiers inside otherwise opaque text.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Substring marking a failed request.
pub const ERROR_MARKER: &str = ":error";
/// Token for an empty result.
pub const NO_RESULT: &str = "NIL";
/// Token for a true predicate.
pub const TRUTH: &str = "T";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#([^|)]+)").unwrap());

fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter(|t| !t.is_empty())
}

pub fn is_error(line: &str) -> bool {
    line.contains(ERROR_MARKER)
}

/// Whether the line carries the `NIL` token (not merely the letters).
pub fn is_empty_result(line: &str) -> bool {
    tokens(line).any(|t| t == NO_RESULT)
}

/// Identifiers quoted in the line, in order; empty on error or `NIL`.
pub fn identifiers(line: &str) -> Vec<String> {
    if is_error(line) || is_empty_result(line) {
        return Vec::new();
    }
    IDENTIFIER
        .captures_iter(line)
        .map(|c| c[1].to_string())
        .collect()
}

/// Whether a predicate reply contains the `T` token.
pub fn is_true(line: &str) -> bool {
    !is_error(line) && tokens(line).any(|t| t == TRUTH)
}

/// Rebuild `(individual, concept)` pairs from an undifferentiated listing.
///
/// The listing interleaves individuals and concepts; every token that names a
/// known individual starts a new group, and the tokens after it (other than
/// repeats of that individual) are its concepts. This depends on the reasoner
/// emitting assertions grouped by individual.
pub fn regroup_concept_assertions(
    flat: &[String],
    individuals: &HashSet<String>,
) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut current: Option<&str> = None;
    for token in flat {
        if individuals.contains(token) {
            current = Some(token.as_str());
        } else if let Some(individual) = current {
            pairs.push((individual.to_string(), token.clone()));
        }
    }
    pairs
}
