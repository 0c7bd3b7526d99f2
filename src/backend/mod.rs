//! Backend capability contract and the uniform answer shape.
//!
//! Two variants implement [`Backend`]:
//!
//! - [`ReasonerAdapter`](reasoner::ReasonerAdapter): line protocol to a
//!   description-logic reasoner, one shared connection per process
//! - [`DocumentAdapter`](document::DocumentAdapter): subject documents in a
//!   [`DocumentStore`](crate::store::DocumentStore)
//!
//! The variant is chosen when the session is built; the session itself only
//! sees this trait.

pub mod document;
pub mod reasoner;

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::context::ContextTracker;
use crate::error::KbResult;
use crate::statement::Classified;

/// Result of an `ask`: a set of terms or a truth value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Terms(Vec<String>),
    Truth(bool),
}

impl Answer {
    /// Truth value; a term set is true when non-empty.
    pub fn truth(&self) -> bool {
        match self {
            Answer::Terms(terms) => !terms.is_empty(),
            Answer::Truth(b) => *b,
        }
    }

    /// Result terms; empty for truth values.
    pub fn terms(&self) -> &[String] {
        match self {
            Answer::Terms(terms) => terms,
            Answer::Truth(_) => &[],
        }
    }

    /// Boolean inversion used for `(not ...)` statements.
    pub fn negate(&self) -> Answer {
        Answer::Truth(!self.truth())
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Truth(true) => f.write_str("T"),
            Answer::Truth(false) => f.write_str("NIL"),
            Answer::Terms(terms) => write!(f, "({})", terms.join(" ")),
        }
    }
}

/// What a knowledge-base session needs from a backend.
///
/// Scoped operations (`ask`, `tell`, `dump`, `save`, `clone_scope`, `forget`)
/// assume the session has already made the backend's scope active.
pub trait Backend: Send {
    /// Identifier of the backend-side scope (abox or collection) this
    /// adapter is bound to, if any.
    fn scope(&self) -> Option<&str>;

    /// Tracker of the scope currently selected on the backend. Adapters
    /// sharing a connection return handles to the same state.
    fn context(&self) -> ContextTracker;

    /// Select `scope` on the backend.
    fn switch_context(&mut self, scope: &str) -> KbResult<()>;

    fn connect(&mut self) -> KbResult<()>;

    fn close(&mut self) -> KbResult<()>;

    /// Replace the scope's contents from `source`.
    fn load(&mut self, source: &Path) -> KbResult<()>;

    /// Write the scope's contents to `sink`, returning the backend's reply.
    fn save(&mut self, sink: &Path) -> KbResult<String>;

    fn ask(&mut self, statement: &Classified) -> KbResult<Answer>;

    /// Assert, or retract when `statement.negated`.
    fn tell(&mut self, statement: &Classified) -> KbResult<()>;

    /// Every fact in the scope, in canonical surface form.
    fn dump(&mut self) -> KbResult<BTreeSet<String>>;

    /// Duplicate the scope and return an adapter bound to the copy.
    fn clone_scope(&mut self) -> KbResult<Self>
    where
        Self: Sized;

    /// A fresh adapter bound to a new, empty scope.
    fn empty_scope(&mut self) -> KbResult<Self>
    where
        Self: Sized;

    /// Delete the scope on the backend.
    fn forget(&mut self) -> KbResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_truth_and_negation() {
        assert!(Answer::Terms(vec!["red".into()]).truth());
        assert!(!Answer::Terms(vec![]).truth());
        assert_eq!(Answer::Truth(true).negate(), Answer::Truth(false));
        assert_eq!(Answer::Terms(vec![]).negate(), Answer::Truth(true));
    }

    #[test]
    fn answer_display() {
        assert_eq!(Answer::Truth(true).to_string(), "T");
        assert_eq!(Answer::Truth(false).to_string(), "NIL");
        assert_eq!(
            Answer::Terms(vec!["red".into(), "blue".into()]).to_string(),
            "(red blue)"
        );
    }
}
