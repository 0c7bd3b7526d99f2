//! Rich diagnostic error types for lingua-kb.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly what went wrong
//! and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for lingua-kb.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum KbError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Statement(#[from] StatementError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reasoner(#[from] ReasonerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl KbError {
    /// Whether the error leaves backend context state ambiguous.
    ///
    /// Callers must stop issuing requests after a fatal error; the CLI exits.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KbError::Reasoner(ReasonerError::CloneFailed { .. }))
    }
}

// ---------------------------------------------------------------------------
// Statement errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StatementError {
    #[error("empty statement")]
    #[diagnostic(
        code(lingua::statement::empty),
        help("A statement needs at least one term, e.g. `(red has-color ball1)`.")
    )]
    Empty,

    #[error("unbalanced statement: `(` at byte {offset} is never closed")]
    #[diagnostic(
        code(lingua::statement::unbalanced),
        help("Every `(` needs a matching `)`. Check nested groups such as `(not (...))`.")
    )]
    Unbalanced { offset: usize },

    #[error("unexpected `)` at byte {offset}")]
    #[diagnostic(
        code(lingua::statement::unexpected_close),
        help("This `)` has no matching `(`. Remove it or add the missing opening paren.")
    )]
    UnexpectedClose { offset: usize },

    #[error("statement has {count} terms, expected 2 or 3")]
    #[diagnostic(
        code(lingua::statement::arity),
        help(
            "Use `(value attribute)` for type facts or `(value relation subject)` \
             for relation facts. `?` marks the unknown position in a query."
        )
    )]
    Arity { count: usize },

    #[error("statement contains disallowed token {token:?}")]
    #[diagnostic(
        code(lingua::statement::disallowed),
        help(
            "The token is reserved by the reasoner protocol and could smuggle extra \
             commands into the shared connection. Rename the term."
        )
    )]
    Disallowed { token: String },

    #[error("statement `{statement}` cannot be told: wildcards are only valid in queries")]
    #[diagnostic(
        code(lingua::statement::wildcard_in_tell),
        help("Replace `?` with a concrete term before asserting or retracting a fact.")
    )]
    WildcardInTell { statement: String },
}

// ---------------------------------------------------------------------------
// Reasoner errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReasonerError {
    #[error("reasoner I/O error: {source}")]
    #[diagnostic(
        code(lingua::reasoner::io),
        help(
            "The line connection to the reasoner failed. Check that the reasoner \
             process is running and listening on the configured host and port."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("reasoner connection is not open")]
    #[diagnostic(
        code(lingua::reasoner::not_connected),
        help("Call `connect()` on the session before issuing requests.")
    )]
    NotConnected,

    #[error("session has no abox: load an ontology or clone an existing session first")]
    #[diagnostic(
        code(lingua::reasoner::no_scope),
        help("Scoped requests need an abox id. Use `load()`, `clone()` or `empty()`.")
    )]
    NoScope,

    #[error("reasoner rejected {request}: {reply}")]
    #[diagnostic(
        code(lingua::reasoner::protocol),
        help(
            "The reasoner answered with its error marker. Check the file path or \
             abox name in the request."
        )
    )]
    Protocol { request: String, reply: String },

    #[error("cloning abox {abox} failed: {last_answer}")]
    #[diagnostic(
        code(lingua::reasoner::clone_failed),
        severity(Error),
        help(
            "A failed clone leaves the reasoner's context state ambiguous. This is \
             fatal: restart the reasoner and reload the ontology."
        )
    )]
    CloneFailed { abox: String, last_answer: String },
}

impl From<std::io::Error> for ReasonerError {
    fn from(source: std::io::Error) -> Self {
        ReasonerError::Io { source }
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(lingua::store::io),
        help(
            "A filesystem operation failed. Check that the path exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(lingua::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             Try again with a fresh database file if the problem persists."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(lingua::store::serde),
        help(
            "Failed to serialize or deserialize a document. The stored format may \
             have changed between versions."
        )
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(lingua::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {message}")]
    #[diagnostic(
        code(lingua::config::parse),
        help("The file must be valid TOML with `[reasoner]` and `[document]` tables.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config file: {path}")]
    #[diagnostic(
        code(lingua::config::write),
        help("Check that the parent directory is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning lingua-kb results.
pub type KbResult<T> = std::result::Result<T, KbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_error_converts_to_kb_error() {
        let err = StatementError::Arity { count: 4 };
        let kb: KbError = err.into();
        assert!(matches!(kb, KbError::Statement(StatementError::Arity { count: 4 })));
    }

    #[test]
    fn io_error_converts_to_reasoner_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: ReasonerError = io.into();
        assert!(matches!(err, ReasonerError::Io { .. }));
    }

    #[test]
    fn only_clone_failure_is_fatal() {
        let fatal: KbError = ReasonerError::CloneFailed {
            abox: "a1".into(),
            last_answer: ":error".into(),
        }
        .into();
        assert!(fatal.is_fatal());

        let benign: KbError = ReasonerError::NotConnected.into();
        assert!(!benign.is_fatal());
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = StatementError::Unbalanced { offset: 7 };
        let msg = format!("{err}");
        assert!(msg.contains("byte 7"));
    }
}
