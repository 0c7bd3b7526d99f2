//! The knowledge-base session: statement text in, answers out.
//!
//! [`KnowledgeBase`] owns one backend adapter and a private [`QueryCache`].
//! Before every scoped backend call it compares the backend's active scope
//! with its own and switches only when they differ.
//!
//! Sessions sharing a reasoner connection share its active-abox tracker but
//! nothing serializes them: callers that drive several sessions from several
//! threads must serialize access themselves.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::backend::document::DocumentAdapter;
use crate::backend::reasoner::ReasonerAdapter;
use crate::backend::{Answer, Backend};
use crate::cache::QueryCache;
use crate::config::KbConfig;
use crate::error::{KbResult, StatementError};
use crate::registry::ConnectionRegistry;
use crate::statement::{self, classify};
use crate::store::DocumentStore;

/// A logical knowledge base bound to one backend scope.
#[derive(Debug)]
pub struct KnowledgeBase<B: Backend> {
    backend: B,
    cache: QueryCache,
    reserved: Vec<String>,
}

impl<B: Backend> KnowledgeBase<B> {
    /// A session over `backend`, rejecting the default reserved tokens.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: QueryCache::new(),
            reserved: KbConfig::default().reserved_tokens,
        }
    }

    pub fn with_reserved_tokens(mut self, tokens: Vec<String>) -> Self {
        self.reserved = tokens;
        self
    }

    fn sibling(&self, backend: B, cache: QueryCache) -> Self {
        Self {
            backend,
            cache,
            reserved: self.reserved.clone(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The backend scope (abox or collection) this session is bound to.
    pub fn id(&self) -> Option<&str> {
        self.backend.scope()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Select this session's scope on the backend unless it already is.
    ///
    /// Returns whether a switch request was issued.
    pub fn ensure_context(&mut self) -> KbResult<bool> {
        let Some(scope) = self.backend.scope().map(str::to_string) else {
            return Ok(false);
        };
        let tracker = self.backend.context();
        let backend = &mut self.backend;
        tracker.ensure(&scope, |s| backend.switch_context(s))
    }

    pub fn connect(&mut self) -> KbResult<()> {
        self.backend.connect()
    }

    pub fn close(&mut self) -> KbResult<()> {
        self.backend.close()
    }

    /// Replace the scope's contents from `source`.
    pub fn load(&mut self, source: &Path) -> KbResult<()> {
        self.cache.invalidate();
        self.backend.load(source)
    }

    pub fn save(&mut self, sink: &Path) -> KbResult<String> {
        self.ensure_context()?;
        self.backend.save(sink)
    }

    /// Answer a statement, from the cache when possible.
    ///
    /// `(not S)` is answered as the inversion of `S`.
    pub fn ask(&mut self, text: &str) -> KbResult<Answer> {
        statement::screen(text, &self.reserved)?;
        if let Some(hit) = self.cache.get(text) {
            return Ok(hit);
        }

        if statement::is_negative(text) {
            let inner = statement::negate(text)?;
            let answer = self.ask(&inner)?.negate();
            return Ok(self.cache.store(text, answer));
        }

        let classified = classify(text)?;
        self.ensure_context()?;
        let answer = self.backend.ask(&classified)?;
        Ok(self.cache.store(text, answer))
    }

    /// Assert a fact, or retract it when wrapped in `(not ...)`.
    ///
    /// The cache is emptied before the backend is touched, so a failed
    /// mutation never leaves answers computed before it.
    pub fn tell(&mut self, text: &str) -> KbResult<()> {
        statement::screen(text, &self.reserved)?;
        let classified = classify(text)?;
        if classified.is_query() {
            return Err(StatementError::WildcardInTell {
                statement: text.trim().to_string(),
            }
            .into());
        }
        self.cache.invalidate();
        self.ensure_context()?;
        self.backend.tell(&classified)
    }

    /// Duplicate the scope. The copy starts with this session's cached answers.
    #[allow(clippy::should_implement_trait)]
    pub fn clone(&mut self) -> KbResult<Self> {
        self.ensure_context()?;
        let backend = self.backend.clone_scope()?;
        Ok(self.sibling(backend, self.cache.clone()))
    }

    /// A session on a new, empty scope of the same backend.
    pub fn empty(&mut self) -> KbResult<Self> {
        let backend = self.backend.empty_scope()?;
        Ok(self.sibling(backend, QueryCache::new()))
    }

    /// Delete the scope on the backend.
    pub fn forget(&mut self) -> KbResult<()> {
        self.cache.invalidate();
        self.ensure_context()?;
        self.backend.forget()
    }

    /// Every fact in the scope, in canonical surface form.
    pub fn dump(&mut self) -> KbResult<BTreeSet<String>> {
        self.ensure_context()?;
        self.backend.dump()
    }

    /// Facts present here but not in `other`.
    pub fn diff(&mut self, other: &mut Self) -> KbResult<BTreeSet<String>> {
        let ours = self.dump()?;
        let theirs = other.dump()?;
        Ok(ours.difference(&theirs).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Reasoner sessions
// ---------------------------------------------------------------------------

impl KnowledgeBase<ReasonerAdapter> {
    /// A session on the shared connection for `config.reasoner`, taken from
    /// `registry`.
    pub fn reasoner(registry: &ConnectionRegistry, config: &KbConfig) -> Self {
        let connection =
            registry.get_or_create(&config.reasoner.address(), config.reasoner.timeout());
        Self::new(ReasonerAdapter::new(connection, config.reasoner.clone()))
            .with_reserved_tokens(config.reserved_tokens.clone())
    }

    /// Bind the session to an abox that already exists on the reasoner.
    pub fn with_abox(self, abox: impl Into<String>) -> Self {
        Self {
            backend: self.backend.with_abox(abox),
            ..self
        }
    }

    /// Inverse of `role`, if declared.
    pub fn inverse(&mut self, role: &str) -> KbResult<Option<String>> {
        statement::screen(role, &self.reserved)?;
        self.backend.inverse(role)
    }

    pub fn namespace_uri(&self) -> KbResult<Option<String>> {
        self.backend.namespace_uri()
    }
}

// ---------------------------------------------------------------------------
// Document-store sessions
// ---------------------------------------------------------------------------

impl KnowledgeBase<DocumentAdapter> {
    /// A session on `config.document.collection` of `store`.
    pub fn document(store: Arc<dyn DocumentStore>, config: &KbConfig) -> Self {
        Self::new(DocumentAdapter::new(store, config.document.collection.clone()))
            .with_reserved_tokens(config.reserved_tokens.clone())
    }

    /// Insert or replace a type node.
    pub fn add_type(&mut self, typename: &str, parent: Option<&str>) -> KbResult<()> {
        self.cache.invalidate();
        self.backend.add_type(typename, parent)
    }

    /// Remove a type together with all of its descendants.
    pub fn remove_type(&mut self, typename: &str) -> KbResult<usize> {
        self.cache.invalidate();
        self.backend.remove_type(typename)
    }

    pub fn get_parent_types(&self, typename: &str) -> KbResult<Vec<String>> {
        self.backend.get_parent_types(typename)
    }

    pub fn get_child_types(&self, typename: &str) -> KbResult<Vec<String>> {
        self.backend.get_child_types(typename)
    }
}
