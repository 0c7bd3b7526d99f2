//! Per-session query result cache.
//!
//! Keys are the exact statement text: two textually distinct but equivalent
//! statements are cached separately. Any mutation clears the whole cache,
//! since a single fact can affect unboundedly many cached answers.

use std::collections::HashMap;

use crate::backend::Answer;

/// Statement text → last computed answer.
#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: HashMap<String, Answer>,
    hits: u64,
    misses: u64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached answer, counting the hit or miss.
    pub fn get(&mut self, statement: &str) -> Option<Answer> {
        match self.entries.get(statement) {
            Some(answer) => {
                self.hits += 1;
                Some(answer.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Record an answer and hand it back.
    pub fn store(&mut self, statement: &str, answer: Answer) -> Answer {
        self.entries.insert(statement.to_string(), answer.clone());
        answer
    }

    /// Drop every entry.
    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(entries = self.entries.len(), "query cache invalidated");
        }
        self.entries.clear();
    }

    pub fn contains(&self, statement: &str) -> bool {
        self.entries.contains_key(statement)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_get() {
        let mut cache = QueryCache::new();
        cache.store("(? has-color ball1)", Answer::Terms(vec!["red".into()]));
        assert_eq!(
            cache.get("(? has-color ball1)"),
            Some(Answer::Terms(vec!["red".into()]))
        );
        assert_eq!(cache.stats(), (1, 0));
    }

    #[test]
    fn keys_are_exact_text() {
        let mut cache = QueryCache::new();
        cache.store("(ball ball1)", Answer::Truth(true));
        assert!(cache.get("(ball  ball1)").is_none());
        assert_eq!(cache.stats(), (0, 1));
    }

    #[test]
    fn invalidate_clears_everything() {
        let mut cache = QueryCache::new();
        cache.store("a", Answer::Truth(true));
        cache.store("b", Answer::Truth(false));
        cache.invalidate();
        assert!(cache.is_empty());
        assert!(!cache.contains("a"));
    }

    #[test]
    fn clones_diverge() {
        let mut original = QueryCache::new();
        original.store("a", Answer::Truth(true));
        let mut copy = original.clone();
        copy.invalidate();
        assert_eq!(original.len(), 1);
        assert!(copy.is_empty());
    }
}
