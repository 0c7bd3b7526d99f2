//! Active-context tracking.
//!
//! A reasoner connection serves many logical sessions but has exactly one
//! current abox. [`ContextTracker`] is a shared handle to the identifier of
//! that abox so sessions can skip the switch request when it is already
//! selected.
//!
//! Sessions sharing a tracker must be driven from one thread at a time;
//! interleaving two sessions without external serialization can leave the
//! tracker out of step with the backend.

use std::sync::{Arc, Mutex};

/// Shared, cloneable handle to the currently selected backend scope.
#[derive(Debug, Clone, Default)]
pub struct ContextTracker {
    active: Arc<Mutex<Option<String>>>,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The scope believed to be selected on the backend.
    pub fn active(&self) -> Option<String> {
        self.active.lock().expect("context lock poisoned").clone()
    }

    pub fn is_active(&self, scope: &str) -> bool {
        self.active.lock().expect("context lock poisoned").as_deref() == Some(scope)
    }

    /// Record `scope` as selected.
    pub fn set(&self, scope: &str) {
        *self.active.lock().expect("context lock poisoned") = Some(scope.to_string());
    }

    /// Forget the selection, forcing the next scoped request to switch.
    pub fn clear(&self) {
        *self.active.lock().expect("context lock poisoned") = None;
    }

    /// Compare-and-switch: run `switch` only if `scope` is not already active.
    ///
    /// The tracker is updated *before* `switch` runs, so a failed switch
    /// leaves it pointing at the attempted target. Returns whether a switch
    /// was issued.
    pub fn ensure<E>(
        &self,
        scope: &str,
        switch: impl FnOnce(&str) -> Result<(), E>,
    ) -> Result<bool, E> {
        if self.is_active(scope) {
            return Ok(false);
        }
        let previous = self.active();
        self.set(scope);
        tracing::debug!(from = ?previous, to = scope, "switching active context");
        switch(scope)?;
        Ok(true)
    }

    /// Whether two handles observe the same state.
    pub fn shares_state_with(&self, other: &ContextTracker) -> bool {
        Arc::ptr_eq(&self.active, &other.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_switches_once() {
        let tracker = ContextTracker::new();
        let mut switches = 0;
        for _ in 0..3 {
            tracker
                .ensure("abox-1", |_| {
                    switches += 1;
                    Ok::<(), ()>(())
                })
                .unwrap();
        }
        assert_eq!(switches, 1);
        assert!(tracker.is_active("abox-1"));
    }

    #[test]
    fn failed_switch_still_records_target() {
        let tracker = ContextTracker::new();
        tracker.set("abox-1");
        let result = tracker.ensure("abox-2", |_| Err("boom"));
        assert_eq!(result, Err("boom"));
        assert_eq!(tracker.active().as_deref(), Some("abox-2"));
    }

    #[test]
    fn clones_share_state() {
        let a = ContextTracker::new();
        let b = a.clone();
        a.set("x");
        assert!(b.is_active("x"));
        assert!(a.shares_state_with(&b));
        b.clear();
        assert_eq!(a.active(), None);
        assert!(!a.shares_state_with(&ContextTracker::new()));
    }
}
