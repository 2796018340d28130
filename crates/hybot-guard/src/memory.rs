//! Session approval memory.
//!
//! Holds "remember for this session" decisions keyed by rule class. Lives
//! inside the [`RunContext`](crate::RunContext), starts empty, and is never
//! written to disk.

use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::request::Outcome;

/// Run-scoped map from rule class to remembered outcome.
#[derive(Default)]
pub struct SessionApprovalMemory {
    entries: RwLock<HashMap<String, Outcome>>,
}

impl SessionApprovalMemory {
    /// Create an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `outcome` for `rule_class`. Later calls overwrite earlier ones.
    pub fn remember(&self, rule_class: impl Into<String>, outcome: Outcome) {
        self.write().insert(rule_class.into(), outcome);
    }

    /// The remembered outcome for `rule_class`, if any.
    #[must_use]
    pub fn recall(&self, rule_class: &str) -> Option<Outcome> {
        self.read().get(rule_class).copied()
    }

    /// Number of remembered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing has been remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Remembered classes and outcomes, sorted by class.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Outcome)> {
        let mut items: Vec<(String, Outcome)> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Outcome>> {
        self.entries.read().unwrap_or_else(|e| {
            tracing::warn!("SessionApprovalMemory read lock poisoned, recovering");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Outcome>> {
        self.entries.write().unwrap_or_else(|e| {
            tracing::warn!("SessionApprovalMemory lock poisoned, recovering");
            e.into_inner()
        })
    }
}

impl fmt::Debug for SessionApprovalMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionApprovalMemory")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let memory = SessionApprovalMemory::new();
        assert!(memory.is_empty());
        assert_eq!(memory.recall("privilege-escalation"), None);
    }

    #[test]
    fn test_remember_and_recall() {
        let memory = SessionApprovalMemory::new();
        memory.remember("git-force-push", Outcome::Approve);
        memory.remember("raw-disk-write", Outcome::Deny);

        assert_eq!(memory.recall("git-force-push"), Some(Outcome::Approve));
        assert_eq!(memory.recall("raw-disk-write"), Some(Outcome::Deny));
        assert_eq!(memory.recall("shell"), None);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_overwrite() {
        let memory = SessionApprovalMemory::new();
        memory.remember("shell", Outcome::Approve);
        memory.remember("shell", Outcome::Deny);
        assert_eq!(memory.recall("shell"), Some(Outcome::Deny));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_clear_and_snapshot() {
        let memory = SessionApprovalMemory::new();
        memory.remember("b", Outcome::Deny);
        memory.remember("a", Outcome::Approve);
        assert_eq!(
            memory.snapshot(),
            vec![
                ("a".to_string(), Outcome::Approve),
                ("b".to_string(), Outcome::Deny)
            ]
        );

        memory.clear();
        assert!(memory.is_empty());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let memory = std::sync::Arc::new(SessionApprovalMemory::new());
        memory.remember("force-kill", Outcome::Approve);

        let poisoner = std::sync::Arc::clone(&memory);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.entries.write().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(joined.is_err());
        assert!(memory.entries.is_poisoned());

        assert_eq!(memory.len(), 1);
        assert_eq!(
            memory.snapshot(),
            vec![("force-kill".to_string(), Outcome::Approve)]
        );
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.snapshot().is_empty());
    }
}
