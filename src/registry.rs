use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Callback a connection uses to remove itself from whatever tracks it.
pub trait SessionDeregister: Send + Sync {
    fn deregister(&self, index: usize);
}

/// Table of open sessions owned by the component managing driver lifecycles.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_index: AtomicUsize,
    sessions: Mutex<BTreeMap<usize, String>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session under a fresh index.
    pub fn register(&self, label: impl Into<String>) -> usize {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed) + 1;
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.insert(index, label.into());
        index
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        match self.sessions.lock() {
            Ok(guard) => guard.contains_key(&index),
            Err(poisoned) => poisoned.into_inner().contains_key(&index),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.sessions.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionDeregister for SessionRegistry {
    fn deregister(&self, index: usize) {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if sessions.remove(&index).is_some() {
            tracing::debug!(index, "session deregistered");
        }
    }
}
