//! Per-review locking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use countersign_domain::ReviewId;

/// Lock registry giving each review one mutex for the duration of a
/// validate → mutate → persist cycle
///
/// The store only serializes individual snapshot writes; without this,
/// two concurrent edits could read the same base snapshot and the last
/// writer would silently discard the other's changes.
#[derive(Default)]
pub struct ReviewLocks {
    inner: Mutex<HashMap<ReviewId, Arc<Mutex<()>>>>,
}

impl ReviewLocks {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for a review, created on first use
    pub fn for_review(&self, id: ReviewId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(map.entry(id).or_default())
    }
}

/// Acquire a review lock guard, recovering from poisoning
pub fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}
