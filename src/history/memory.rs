//! In-memory history store.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{History, HistorySnapshot, HistoryStore};
use crate::error::{RelayError, Result};

#[derive(Debug, Default)]
struct Inner {
    snapshot: HistorySnapshot,
    saves: usize,
    fail_saves: bool,
}

/// History kept in process memory.
///
/// Clones share the same state, so a test can hand one clone to the
/// scheduler and inspect the other.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    cap: usize,
}

impl MemoryStore {
    /// Create an empty store with the given per-feed cap.
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            cap,
        }
    }

    /// Create a store pre-populated with a snapshot.
    pub fn with_snapshot(snapshot: HistorySnapshot, cap: usize) -> Self {
        let store = Self::new(cap);
        store.lock().snapshot = snapshot;
        store
    }

    /// Currently persisted state.
    pub fn snapshot(&self) -> HistorySnapshot {
        self.lock().snapshot.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Make subsequent saves fail with a persistence error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> History {
        History::from_snapshot(self.lock().snapshot.clone(), self.cap)
    }

    fn save(&self, history: &History) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(RelayError::Persistence("in-memory store rejects saves".into()));
        }
        inner.snapshot = history.to_snapshot();
        inner.saves += 1;
        Ok(())
    }
}
