//! Per-pair mutual exclusion for relationship mutations.
//!
//! Every mutation touching a pair `{a, b}` runs inside [`PairLocks::with_pair`],
//! so a follow, block, and conversation creation on the same pair never
//! interleave within one process. Mutations on unrelated pairs proceed in
//! parallel. Across processes the `SQLite` backend's `BEGIN IMMEDIATE`
//! transactions provide the same ordering at the storage layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::identity::CanonicalPair;

type Slot = Arc<Mutex<()>>;

/// Lazily created lock per canonical pair.
#[derive(Debug, Default)]
pub struct PairLocks {
    slots: Mutex<HashMap<CanonicalPair, Slot>>,
}

impl PairLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the exclusive lock for `pair`.
    ///
    /// The slot is dropped from the table once no other caller holds or
    /// waits on it.
    pub fn with_pair<T>(&self, pair: &CanonicalPair, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.table();
            Arc::clone(slots.entry(pair.clone()).or_default())
        };

        let result = {
            let _held = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut slots = self.table();
        // One reference in the table, one here: nobody else is queued.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(pair);
        }
        result
    }

    /// Number of pairs with a live slot.
    #[must_use]
    pub fn active(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<CanonicalPair, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
