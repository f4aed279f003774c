//! Process-wide set of coverage-objective identifiers.

use dashmap::{mapref::entry::Entry, DashMap};

/// Concurrent, append-only set of objective identifiers.
///
/// Registration is idempotent and can run from many rewriting threads at once. Every identifier
/// receives a stable numeric index in registration order, which consumers use as compact key for
/// coverage bookkeeping.
///
/// # Thread Safety
///
/// The presence check and the append happen under the lock of the identifier's map shard, so two
/// threads registering the same identifier store it once.
#[derive(Debug, Default)]
pub struct ObjectiveStore {
    index: DashMap<String, usize>,
    ids: boxcar::Vec<String>,
}

impl ObjectiveStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        ObjectiveStore::default()
    }

    /// Registers `id`. Returns `true` if it was not known before.
    pub fn register(&self, id: &str) -> bool {
        if self.index.contains_key(id) {
            return false;
        }

        match self.index.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let position = self.ids.push(id.to_string());
                slot.insert(position);
                true
            }
        }
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Registration index of `id`.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).map(|position| *position)
    }

    /// Number of registered identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Snapshot of all identifiers in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().map(|(_, id)| id.clone()).collect()
    }
}
