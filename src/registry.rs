use std::collections::BTreeMap;
use std::sync::Arc;

/// Callbacks keyed by a monotonically increasing handle id.
///
/// Ids are handed out in registration order, so iterating the map yields
/// callbacks in the order they were registered.
pub(crate) struct Registry<T: ?Sized> {
    entries: BTreeMap<u64, Arc<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, id: u64, callback: Arc<T>) {
        self.entries.insert(id, callback);
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn get(&self, id: u64) -> Option<Arc<T>> {
        self.entries.get(&id).cloned()
    }

    /// Ids registered before `id`, oldest first
    pub fn ids_before(&self, id: u64) -> Vec<u64> {
        self.entries.range(..id).map(|(id, _)| *id).collect()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }
}
