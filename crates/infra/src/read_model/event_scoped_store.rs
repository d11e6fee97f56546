use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use partyplan_core::PlannedEventId;

/// Planned-event-isolated key/value store for disposable read models.
pub trait EventScopedStore<K, V>: Send + Sync {
    fn get(&self, planned_event_id: PlannedEventId, key: &K) -> Option<V>;
    fn upsert(&self, planned_event_id: PlannedEventId, key: K, value: V);
    fn list(&self, planned_event_id: PlannedEventId) -> Vec<V>;
    /// Drop every record of one planned event (rebuild support).
    fn clear_scope(&self, planned_event_id: PlannedEventId);
}

impl<K, V, S> EventScopedStore<K, V> for Arc<S>
where
    S: EventScopedStore<K, V> + ?Sized,
{
    fn get(&self, planned_event_id: PlannedEventId, key: &K) -> Option<V> {
        (**self).get(planned_event_id, key)
    }

    fn upsert(&self, planned_event_id: PlannedEventId, key: K, value: V) {
        (**self).upsert(planned_event_id, key, value)
    }

    fn list(&self, planned_event_id: PlannedEventId) -> Vec<V> {
        (**self).list(planned_event_id)
    }

    fn clear_scope(&self, planned_event_id: PlannedEventId) {
        (**self).clear_scope(planned_event_id)
    }
}

#[derive(Debug)]
pub struct InMemoryEventScopedStore<K, V> {
    inner: RwLock<HashMap<(PlannedEventId, K), V>>,
}

impl<K, V> InMemoryEventScopedStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryEventScopedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EventScopedStore<K, V> for InMemoryEventScopedStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, planned_event_id: PlannedEventId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(planned_event_id, key.clone())).cloned()
    }

    fn upsert(&self, planned_event_id: PlannedEventId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((planned_event_id, key), value);
        }
    }

    fn list(&self, planned_event_id: PlannedEventId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((scope, _k), v)| (*scope == planned_event_id).then(|| v.clone()))
            .collect()
    }

    fn clear_scope(&self, planned_event_id: PlannedEventId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(scope, _k), _v| *scope != planned_event_id);
        }
    }
}
