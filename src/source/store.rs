//! # Store: latest payload per known key.
//!
//! The queue only carries keys, so the runtime keeps the most recent payload of
//! every live resource to hand to the handler. This is the only payload cache in
//! the engine; it holds one `Arc<P>` per key and nothing else.
//!
//! The key set doubles as the resync enumeration: it starts from the last full
//! list and is maintained incrementally from watch events.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::key::ResourceKey;
use crate::source::ResourceEvent;

/// Shared map of key → latest payload. Cheap to clone.
pub struct Store<P> {
    objects: Arc<RwLock<HashMap<ResourceKey, Arc<P>>>>,
}

impl<P> Clone for Store<P> {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
        }
    }
}

impl<P> Default for Store<P> {
    fn default() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<P> Store<P> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one notification and returns the affected key.
    pub fn apply(&self, event: ResourceEvent<P>) -> ResourceKey {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            ResourceEvent::Added(key, payload) | ResourceEvent::Updated(key, payload) => {
                objects.insert(key.clone(), Arc::new(payload));
                key
            }
            ResourceEvent::Deleted(key) => {
                objects.remove(&key);
                key
            }
        }
    }

    /// Replaces the whole content with a fresh list.
    ///
    /// Returns the keys that were known before but are absent from the list,
    /// i.e. deletions missed while the watch was down.
    pub fn replace(&self, items: Vec<(ResourceKey, P)>) -> Vec<ResourceKey> {
        let fresh: HashMap<ResourceKey, Arc<P>> = items
            .into_iter()
            .map(|(key, payload)| (key, Arc::new(payload)))
            .collect();

        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        let mut vanished: Vec<ResourceKey> = objects
            .keys()
            .filter(|key| !fresh.contains_key(*key))
            .cloned()
            .collect();
        vanished.sort_unstable();
        *objects = fresh;
        vanished
    }

    /// Latest payload for `key`, or `None` if it is not (or no longer) present.
    pub fn get(&self, key: &ResourceKey) -> Option<Arc<P>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Sorted snapshot of every known key.
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort_unstable();
        keys
    }

    /// True if `key` is known.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Number of known keys.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if no key is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ResourceKey {
        ResourceKey::from(s)
    }

    #[test]
    fn test_apply_tracks_latest_payload() {
        let store = Store::new();
        store.apply(ResourceEvent::Added(key("a"), 1));
        store.apply(ResourceEvent::Updated(key("a"), 2));
        assert_eq!(store.get(&key("a")).as_deref(), Some(&2));

        store.apply(ResourceEvent::Deleted(key("a")));
        assert!(store.get(&key("a")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_reports_vanished_keys() {
        let store = Store::new();
        store.apply(ResourceEvent::Added(key("a"), 1));
        store.apply(ResourceEvent::Added(key("b"), 1));
        store.apply(ResourceEvent::Added(key("c"), 1));

        let vanished = store.replace(vec![(key("b"), 2), (key("d"), 1)]);
        assert_eq!(vanished, vec![key("a"), key("c")]);
        assert_eq!(store.keys(), vec![key("b"), key("d")]);
        assert_eq!(store.get(&key("b")).as_deref(), Some(&2));
    }
}
