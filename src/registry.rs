//! The process-wide name → [`Object`] mapping.
//!
//! A single RW lock guards the map. Every public operation here holds the
//! lock only for the map mutation itself, never across object I/O or
//! network copies — those happen against the returned `Arc<Object>` after
//! the lock is released.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::object::Object;

#[derive(Default)]
pub struct Registry {
    objects: RwLock<HashMap<String, Arc<Object>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object, overwriting any prior entry at that name. The
    /// prior object, if any, is not closed here — its existing readers
    /// drain it independently.
    pub fn insert(&self, name: String, object: Arc<Object>) {
        self.objects.write().insert(name, object);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Object>> {
        self.objects.read().get(name).cloned()
    }

    /// Removes and returns the object at `name`, if present, so the caller
    /// can unlink its disk file outside the lock.
    pub fn remove(&self, name: &str) -> Option<Arc<Object>> {
        self.objects.write().remove(name)
    }

    /// Snapshots names and their `Arc<Object>` for the eviction sweep.
    /// Cloning `Arc`s here keeps the lock held only for the duration of
    /// the snapshot, not for the expiry check or the disk unlink that
    /// follows it.
    pub fn snapshot(&self) -> Vec<(String, Arc<Object>)> {
        self.objects
            .read()
            .iter()
            .map(|(name, object)| (name.clone(), object.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    #[test]
    fn insert_overwrites_prior_entry() {
        let registry = Registry::new();
        let first = Object::new("a", HeaderMap::new(), -1);
        let second = Object::new("a", HeaderMap::new(), -1);

        registry.insert("a".into(), first.clone());
        registry.insert("a".into(), second.clone());

        let looked_up = registry.lookup("a").unwrap();
        assert!(Arc::ptr_eq(&looked_up, &second));
    }

    #[test]
    fn remove_returns_the_object_for_disk_cleanup() {
        let registry = Registry::new();
        let object = Object::new("b", HeaderMap::new(), -1);
        registry.insert("b".into(), object.clone());

        let removed = registry.remove("b").unwrap();
        assert!(Arc::ptr_eq(&removed, &object));
        assert!(registry.lookup("b").is_none());
    }
}
