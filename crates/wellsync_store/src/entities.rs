//! Versioned entity storage.

use crate::error::StoreResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use wellsync_model::{EntityKey, VersionedEntity};

/// Durable CRUD for versioned entity envelopes, keyed by entity.
///
/// In the full application this sits in front of the embedded database's
/// domain tables; the sync core only needs envelope-level access.
pub trait EntityStore: Send + Sync {
    /// Stores an envelope, replacing any prior revision.
    fn put(&self, entity: VersionedEntity) -> StoreResult<()>;

    /// Fetches the current envelope for a key.
    fn get(&self, key: &EntityKey) -> StoreResult<Option<VersionedEntity>>;

    /// Removes the envelope for a key, if present.
    fn remove(&self, key: &EntityKey) -> StoreResult<()>;

    /// Returns the number of stored entities.
    fn len(&self) -> StoreResult<usize>;

    /// Returns true if no entities are stored.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// An in-memory entity store.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    entities: RwLock<HashMap<EntityKey, VersionedEntity>>,
}

impl MemoryEntityStore {
    /// Creates an empty in-memory entity store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityStore for MemoryEntityStore {
    fn put(&self, entity: VersionedEntity) -> StoreResult<()> {
        self.entities.write().insert(entity.key.clone(), entity);
        Ok(())
    }

    fn get(&self, key: &EntityKey) -> StoreResult<Option<VersionedEntity>> {
        Ok(self.entities.read().get(key).cloned())
    }

    fn remove(&self, key: &EntityKey) -> StoreResult<()> {
        self.entities.write().remove(key);
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.entities.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let store = MemoryEntityStore::new();
        let e = VersionedEntity::created(EntityKey::new("e1", "goal"), vec![1, 2], 1_000);

        store.put(e.clone()).unwrap();
        assert_eq!(store.get(&e.key).unwrap(), Some(e.clone()));
        assert_eq!(store.len().unwrap(), 1);

        store.remove(&e.key).unwrap();
        assert!(store.get(&e.key).unwrap().is_none());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn put_replaces_prior_revision() {
        let store = MemoryEntityStore::new();
        let e = VersionedEntity::created(EntityKey::new("e1", "goal"), vec![1], 1_000);
        let r = e.revised(vec![2], 2_000);

        store.put(e).unwrap();
        store.put(r.clone()).unwrap();

        assert_eq!(store.get(&r.key).unwrap(), Some(r));
        assert_eq!(store.len().unwrap(), 1);
    }
}
