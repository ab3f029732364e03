//! Ledger store trait.

use crate::error::StoreResult;
use wellsync_model::{EntityKey, SyncState, SyncStatusRecord};

/// Durable CRUD for sync status records, keyed by entity.
///
/// The ledger is a purely passive index: it has no side effects of its own.
/// Implementations must be thread-safe, but they do not serialize writers;
/// all mutations flow through the sync orchestrator and conflict resolver
/// (single-writer discipline).
pub trait LedgerStore: Send + Sync {
    /// Inserts or overwrites the record for its key. Idempotent: upserting
    /// an identical record twice leaves the ledger observably unchanged.
    fn upsert(&self, record: SyncStatusRecord) -> StoreResult<()>;

    /// Fetches the record for a key.
    fn get(&self, key: &EntityKey) -> StoreResult<Option<SyncStatusRecord>>;

    /// Returns all records in a given state. Used to find work.
    fn by_state(&self, state: SyncState) -> StoreResult<Vec<SyncStatusRecord>>;

    /// Returns all records for an entity kind.
    fn by_kind(&self, kind: &str) -> StoreResult<Vec<SyncStatusRecord>>;

    /// Removes the record for a key, if present. Called once a propagated
    /// deletion retires the entity.
    fn remove(&self, key: &EntityKey) -> StoreResult<()>;

    /// Returns every record in the ledger.
    fn records(&self) -> StoreResult<Vec<SyncStatusRecord>>;

    /// Returns the number of tracked entities.
    fn len(&self) -> StoreResult<usize>;

    /// Returns true if no entities are tracked.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
