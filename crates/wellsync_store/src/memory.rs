//! In-memory ledger for testing and ephemeral use.

use crate::error::StoreResult;
use crate::ledger::LedgerStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use wellsync_model::{EntityKey, SyncState, SyncStatusRecord};

/// An in-memory ledger store.
///
/// Contents are lost when dropped. Thread-safe.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<HashMap<EntityKey, SyncStatusRecord>>,
}

impl MemoryLedger {
    /// Creates an empty in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedger {
    fn upsert(&self, record: SyncStatusRecord) -> StoreResult<()> {
        self.records.write().insert(record.key.clone(), record);
        Ok(())
    }

    fn get(&self, key: &EntityKey) -> StoreResult<Option<SyncStatusRecord>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn by_state(&self, state: SyncState) -> StoreResult<Vec<SyncStatusRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.state == state)
            .cloned()
            .collect())
    }

    fn by_kind(&self, kind: &str) -> StoreResult<Vec<SyncStatusRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.key.kind == kind)
            .cloned()
            .collect())
    }

    fn remove(&self, key: &EntityKey) -> StoreResult<()> {
        self.records.write().remove(key);
        Ok(())
    }

    fn records(&self) -> StoreResult<Vec<SyncStatusRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellsync_model::Version;

    fn record(id: &str, kind: &str, state: SyncState) -> SyncStatusRecord {
        SyncStatusRecord {
            key: EntityKey::new(id, kind),
            state,
            version: Version::new(1),
            modified_at: 1_000,
            last_sync_attempt: None,
            retry_count: 0,
            failure_reason: None,
        }
    }

    #[test]
    fn upsert_and_get() {
        let ledger = MemoryLedger::new();
        let r = record("e1", "goal", SyncState::PendingUpload);
        ledger.upsert(r.clone()).unwrap();

        assert_eq!(ledger.get(&r.key).unwrap(), Some(r));
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn upsert_is_idempotent() {
        let ledger = MemoryLedger::new();
        let r = record("e1", "goal", SyncState::PendingUpload);

        ledger.upsert(r.clone()).unwrap();
        let once = ledger.records().unwrap();

        ledger.upsert(r).unwrap();
        let twice = ledger.records().unwrap();

        assert_eq!(once, twice);
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn upsert_overwrites_prior_record() {
        let ledger = MemoryLedger::new();
        let r = record("e1", "goal", SyncState::PendingUpload);
        ledger.upsert(r.clone()).unwrap();
        ledger.upsert(r.clone().synced(Version::new(2), 2_000)).unwrap();

        let stored = ledger.get(&r.key).unwrap().unwrap();
        assert_eq!(stored.state, SyncState::Synced);
        assert_eq!(stored.version, Version::new(2));
    }

    #[test]
    fn query_by_state_and_kind() {
        let ledger = MemoryLedger::new();
        ledger
            .upsert(record("e1", "goal", SyncState::PendingUpload))
            .unwrap();
        ledger
            .upsert(record("e2", "goal", SyncState::Synced))
            .unwrap();
        ledger
            .upsert(record("e3", "meal_log", SyncState::PendingUpload))
            .unwrap();

        assert_eq!(ledger.by_state(SyncState::PendingUpload).unwrap().len(), 2);
        assert_eq!(ledger.by_state(SyncState::Failed).unwrap().len(), 0);
        assert_eq!(ledger.by_kind("goal").unwrap().len(), 2);
        assert_eq!(ledger.by_kind("meal_log").unwrap().len(), 1);
    }

    #[test]
    fn remove_retires_record() {
        let ledger = MemoryLedger::new();
        let r = record("e1", "goal", SyncState::Synced);
        ledger.upsert(r.clone()).unwrap();
        ledger.remove(&r.key).unwrap();

        assert!(ledger.get(&r.key).unwrap().is_none());
        assert!(ledger.is_empty().unwrap());

        // Removing an absent key is not an error.
        ledger.remove(&r.key).unwrap();
    }
}
