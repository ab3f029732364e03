//! Conflict storage and resolution.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use wellsync_model::{
    ConflictId, ConflictRecord, EntityKey, MergeRegistry, Resolution, SyncState, VersionedEntity,
};

/// In-memory registry of conflicts awaiting resolution.
///
/// The durable marker for a conflicted entity is its ledger record's
/// `Conflict` state; this store holds the divergent payload pair between
/// detection and resolution. Records are consumed on resolution and
/// re-detected from versions after a restart.
#[derive(Debug, Default)]
pub struct ConflictStore {
    conflicts: RwLock<HashMap<ConflictId, ConflictRecord>>,
}

impl ConflictStore {
    /// Creates an empty conflict store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a conflict, replacing any earlier one for the same entity.
    pub fn upsert(&self, record: ConflictRecord) {
        let mut conflicts = self.conflicts.write();
        conflicts.retain(|_, c| c.key != record.key);
        conflicts.insert(record.conflict_id, record);
    }

    /// Removes and returns a conflict by id.
    #[must_use]
    pub fn take(&self, conflict_id: ConflictId) -> Option<ConflictRecord> {
        self.conflicts.write().remove(&conflict_id)
    }

    /// Returns all unresolved conflicts, oldest first.
    #[must_use]
    pub fn unresolved(&self) -> Vec<ConflictRecord> {
        let mut records: Vec<ConflictRecord> = self
            .conflicts
            .read()
            .values()
            .filter(|c| c.is_unresolved())
            .cloned()
            .collect();
        records.sort_by_key(|c| c.detected_at);
        records
    }

    /// Returns the conflict for an entity, if one is pending.
    #[must_use]
    pub fn for_key(&self, key: &EntityKey) -> Option<ConflictRecord> {
        self.conflicts
            .read()
            .values()
            .find(|c| c.key == *key)
            .cloned()
    }

    /// Number of pending conflicts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conflicts.read().len()
    }

    /// Returns true if no conflicts are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The reconciled result of applying a resolution choice.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConflict {
    /// Reconciled entity at a version past both divergent revisions.
    pub entity: VersionedEntity,
    /// Ledger state the entity transitions to.
    pub state: SyncState,
    /// The choice that was applied.
    pub resolution: Resolution,
}

/// Applies explicit resolution choices to materialized conflicts.
///
/// The resolver is pure with respect to storage: it computes the reconciled
/// envelope and target ledger state, and the orchestrator commits them as a
/// single record transition.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    merges: MergeRegistry,
}

impl ConflictResolver {
    /// Creates a resolver with the given merge registry.
    #[must_use]
    pub fn new(merges: MergeRegistry) -> Self {
        Self { merges }
    }

    /// Returns the merge registry.
    #[must_use]
    pub fn merges(&self) -> &MergeRegistry {
        &self.merges
    }

    /// Resolves a conflict with an explicit choice.
    ///
    /// The reconciled version is strictly greater than both the local and
    /// cloud versions. `UseLocal` and `Merged` results still need a push and
    /// transition to `PendingUpload`; `UseCloud` already matches the remote
    /// payload and lands in `Synced`.
    ///
    /// # Errors
    ///
    /// Fails with [`SyncError::UnresolvedChoice`] for `Resolution::Unresolved`
    /// and with the model's merge errors when no merge function is registered
    /// for the entity kind; the conflict then remains unresolved.
    pub fn resolve(
        &self,
        conflict: &ConflictRecord,
        choice: Resolution,
        now: i64,
    ) -> SyncResult<ResolvedConflict> {
        if !conflict.is_unresolved() {
            return Err(wellsync_model::ModelError::AlreadyResolved(conflict.resolution).into());
        }

        let (payload, state) = match choice {
            Resolution::Unresolved => return Err(SyncError::UnresolvedChoice),
            Resolution::UseLocal => (conflict.local_payload.clone(), SyncState::PendingUpload),
            Resolution::UseCloud => (conflict.cloud_payload.clone(), SyncState::Synced),
            Resolution::Merged => {
                let merged = self.merges.merge(
                    &conflict.key.kind,
                    &conflict.local_payload,
                    &conflict.cloud_payload,
                )?;
                (merged, SyncState::PendingUpload)
            }
        };

        let entity = VersionedEntity {
            key: conflict.key.clone(),
            version: conflict.resolved_version(),
            modified_at: now,
            payload,
            deleted: false,
        };

        Ok(ResolvedConflict {
            entity,
            state,
            resolution: choice,
        })
    }
}
