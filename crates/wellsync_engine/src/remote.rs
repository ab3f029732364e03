//! Remote backend abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use wellsync_model::{EntityKey, RemoteRevision, Version, VersionedEntity};

/// Outcome of pushing an entity revision to the remote backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The remote accepted the revision as its new current version.
    Accepted,
    /// The remote holds a newer version; the push was refused.
    Rejected {
        /// The version the remote currently holds.
        current_remote_version: Version,
    },
}

/// A remote backend handles cloud communication for sync passes.
///
/// This trait abstracts the transport (REST, realtime channel, mock for
/// testing). Implementations decide how calls map onto the wire; the
/// orchestrator only sees versions and opaque payloads.
pub trait RemoteBackend: Send + Sync {
    /// Pushes one entity revision.
    fn push_entity(&self, entity: &VersionedEntity) -> SyncResult<PushOutcome>;

    /// Returns all revisions of a kind with a version greater than
    /// `since_version`.
    fn pull_changes(&self, kind: &str, since_version: Version)
        -> SyncResult<Vec<RemoteRevision>>;

    /// Fetches the current remote revision of one entity.
    fn fetch(&self, key: &EntityKey) -> SyncResult<Option<RemoteRevision>>;
}

/// A mock remote with scripted responses, for unit tests.
#[derive(Debug, Default)]
pub struct MockRemote {
    push_results: Mutex<VecDeque<SyncResult<PushOutcome>>>,
    pull_results: Mutex<VecDeque<SyncResult<Vec<RemoteRevision>>>>,
    fetch_results: Mutex<VecDeque<SyncResult<Option<RemoteRevision>>>>,
    push_count: Mutex<u32>,
}

impl MockRemote {
    /// Creates a mock with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a push result.
    pub fn script_push(&self, result: SyncResult<PushOutcome>) {
        self.push_results.lock().push_back(result);
    }

    /// Queues a pull result.
    pub fn script_pull(&self, result: SyncResult<Vec<RemoteRevision>>) {
        self.pull_results.lock().push_back(result);
    }

    /// Queues a fetch result.
    pub fn script_fetch(&self, result: SyncResult<Option<RemoteRevision>>) {
        self.fetch_results.lock().push_back(result);
    }

    /// Number of push calls observed.
    #[must_use]
    pub fn push_count(&self) -> u32 {
        *self.push_count.lock()
    }
}

impl RemoteBackend for MockRemote {
    fn push_entity(&self, _entity: &VersionedEntity) -> SyncResult<PushOutcome> {
        *self.push_count.lock() += 1;
        self.push_results
            .lock()
            .pop_front()
            .unwrap_or(Ok(PushOutcome::Accepted))
    }

    fn pull_changes(
        &self,
        _kind: &str,
        _since_version: Version,
    ) -> SyncResult<Vec<RemoteRevision>> {
        self.pull_results.lock().pop_front().unwrap_or(Ok(Vec::new()))
    }

    fn fetch(&self, _key: &EntityKey) -> SyncResult<Option<RemoteRevision>> {
        self.fetch_results.lock().pop_front().unwrap_or(Ok(None))
    }
}

/// An in-memory remote backend honoring version checks.
///
/// Behaves like the reference cloud backend: a push is accepted only when
/// its version is strictly greater than the stored one, and pulls return
/// every revision of a kind past the requested version. Used by the
/// integration tests.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    revisions: RwLock<HashMap<EntityKey, RemoteRevision>>,
    fail_next_pushes: Mutex<u32>,
}

impl MemoryRemote {
    /// Creates an empty in-memory remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a revision directly, as if another device had pushed it.
    pub fn seed(&self, revision: RemoteRevision) {
        self.revisions
            .write()
            .insert(revision.key.clone(), revision);
    }

    /// Makes the next `n` pushes fail with a retryable transport error.
    pub fn fail_next_pushes(&self, n: u32) {
        *self.fail_next_pushes.lock() = n;
    }

    /// Returns the stored revision for a key.
    #[must_use]
    pub fn revision(&self, key: &EntityKey) -> Option<RemoteRevision> {
        self.revisions.read().get(key).cloned()
    }

    /// Number of stored revisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.revisions.read().len()
    }

    /// Returns true if no revisions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RemoteBackend for MemoryRemote {
    fn push_entity(&self, entity: &VersionedEntity) -> SyncResult<PushOutcome> {
        {
            let mut failures = self.fail_next_pushes.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(SyncError::transport_retryable("connection reset by peer"));
            }
        }

        let mut revisions = self.revisions.write();
        if let Some(current) = revisions.get(&entity.key) {
            if current.version >= entity.version {
                return Ok(PushOutcome::Rejected {
                    current_remote_version: current.version,
                });
            }
        }

        revisions.insert(
            entity.key.clone(),
            RemoteRevision {
                key: entity.key.clone(),
                version: entity.version,
                modified_at: entity.modified_at,
                payload: entity.payload.clone(),
                deleted: entity.deleted,
            },
        );
        Ok(PushOutcome::Accepted)
    }

    fn pull_changes(
        &self,
        kind: &str,
        since_version: Version,
    ) -> SyncResult<Vec<RemoteRevision>> {
        let mut changes: Vec<RemoteRevision> = self
            .revisions
            .read()
            .values()
            .filter(|r| r.key.kind == kind && r.version > since_version)
            .cloned()
            .collect();
        changes.sort_by_key(|r| r.version);
        Ok(changes)
    }

    fn fetch(&self, key: &EntityKey) -> SyncResult<Option<RemoteRevision>> {
        Ok(self.revisions.read().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, version: u64) -> VersionedEntity {
        VersionedEntity::from_remote(
            EntityKey::new(id, "goal"),
            Version::new(version),
            1_000,
            vec![version as u8],
            false,
        )
    }

    #[test]
    fn memory_remote_accepts_newer_versions() {
        let remote = MemoryRemote::new();
        assert_eq!(
            remote.push_entity(&entity("e1", 1)).unwrap(),
            PushOutcome::Accepted
        );
        assert_eq!(
            remote.push_entity(&entity("e1", 2)).unwrap(),
            PushOutcome::Accepted
        );
        assert_eq!(remote.len(), 1);
    }

    #[test]
    fn memory_remote_rejects_stale_versions() {
        let remote = MemoryRemote::new();
        remote.push_entity(&entity("e1", 5)).unwrap();

        let outcome = remote.push_entity(&entity("e1", 3)).unwrap();
        assert_eq!(
            outcome,
            PushOutcome::Rejected {
                current_remote_version: Version::new(5)
            }
        );
    }

    #[test]
    fn memory_remote_rejects_equal_versions() {
        let remote = MemoryRemote::new();
        remote.push_entity(&entity("e1", 5)).unwrap();

        let outcome = remote.push_entity(&entity("e1", 5)).unwrap();
        assert!(matches!(outcome, PushOutcome::Rejected { .. }));
    }

    #[test]
    fn memory_remote_pull_filters_by_kind_and_version() {
        let remote = MemoryRemote::new();
        remote.push_entity(&entity("e1", 2)).unwrap();
        remote.push_entity(&entity("e2", 5)).unwrap();
        remote
            .push_entity(&VersionedEntity::from_remote(
                EntityKey::new("m1", "meal_log"),
                Version::new(9),
                1_000,
                vec![9],
                false,
            ))
            .unwrap();

        let changes = remote.pull_changes("goal", Version::new(2)).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key.entity_id, "e2");

        let all = remote.pull_changes("goal", Version::new(0)).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn memory_remote_injected_failures_are_transient() {
        let remote = MemoryRemote::new();
        remote.fail_next_pushes(2);

        assert!(remote.push_entity(&entity("e1", 1)).is_err());
        assert!(remote.push_entity(&entity("e1", 1)).is_err());
        assert_eq!(
            remote.push_entity(&entity("e1", 1)).unwrap(),
            PushOutcome::Accepted
        );
    }

    #[test]
    fn mock_remote_scripts_in_order() {
        let mock = MockRemote::new();
        mock.script_push(Err(SyncError::transport_retryable("timeout")));
        mock.script_push(Ok(PushOutcome::Accepted));

        assert!(mock.push_entity(&entity("e1", 1)).is_err());
        assert!(matches!(
            mock.push_entity(&entity("e1", 1)),
            Ok(PushOutcome::Accepted)
        ));
        assert_eq!(mock.push_count(), 2);
    }
}
