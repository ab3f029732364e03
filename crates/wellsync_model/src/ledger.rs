//! Sync status records.

use crate::entity::{EntityKey, Version};
use serde::{Deserialize, Serialize};

/// Per-entity sync state tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// A local edit has not been pushed yet.
    PendingUpload,
    /// A remote change is known but not yet fetched and applied.
    PendingDownload,
    /// Local and remote agree at this version.
    Synced,
    /// Local and remote diverged; awaiting explicit resolution.
    Conflict,
    /// Push/pull exhausted the retry budget; excluded from automatic passes.
    Failed,
}

impl SyncState {
    /// Converts to a numeric code for compact encoding.
    #[must_use]
    pub fn to_code(self) -> u8 {
        match self {
            SyncState::PendingUpload => 1,
            SyncState::PendingDownload => 2,
            SyncState::Synced => 3,
            SyncState::Conflict => 4,
            SyncState::Failed => 5,
        }
    }

    /// Converts from a numeric code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(SyncState::PendingUpload),
            2 => Some(SyncState::PendingDownload),
            3 => Some(SyncState::Synced),
            4 => Some(SyncState::Conflict),
            5 => Some(SyncState::Failed),
            _ => None,
        }
    }

    /// Returns true if the record represents outstanding work for an
    /// automatic sync pass.
    #[must_use]
    pub fn needs_sync(self) -> bool {
        matches!(self, SyncState::PendingUpload | SyncState::PendingDownload)
    }
}

/// Durable per-entity sync bookkeeping.
///
/// The ledger is the single source of truth for "does this entity need
/// attention". Records are created when an entity first becomes syncable and
/// removed once a propagated deletion retires it. Only the orchestrator and
/// the conflict resolver transition records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatusRecord {
    /// Entity identity.
    pub key: EntityKey,
    /// Current sync state.
    pub state: SyncState,
    /// Last known-synced or locally-advanced version.
    pub version: Version,
    /// Last modification time, unix milliseconds. Advisory only.
    pub modified_at: i64,
    /// Time of the last push/pull attempt, unix milliseconds.
    pub last_sync_attempt: Option<i64>,
    /// Consecutive transient failures for the current attempt series.
    pub retry_count: u32,
    /// Terminal failure reason, set when `state` is `Failed`.
    pub failure_reason: Option<String>,
}

impl SyncStatusRecord {
    /// Creates a record for a local edit awaiting upload.
    pub fn pending_upload(key: EntityKey, version: Version, modified_at: i64) -> Self {
        Self {
            key,
            state: SyncState::PendingUpload,
            version,
            modified_at,
            last_sync_attempt: None,
            retry_count: 0,
            failure_reason: None,
        }
    }

    /// Creates a record for a known-but-unfetched remote change.
    pub fn pending_download(key: EntityKey, version: Version, modified_at: i64) -> Self {
        Self {
            key,
            state: SyncState::PendingDownload,
            version,
            modified_at,
            last_sync_attempt: None,
            retry_count: 0,
            failure_reason: None,
        }
    }

    /// Returns true if this record carries an unpushed local edit.
    #[must_use]
    pub fn has_pending_local_edit(&self) -> bool {
        matches!(self.state, SyncState::PendingUpload | SyncState::Conflict)
    }

    /// Transitions to `Synced` at the given version.
    #[must_use]
    pub fn synced(mut self, version: Version, attempted_at: i64) -> Self {
        self.state = SyncState::Synced;
        self.version = version;
        self.last_sync_attempt = Some(attempted_at);
        self.retry_count = 0;
        self.failure_reason = None;
        self
    }

    /// Transitions to `Conflict`, keeping the local version.
    #[must_use]
    pub fn conflicted(mut self, attempted_at: i64) -> Self {
        self.state = SyncState::Conflict;
        self.last_sync_attempt = Some(attempted_at);
        self
    }

    /// Transitions to `Failed` with a terminal reason.
    #[must_use]
    pub fn failed(mut self, reason: impl Into<String>, attempted_at: i64, retries: u32) -> Self {
        self.state = SyncState::Failed;
        self.last_sync_attempt = Some(attempted_at);
        self.retry_count = retries;
        self.failure_reason = Some(reason.into());
        self
    }

    /// Re-queues a failed record for upload, clearing the failure.
    #[must_use]
    pub fn requeued(mut self) -> Self {
        self.state = SyncState::PendingUpload;
        self.retry_count = 0;
        self.failure_reason = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SyncStatusRecord {
        SyncStatusRecord::pending_upload(EntityKey::new("e1", "goal"), Version::new(3), 1_000)
    }

    #[test]
    fn state_codes_roundtrip() {
        for state in [
            SyncState::PendingUpload,
            SyncState::PendingDownload,
            SyncState::Synced,
            SyncState::Conflict,
            SyncState::Failed,
        ] {
            assert_eq!(SyncState::from_code(state.to_code()), Some(state));
        }
        assert_eq!(SyncState::from_code(0), None);
        assert_eq!(SyncState::from_code(9), None);
    }

    #[test]
    fn needs_sync_only_for_pending_states() {
        assert!(SyncState::PendingUpload.needs_sync());
        assert!(SyncState::PendingDownload.needs_sync());
        assert!(!SyncState::Synced.needs_sync());
        assert!(!SyncState::Conflict.needs_sync());
        assert!(!SyncState::Failed.needs_sync());
    }

    #[test]
    fn synced_clears_failure_bookkeeping() {
        let r = record()
            .failed("network down", 2_000, 3)
            .synced(Version::new(4), 3_000);
        assert_eq!(r.state, SyncState::Synced);
        assert_eq!(r.version, Version::new(4));
        assert_eq!(r.retry_count, 0);
        assert!(r.failure_reason.is_none());
    }

    #[test]
    fn failed_records_reason() {
        let r = record().failed("connection refused", 2_000, 2);
        assert_eq!(r.state, SyncState::Failed);
        assert_eq!(r.retry_count, 2);
        assert_eq!(r.failure_reason.as_deref(), Some("connection refused"));
    }

    #[test]
    fn requeued_resets_failure() {
        let r = record().failed("timeout", 2_000, 2).requeued();
        assert_eq!(r.state, SyncState::PendingUpload);
        assert_eq!(r.retry_count, 0);
        assert!(r.failure_reason.is_none());
    }

    #[test]
    fn conflict_keeps_local_version() {
        let r = record().conflicted(2_000);
        assert_eq!(r.state, SyncState::Conflict);
        assert_eq!(r.version, Version::new(3));
        assert!(r.has_pending_local_edit());
    }
}
