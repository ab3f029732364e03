//! Pure conflict classification.

use crate::entity::{EntityKey, PayloadDigest, Version};
use crate::ledger::SyncStatusRecord;
use serde::{Deserialize, Serialize};

/// A revision of an entity as reported by the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRevision {
    /// Entity identity.
    pub key: EntityKey,
    /// Remote version counter.
    pub version: Version,
    /// Remote modification time, unix milliseconds. Advisory only.
    pub modified_at: i64,
    /// Remote payload bytes. Empty for tombstones.
    pub payload: Vec<u8>,
    /// Remote tombstone flag.
    pub deleted: bool,
}

impl RemoteRevision {
    /// Returns the SHA-256 digest of the remote payload.
    #[must_use]
    pub fn payload_digest(&self) -> PayloadDigest {
        PayloadDigest::of(&self.payload)
    }
}

/// Outcome of comparing a local ledger record against a remote revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncClassification {
    /// Both sides already agree; nothing to do.
    InSync,
    /// Remote advanced past a clean local copy; safe to apply.
    RemoteAhead,
    /// Local advanced past the remote; safe to push.
    LocalAhead,
    /// Both sides changed since the last common ancestor.
    ConcurrentConflict,
}

/// Classifies the relationship between a local record and a remote revision.
///
/// Pure and deterministic: the result depends only on the two version
/// counters, the local pending-edit flag, and the payload digests. Clock skew
/// never influences the outcome; timestamps are display-only.
///
/// `local_digest` is the digest of the locally stored payload, when one
/// exists. It is only consulted to short-circuit the already-in-sync case.
#[must_use]
pub fn classify(
    local: &SyncStatusRecord,
    local_digest: Option<PayloadDigest>,
    remote: &RemoteRevision,
) -> SyncClassification {
    let pending_local = local.has_pending_local_edit();

    if remote.version > local.version {
        if pending_local {
            return SyncClassification::ConcurrentConflict;
        }
        return SyncClassification::RemoteAhead;
    }

    // remote.version <= local.version from here on.
    if remote.version == local.version
        && !pending_local
        && local_digest == Some(remote.payload_digest())
    {
        return SyncClassification::InSync;
    }

    // Local holds the newer counter, or the same counter with an unpushed
    // edit or divergent bytes; either way local must (re-)push.
    SyncClassification::LocalAhead
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{SyncState, SyncStatusRecord};
    use proptest::prelude::*;

    fn record(version: u64, state: SyncState) -> SyncStatusRecord {
        SyncStatusRecord {
            key: EntityKey::new("e1", "goal"),
            state,
            version: Version::new(version),
            modified_at: 1_000,
            last_sync_attempt: None,
            retry_count: 0,
            failure_reason: None,
        }
    }

    fn remote(version: u64, payload: &[u8]) -> RemoteRevision {
        RemoteRevision {
            key: EntityKey::new("e1", "goal"),
            version: Version::new(version),
            modified_at: 2_000,
            payload: payload.to_vec(),
            deleted: false,
        }
    }

    #[test]
    fn identical_versions_and_bytes_are_in_sync() {
        let local = record(2, SyncState::Synced);
        let rev = remote(2, b"same");
        let digest = Some(PayloadDigest::of(b"same"));
        assert_eq!(classify(&local, digest, &rev), SyncClassification::InSync);
    }

    #[test]
    fn remote_ahead_with_clean_local() {
        let local = record(2, SyncState::Synced);
        let rev = remote(5, b"newer");
        assert_eq!(
            classify(&local, Some(PayloadDigest::of(b"old")), &rev),
            SyncClassification::RemoteAhead
        );
    }

    #[test]
    fn pending_local_edit_and_newer_remote_is_concurrent() {
        let local = record(3, SyncState::PendingUpload);
        let rev = remote(5, b"theirs");
        assert_eq!(
            classify(&local, Some(PayloadDigest::of(b"ours")), &rev),
            SyncClassification::ConcurrentConflict
        );
    }

    #[test]
    fn local_ahead_when_local_counter_is_newer() {
        let local = record(7, SyncState::PendingUpload);
        let rev = remote(5, b"theirs");
        assert_eq!(
            classify(&local, Some(PayloadDigest::of(b"ours")), &rev),
            SyncClassification::LocalAhead
        );
    }

    #[test]
    fn equal_versions_with_divergent_bytes_require_repush() {
        let local = record(2, SyncState::Synced);
        let rev = remote(2, b"theirs");
        assert_eq!(
            classify(&local, Some(PayloadDigest::of(b"ours")), &rev),
            SyncClassification::LocalAhead
        );
    }

    #[test]
    fn timestamps_never_break_ties() {
        let local = record(3, SyncState::PendingUpload);
        let mut rev = remote(5, b"theirs");

        // An older remote timestamp must not demote a concurrent conflict.
        rev.modified_at = 0;
        assert_eq!(
            classify(&local, Some(PayloadDigest::of(b"ours")), &rev),
            SyncClassification::ConcurrentConflict
        );
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(
            local_version in 0u64..100,
            remote_version in 0u64..100,
            pending in any::<bool>(),
        ) {
            let state = if pending {
                SyncState::PendingUpload
            } else {
                SyncState::Synced
            };
            let local = record(local_version, state);
            let rev = remote(remote_version, b"payload");
            let digest = Some(PayloadDigest::of(b"payload"));

            let first = classify(&local, digest, &rev);
            for _ in 0..10 {
                prop_assert_eq!(classify(&local, digest, &rev), first);
            }
        }

        #[test]
        fn newer_remote_over_pending_edit_always_conflicts(
            local_version in 0u64..100,
            ahead in 1u64..100,
        ) {
            let local = record(local_version, SyncState::PendingUpload);
            let rev = remote(local_version + ahead, b"theirs");
            prop_assert_eq!(
                classify(&local, Some(PayloadDigest::of(b"ours")), &rev),
                SyncClassification::ConcurrentConflict
            );
        }
    }
}
