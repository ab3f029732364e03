//! Materialized conflicts between local and remote revisions.

use crate::entity::{EntityKey, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a materialized conflict.
pub type ConflictId = Uuid;

/// How a conflict was (or is to be) resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Awaiting an explicit choice.
    Unresolved,
    /// Keep the local payload.
    UseLocal,
    /// Accept the remote payload.
    UseCloud,
    /// Combine both sides through a registered merge function.
    Merged,
}

/// A concurrent divergence captured by the detector.
///
/// Conflict records exist only between detection and resolution: they are
/// consumed and destroyed once a resolution completes. The durable marker is
/// the owning ledger record's `Conflict` state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Conflict identifier.
    pub conflict_id: ConflictId,
    /// Entity identity.
    pub key: EntityKey,
    /// Version of the unpushed local revision.
    pub local_version: Version,
    /// Version reported by the remote.
    pub cloud_version: Version,
    /// Local payload bytes at detection time.
    pub local_payload: Vec<u8>,
    /// Remote payload bytes at detection time.
    pub cloud_payload: Vec<u8>,
    /// Detection time, unix milliseconds.
    pub detected_at: i64,
    /// Resolution state.
    pub resolution: Resolution,
}

impl ConflictRecord {
    /// Materializes a new unresolved conflict.
    pub fn new(
        key: EntityKey,
        local_version: Version,
        cloud_version: Version,
        local_payload: Vec<u8>,
        cloud_payload: Vec<u8>,
        detected_at: i64,
    ) -> Self {
        Self {
            conflict_id: Uuid::new_v4(),
            key,
            local_version,
            cloud_version,
            local_payload,
            cloud_payload,
            detected_at,
            resolution: Resolution::Unresolved,
        }
    }

    /// Returns true if no resolution has been applied yet.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.resolution == Resolution::Unresolved
    }

    /// The smallest version any resolution of this conflict may carry is
    /// one past both divergent revisions.
    #[must_use]
    pub fn resolved_version(&self) -> Version {
        Version::new(
            self.local_version
                .as_u64()
                .max(self.cloud_version.as_u64()),
        )
        .next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict() -> ConflictRecord {
        ConflictRecord::new(
            EntityKey::new("e1", "goal"),
            Version::new(3),
            Version::new(5),
            vec![1],
            vec![2],
            1_000,
        )
    }

    #[test]
    fn new_conflicts_are_unresolved() {
        let c = conflict();
        assert!(c.is_unresolved());
        assert_eq!(c.resolution, Resolution::Unresolved);
    }

    #[test]
    fn resolved_version_exceeds_both_sides() {
        let c = conflict();
        assert_eq!(c.resolved_version(), Version::new(6));
        assert!(c.resolved_version() > c.local_version);
        assert!(c.resolved_version() > c.cloud_version);
    }

    #[test]
    fn conflict_ids_are_unique() {
        assert_ne!(conflict().conflict_id, conflict().conflict_id);
    }
}
