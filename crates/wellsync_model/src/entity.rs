//! Versioned entity envelope.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Monotonic revision counter for a syncable entity.
///
/// Versions are strictly increasing per entity and never reused. They are
/// authoritative for conflict classification; modification timestamps are
/// advisory only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Version(pub u64);

impl Version {
    /// Creates a new version.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next version.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v:{}", self.0)
    }
}

/// SHA-256 digest of an entity payload.
///
/// Used by the conflict detector to short-circuit when both sides already
/// hold identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadDigest(pub [u8; 32]);

impl PayloadDigest {
    /// Computes the digest of a payload.
    #[must_use]
    pub fn of(payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        Self(hasher.finalize().into())
    }
}

/// Composite identity of a syncable entity, stable across devices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Unique entity identifier.
    pub entity_id: String,
    /// Entity kind discriminator (e.g. `"goal"`, `"cost_budget"`).
    pub kind: String,
}

impl EntityKey {
    /// Creates a new entity key.
    pub fn new(entity_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.entity_id)
    }
}

/// A version-counted envelope around an opaque domain payload.
///
/// Every local mutation must go through [`VersionedEntity::revised`], which
/// bumps the version by exactly one. Remote-origin writes enter through
/// [`VersionedEntity::from_remote`] and keep the remote's version verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedEntity {
    /// Entity identity.
    pub key: EntityKey,
    /// Current revision.
    pub version: Version,
    /// Last modification time, unix milliseconds. Advisory only.
    pub modified_at: i64,
    /// Opaque domain payload. Empty for tombstones.
    pub payload: Vec<u8>,
    /// Tombstone flag: the entity was deleted and the deletion still
    /// propagates through sync.
    pub deleted: bool,
}

impl VersionedEntity {
    /// Creates the first revision of a locally created entity.
    pub fn created(key: EntityKey, payload: Vec<u8>, now: i64) -> Self {
        Self {
            key,
            version: Version::new(1),
            modified_at: now,
            payload,
            deleted: false,
        }
    }

    /// Produces the next local revision with a new payload.
    ///
    /// The version is bumped by exactly one; `(entity, version)` pairs are
    /// never reused from the same origin.
    #[must_use]
    pub fn revised(&self, payload: Vec<u8>, now: i64) -> Self {
        Self {
            key: self.key.clone(),
            version: self.version.next(),
            modified_at: now,
            payload,
            deleted: false,
        }
    }

    /// Produces a local tombstone revision.
    #[must_use]
    pub fn tombstone(&self, now: i64) -> Self {
        Self {
            key: self.key.clone(),
            version: self.version.next(),
            modified_at: now,
            payload: Vec::new(),
            deleted: true,
        }
    }

    /// Wraps a remote-origin revision without renumbering it.
    pub fn from_remote(
        key: EntityKey,
        version: Version,
        modified_at: i64,
        payload: Vec<u8>,
        deleted: bool,
    ) -> Self {
        Self {
            key,
            version,
            modified_at,
            payload,
            deleted,
        }
    }

    /// Validates that `candidate` is a legal successor of this revision.
    ///
    /// A local write that skips or reuses a counter is a programming error
    /// in the caller and is rejected with [`ModelError::InvalidVersion`].
    pub fn check_successor(&self, candidate: &VersionedEntity) -> ModelResult<()> {
        let expected = self.version.next();
        if candidate.version != expected {
            return Err(ModelError::InvalidVersion {
                expected: expected.as_u64(),
                got: candidate.version.as_u64(),
            });
        }
        Ok(())
    }

    /// Returns the SHA-256 digest of the payload.
    #[must_use]
    pub fn payload_digest(&self) -> PayloadDigest {
        PayloadDigest::of(&self.payload)
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entity() -> VersionedEntity {
        VersionedEntity::created(EntityKey::new("e1", "goal"), vec![1, 2, 3], 1_000)
    }

    #[test]
    fn created_starts_at_version_one() {
        let e = entity();
        assert_eq!(e.version, Version::new(1));
        assert!(!e.deleted);
    }

    #[test]
    fn revised_bumps_by_exactly_one() {
        let e = entity();
        let r = e.revised(vec![4], 2_000);
        assert_eq!(r.version, Version::new(2));
        assert_eq!(r.modified_at, 2_000);
        assert_eq!(r.payload, vec![4]);
    }

    #[test]
    fn tombstone_bumps_and_clears_payload() {
        let e = entity();
        let t = e.tombstone(3_000);
        assert!(t.deleted);
        assert!(t.payload.is_empty());
        assert_eq!(t.version, Version::new(2));
    }

    #[test]
    fn check_successor_rejects_skips_and_reuse() {
        let e = entity();
        let good = e.revised(vec![9], 2_000);
        assert!(e.check_successor(&good).is_ok());

        let mut skipped = good.clone();
        skipped.version = Version::new(5);
        assert!(matches!(
            e.check_successor(&skipped),
            Err(ModelError::InvalidVersion {
                expected: 2,
                got: 5
            })
        ));

        let mut reused = good;
        reused.version = e.version;
        assert!(e.check_successor(&reused).is_err());
    }

    #[test]
    fn from_remote_keeps_remote_version() {
        let e = VersionedEntity::from_remote(
            EntityKey::new("e2", "goal"),
            Version::new(17),
            9_000,
            vec![7],
            false,
        );
        assert_eq!(e.version, Version::new(17));
    }

    #[test]
    fn digest_tracks_payload() {
        let a = entity();
        let b = a.revised(a.payload.clone(), 2_000);
        assert_eq!(a.payload_digest(), b.payload_digest());

        let c = a.revised(vec![0xFF], 2_000);
        assert_ne!(a.payload_digest(), c.payload_digest());
    }

    #[test]
    fn display_formats() {
        assert_eq!(Version::new(3).to_string(), "v:3");
        assert_eq!(EntityKey::new("abc", "meal").to_string(), "meal/abc");
    }

    proptest! {
        #[test]
        fn sequential_revisions_have_no_gaps(n in 1usize..50) {
            let mut e = entity();
            let start = e.version.as_u64();
            for i in 0..n {
                let next = e.revised(vec![i as u8], 1_000 + i as i64);
                prop_assert_eq!(next.version.as_u64(), e.version.as_u64() + 1);
                e = next;
            }
            prop_assert_eq!(e.version.as_u64(), start + n as u64);
        }
    }
}
