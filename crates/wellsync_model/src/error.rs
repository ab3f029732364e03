//! Error types for the model crate.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors produced by the sync data model.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A write attempted to reuse or skip a version counter.
    #[error("invalid version: expected v:{expected}, got v:{got}")]
    InvalidVersion {
        /// The version the entity was required to carry.
        expected: u64,
        /// The version the caller supplied.
        got: u64,
    },

    /// No merge function is registered for this entity kind.
    #[error("no merge function registered for kind {0:?}")]
    UnsupportedMerge(String),

    /// A merge function rejected the payload pair.
    #[error("merge failed for kind {kind:?}: {reason}")]
    MergeFailed {
        /// Entity kind whose merge function failed.
        kind: String,
        /// Reason reported by the merge function.
        reason: String,
    },

    /// A resolution was applied to a conflict that is already resolved.
    #[error("conflict already resolved as {0:?}")]
    AlreadyResolved(crate::Resolution),
}
