//! Error types for the sync engine.

use thiserror::Error;
use wellsync_model::{ConflictId, ModelError, Version};
use wellsync_store::StoreError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote holds a newer version than the one pushed.
    ///
    /// Not a failure: the orchestrator re-classifies the entity through the
    /// conflict detector instead of surfacing this.
    #[error("remote rejected push, current remote version is {current_remote_version}")]
    RemoteRejected {
        /// The version the remote currently holds.
        current_remote_version: Version,
    },

    /// Local storage failure. Fatal for the current pass.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Model-level failure (invalid version, unsupported merge).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The pass was cancelled between entities.
    #[error("sync pass cancelled")]
    Cancelled,

    /// A pass for this user is already in flight.
    #[error("a sync pass is already running for user {user:?}")]
    PassInProgress {
        /// User whose pass is in flight.
        user: String,
    },

    /// No conflict with this identifier is awaiting resolution.
    #[error("unknown conflict {0}")]
    UnknownConflict(ConflictId),

    /// `Resolution::Unresolved` is not a valid resolution choice.
    #[error("a concrete resolution choice is required")]
    UnresolvedChoice,

    /// The entity has no failed record to retry.
    #[error("entity {0} has no failed record to retry")]
    NothingToRetry(String),

    /// No local entity is stored under this key.
    #[error("unknown entity {0}")]
    UnknownEntity(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried with backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport { retryable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(!SyncError::RemoteRejected {
            current_remote_version: Version::new(5)
        }
        .is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::PassInProgress {
            user: "u1".into(),
        };
        assert!(err.to_string().contains("u1"));

        let err = SyncError::RemoteRejected {
            current_remote_version: Version::new(5),
        };
        assert!(err.to_string().contains("v:5"));
    }

    #[test]
    fn model_errors_pass_through() {
        let err: SyncError = ModelError::UnsupportedMerge("goal".into()).into();
        assert!(err.to_string().contains("goal"));
    }
}
