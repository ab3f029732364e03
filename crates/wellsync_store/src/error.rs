//! Error types for the storage layer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in ledger and entity storage.
///
/// Any of these is fatal for an in-flight sync pass: the pass aborts
/// cleanly rather than risk a partial ledger write.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Another process holds the ledger lock.
    #[error("ledger at {path:?} is locked by another process")]
    Locked {
        /// Path of the locked ledger.
        path: PathBuf,
    },

    /// Snapshot encoding failed.
    #[error("snapshot encode error: {0}")]
    Encode(String),

    /// Snapshot decoding failed; the file is truncated or corrupt.
    #[error("snapshot decode error: {0}")]
    Decode(String),
}
