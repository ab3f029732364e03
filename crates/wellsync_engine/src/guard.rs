//! Per-user single-flight pass guard.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Tracks which users currently have a sync pass in flight.
///
/// At most one pass may run per user; overlapping passes for the same user
/// would race on the same ledger rows. Passes for different users share no
/// mutable state and run fully in parallel. Share one registry across every
/// engine in the process.
#[derive(Debug, Clone, Default)]
pub struct PassRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl PassRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the pass slot for a user.
    ///
    /// # Errors
    ///
    /// Fails with [`SyncError::PassInProgress`] if a pass for this user is
    /// already in flight. The slot is released when the returned guard drops,
    /// including on early return and panic unwind.
    pub fn acquire(&self, user: &str) -> SyncResult<PassGuard> {
        let mut active = self.active.lock();
        if !active.insert(user.to_string()) {
            return Err(SyncError::PassInProgress {
                user: user.to_string(),
            });
        }

        Ok(PassGuard {
            user: user.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    /// Returns true if a pass is in flight for the user.
    #[must_use]
    pub fn is_active(&self, user: &str) -> bool {
        self.active.lock().contains(user)
    }
}

/// RAII guard holding one user's pass slot.
#[derive(Debug)]
pub struct PassGuard {
    user: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.user);
    }
}
