//! Domain-supplied merge functions.

use crate::error::{ModelError, ModelResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A merge function combining a local and a remote payload into one.
///
/// Supplied per entity kind by the domain layer; the sync core only defines
/// the contract. The returned bytes become the reconciled payload.
pub type MergeFn = Arc<dyn Fn(&[u8], &[u8]) -> Result<Vec<u8>, String> + Send + Sync>;

/// Registry mapping entity kinds to merge functions.
///
/// The core ships no merge functions of its own. A `Merged` resolution for an
/// unregistered kind fails with [`ModelError::UnsupportedMerge`] and the
/// conflict stays unresolved; merging never silently falls back to one side.
#[derive(Clone, Default)]
pub struct MergeRegistry {
    merges: Arc<RwLock<HashMap<String, MergeFn>>>,
}

impl MergeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a merge function for an entity kind, replacing any prior one.
    pub fn register<F>(&self, kind: impl Into<String>, merge: F)
    where
        F: Fn(&[u8], &[u8]) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        self.merges.write().insert(kind.into(), Arc::new(merge));
    }

    /// Returns true if a merge function is registered for the kind.
    #[must_use]
    pub fn supports(&self, kind: &str) -> bool {
        self.merges.read().contains_key(kind)
    }

    /// Merges two payloads using the registered function for the kind.
    pub fn merge(&self, kind: &str, local: &[u8], cloud: &[u8]) -> ModelResult<Vec<u8>> {
        let merge = self
            .merges
            .read()
            .get(kind)
            .cloned()
            .ok_or_else(|| ModelError::UnsupportedMerge(kind.to_string()))?;

        merge(local, cloud).map_err(|reason| ModelError::MergeFailed {
            kind: kind.to_string(),
            reason,
        })
    }
}

impl std::fmt::Debug for MergeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<String> = self.merges.read().keys().cloned().collect();
        f.debug_struct("MergeRegistry").field("kinds", &kinds).finish()
    }
}
