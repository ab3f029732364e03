//! File-backed ledger with CBOR snapshot persistence.

use crate::error::{StoreError, StoreResult};
use crate::ledger::LedgerStore;
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use wellsync_model::{EntityKey, SyncState, SyncStatusRecord};

/// A file-backed ledger store.
///
/// The full record set is held in memory and persisted as a CBOR snapshot on
/// every mutation. Snapshots are written to a temporary file in the same
/// directory, synced, and renamed over the live file, so a crash mid-write
/// leaves the previous snapshot intact.
///
/// # Locking
///
/// An advisory exclusive lock is taken on a `<path>.lock` sidecar for the
/// lifetime of the handle. Opening a ledger that another process holds fails
/// with [`StoreError::Locked`].
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    // Held for the advisory lock; never read or written.
    _lock_file: File,
    records: RwLock<HashMap<EntityKey, SyncStatusRecord>>,
}

impl FileLedger {
    /// Opens or creates a file ledger at the given path, creating parent
    /// directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is held elsewhere, the snapshot cannot
    /// be read, or it fails to decode.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let lock_path = lock_path_for(path);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked {
                path: path.to_path_buf(),
            })?;

        let records = if path.exists() {
            let file = File::open(path)?;
            let snapshot: Vec<SyncStatusRecord> = ciborium::de::from_reader(&file)
                .map_err(|e| StoreError::Decode(e.to_string()))?;

            snapshot.into_iter().map(|r| (r.key.clone(), r)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
            records: RwLock::new(records),
        })
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current record set atomically.
    fn persist(&self, records: &HashMap<EntityKey, SyncStatusRecord>) -> StoreResult<()> {
        let snapshot: Vec<&SyncStatusRecord> = records.values().collect();

        let mut buffer = Vec::new();
        ciborium::ser::into_writer(&snapshot, &mut buffer)
            .map_err(|e| StoreError::Encode(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&buffer)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

impl LedgerStore for FileLedger {
    fn upsert(&self, record: SyncStatusRecord) -> StoreResult<()> {
        let mut records = self.records.write();
        records.insert(record.key.clone(), record);
        self.persist(&records)
    }

    fn get(&self, key: &EntityKey) -> StoreResult<Option<SyncStatusRecord>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn by_state(&self, state: SyncState) -> StoreResult<Vec<SyncStatusRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.state == state)
            .cloned()
            .collect())
    }

    fn by_kind(&self, kind: &str) -> StoreResult<Vec<SyncStatusRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.key.kind == kind)
            .cloned()
            .collect())
    }

    fn remove(&self, key: &EntityKey) -> StoreResult<()> {
        let mut records = self.records.write();
        if records.remove(key).is_some() {
            self.persist(&records)?;
        }
        Ok(())
    }

    fn records(&self) -> StoreResult<Vec<SyncStatusRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.records.read().len())
    }
}
