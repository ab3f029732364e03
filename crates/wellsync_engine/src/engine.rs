//! Sync pass orchestration.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::guard::PassRegistry;
use crate::remote::{PushOutcome, RemoteBackend};
use crate::resolver::{ConflictResolver, ConflictStore, ResolvedConflict};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wellsync_model::{
    classify, ConflictId, ConflictRecord, EntityKey, MergeRegistry, RemoteRevision, Resolution,
    SyncClassification, SyncState, SyncStatusRecord, Version, VersionedEntity,
};
use wellsync_store::{EntityStore, LedgerStore, PreloadCache};

/// Returns the current wall-clock time in unix milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Phase of an in-flight sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// No pass running.
    Idle,
    /// Reading outstanding work from the ledger.
    Enumerating,
    /// Sending local edits to the remote.
    Pushing,
    /// Fetching and applying remote changes.
    Pulling,
    /// Materializing concurrent conflicts for explicit resolution.
    Reconciling,
}

impl PassState {
    /// Returns true if a pass is in flight.
    #[must_use]
    pub fn is_active(self) -> bool {
        self != PassState::Idle
    }
}

/// Counters accumulated across passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed passes.
    pub passes_completed: u64,
    /// Entities pushed successfully.
    pub entities_pushed: u64,
    /// Remote changes applied locally.
    pub entities_pulled: u64,
    /// Conflicts materialized.
    pub conflicts_seen: u64,
    /// Transient-error retries performed.
    pub retries: u64,
    /// Last pass-aborting error.
    pub last_error: Option<String>,
}

/// Result of one full sync pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSummary {
    /// Entities whose push or pull completed.
    pub succeeded: usize,
    /// Entities that diverged and now await resolution.
    pub conflicted: usize,
    /// Entities that exhausted the retry budget this pass.
    pub failed: usize,
    /// Previously failed entities excluded from this pass.
    pub skipped: usize,
    /// Local revisions accepted by the remote.
    pub pushed: usize,
    /// Remote revisions applied locally.
    pub pulled: usize,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
}

/// A concurrent divergence found during push or pull, awaiting the
/// reconcile phase.
struct DetectedConflict {
    record: SyncStatusRecord,
    local: VersionedEntity,
    remote: RemoteRevision,
}

/// The sync engine drives full-sync passes for one user.
///
/// A pass walks `Enumerating → Pushing → Pulling → Reconciling` and returns
/// to `Idle`. Local edits are pushed before remote changes are applied, and
/// an entity with an unpushed edit is never overwritten without running
/// through the conflict detector first. Each entity's ledger transition is
/// committed atomically after its attempt finishes; cancellation takes
/// effect between entities only.
pub struct SyncEngine<R, L, E>
where
    R: RemoteBackend,
    L: LedgerStore,
    E: EntityStore,
{
    config: SyncConfig,
    remote: Arc<R>,
    ledger: Arc<L>,
    entities: Arc<E>,
    cache: Option<Arc<PreloadCache>>,
    resolver: ConflictResolver,
    conflicts: ConflictStore,
    passes: PassRegistry,
    pass_state: RwLock<PassState>,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl<R, L, E> SyncEngine<R, L, E>
where
    R: RemoteBackend,
    L: LedgerStore,
    E: EntityStore,
{
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, remote: R, ledger: Arc<L>, entities: Arc<E>) -> Self {
        Self {
            config,
            remote: Arc::new(remote),
            ledger,
            entities,
            cache: None,
            resolver: ConflictResolver::default(),
            conflicts: ConflictStore::new(),
            passes: PassRegistry::new(),
            pass_state: RwLock::new(PassState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Attaches a preload cache to refresh as entities sync.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<PreloadCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Supplies domain merge functions for `Merged` resolutions.
    #[must_use]
    pub fn with_merges(mut self, merges: MergeRegistry) -> Self {
        self.resolver = ConflictResolver::new(merges);
        self
    }

    /// Shares a pass registry across engines in the process.
    #[must_use]
    pub fn with_pass_registry(mut self, passes: PassRegistry) -> Self {
        self.passes = passes;
        self
    }

    /// The remote backend.
    #[must_use]
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The sync status ledger.
    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The local entity store.
    #[must_use]
    pub fn entities(&self) -> &E {
        &self.entities
    }

    /// Current pass phase.
    #[must_use]
    pub fn pass_state(&self) -> PassState {
        *self.pass_state.read()
    }

    /// Accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Requests cancellation of the in-flight pass. Takes effect between
    /// entities; the current entity finishes its atomic ledger update.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_pass_state(&self, state: PassState) {
        *self.pass_state.write() = state;
    }

    /// Records a local edit, bumping the entity into `PendingUpload`.
    ///
    /// The envelope must be a legal successor of the stored revision (or
    /// version 1 for a new entity); gaps and reuse are rejected with
    /// an invalid-version error rather than silently accepted.
    pub fn record_local_edit(&self, entity: VersionedEntity) -> SyncResult<SyncStatusRecord> {
        match self.entities.get(&entity.key)? {
            Some(current) => current.check_successor(&entity)?,
            None => {
                if entity.version != Version::new(1) {
                    return Err(wellsync_model::ModelError::InvalidVersion {
                        expected: 1,
                        got: entity.version.as_u64(),
                    }
                    .into());
                }
            }
        }

        let record = SyncStatusRecord::pending_upload(
            entity.key.clone(),
            entity.version,
            entity.modified_at,
        );
        self.entities.put(entity)?;
        self.ledger.upsert(record.clone())?;
        if let Some(cache) = &self.cache {
            cache.invalidate(&record.key);
        }
        Ok(record)
    }

    /// Records a local deletion as a tombstone awaiting upload.
    pub fn record_local_delete(&self, key: &EntityKey, now: i64) -> SyncResult<SyncStatusRecord> {
        let current = self
            .entities
            .get(key)?
            .ok_or_else(|| SyncError::UnknownEntity(key.to_string()))?;

        let tombstone = current.tombstone(now);
        let record =
            SyncStatusRecord::pending_upload(key.clone(), tombstone.version, tombstone.modified_at);
        self.entities.put(tombstone)?;
        self.ledger.upsert(record.clone())?;
        if let Some(cache) = &self.cache {
            cache.invalidate(key);
        }
        Ok(record)
    }

    /// Runs one full sync pass.
    ///
    /// # Errors
    ///
    /// Fails fast on a concurrent pass for the same user, on cancellation,
    /// on storage failures, and on terminal transport failures during the
    /// pull phase. Per-entity push failures do not abort the pass; they are
    /// reported in the summary.
    pub fn run_pass(&self) -> SyncResult<SyncSummary> {
        let _guard = self.passes.acquire(&self.config.user_id)?;
        self.cancelled.store(false, Ordering::SeqCst);

        let start = Instant::now();
        info!(
            user = %self.config.user_id,
            device = %self.config.device_id,
            "starting sync pass"
        );

        let result = self.run_phases();
        self.set_pass_state(PassState::Idle);

        match result {
            Ok(mut summary) => {
                summary.duration = start.elapsed();
                let mut stats = self.stats.write();
                stats.passes_completed += 1;
                stats.entities_pushed += summary.pushed as u64;
                stats.entities_pulled += summary.pulled as u64;
                stats.conflicts_seen += summary.conflicted as u64;
                stats.last_error = None;
                info!(
                    user = %self.config.user_id,
                    succeeded = summary.succeeded,
                    conflicted = summary.conflicted,
                    failed = summary.failed,
                    "sync pass finished"
                );
                Ok(summary)
            }
            Err(e) => {
                self.stats.write().last_error = Some(e.to_string());
                warn!(user = %self.config.user_id, error = %e, "sync pass aborted");
                Err(e)
            }
        }
    }

    fn run_phases(&self) -> SyncResult<SyncSummary> {
        let mut summary = SyncSummary::default();
        let mut conflicts: Vec<DetectedConflict> = Vec::new();

        // Enumerate outstanding work. Failed records are excluded from
        // automatic passes until explicitly retried.
        self.set_pass_state(PassState::Enumerating);
        let uploads = self.ledger.by_state(SyncState::PendingUpload)?;
        let downloads = self.ledger.by_state(SyncState::PendingDownload)?;
        summary.skipped = self.ledger.by_state(SyncState::Failed)?.len();
        debug!(
            uploads = uploads.len(),
            downloads = downloads.len(),
            skipped = summary.skipped,
            "enumerated ledger"
        );

        self.set_pass_state(PassState::Pushing);
        for record in uploads {
            self.check_cancelled()?;
            self.push_one(record, &mut summary, &mut conflicts)?;
        }

        self.set_pass_state(PassState::Pulling);
        for record in downloads {
            self.check_cancelled()?;
            if let Some(revision) = self.remote.fetch(&record.key)? {
                self.apply_remote(revision, &mut summary, &mut conflicts)?;
            }
        }
        for kind in &self.config.kinds {
            self.check_cancelled()?;
            let changes = self.pull_with_retry(kind)?;
            for revision in changes {
                self.check_cancelled()?;
                self.apply_remote(revision, &mut summary, &mut conflicts)?;
            }
        }

        self.set_pass_state(PassState::Reconciling);
        let now = now_millis();
        for detected in conflicts {
            info!(entity = %detected.record.key, "materializing conflict");
            let conflict = ConflictRecord::new(
                detected.record.key.clone(),
                detected.local.version,
                detected.remote.version,
                detected.local.payload,
                detected.remote.payload,
                now,
            );
            self.conflicts.upsert(conflict);
            self.ledger.upsert(detected.record.conflicted(now))?;
            summary.conflicted += 1;
        }

        Ok(summary)
    }

    /// Pushes one pending upload, retrying transient transport errors with
    /// backoff. The ledger transition for the entity is written exactly once.
    fn push_one(
        &self,
        record: SyncStatusRecord,
        summary: &mut SyncSummary,
        conflicts: &mut Vec<DetectedConflict>,
    ) -> SyncResult<()> {
        let Some(envelope) = self.entities.get(&record.key)? else {
            let now = now_millis();
            self.ledger
                .upsert(record.failed("local payload missing", now, 0))?;
            summary.failed += 1;
            return Ok(());
        };

        let mut attempt: u32 = 0;
        loop {
            debug!(entity = %record.key, version = %envelope.version, attempt, "pushing entity");
            match self.remote.push_entity(&envelope) {
                Ok(PushOutcome::Accepted) => {
                    let now = now_millis();
                    if envelope.deleted {
                        // Deletion fully propagated; retire the entity.
                        self.entities.remove(&record.key)?;
                        self.ledger.remove(&record.key)?;
                    } else {
                        self.ledger
                            .upsert(record.clone().synced(envelope.version, now))?;
                    }
                    self.refresh_cache(&envelope);
                    summary.succeeded += 1;
                    summary.pushed += 1;
                    return Ok(());
                }
                Ok(PushOutcome::Rejected {
                    current_remote_version,
                })
                | Err(SyncError::RemoteRejected {
                    current_remote_version,
                }) => {
                    debug!(
                        entity = %record.key,
                        remote_version = %current_remote_version,
                        "push rejected, re-classifying"
                    );
                    self.reclassify_rejected(record, envelope, conflicts)?;
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.config.retry.max_attempts => {
                    attempt += 1;
                    self.stats.write().retries += 1;
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    warn!(entity = %record.key, error = %e, ?delay, "transient push failure, retrying");
                    std::thread::sleep(delay);
                }
                Err(SyncError::Store(e)) => return Err(SyncError::Store(e)),
                Err(e) => {
                    // Retry budget exhausted, or the error is not retryable.
                    let now = now_millis();
                    self.ledger
                        .upsert(record.failed(e.to_string(), now, attempt + 1))?;
                    summary.failed += 1;
                    return Ok(());
                }
            }
        }
    }

    /// Re-runs a rejected push through the conflict detector.
    fn reclassify_rejected(
        &self,
        record: SyncStatusRecord,
        envelope: VersionedEntity,
        conflicts: &mut Vec<DetectedConflict>,
    ) -> SyncResult<()> {
        let Some(revision) = self.remote.fetch(&record.key)? else {
            // The remote rejected but has nothing to show; try again next pass.
            return Ok(());
        };

        match classify(&record, Some(envelope.payload_digest()), &revision) {
            SyncClassification::ConcurrentConflict => {
                conflicts.push(DetectedConflict {
                    record,
                    local: envelope,
                    remote: revision,
                });
            }
            // Still ahead of (or equal to) the remote; the record stays
            // pending and the next pass pushes again.
            _ => {}
        }
        Ok(())
    }

    /// Classifies one remote revision against the ledger and applies it when
    /// safe. A pending local edit is never overwritten here; divergences are
    /// deferred to the reconcile phase.
    fn apply_remote(
        &self,
        revision: RemoteRevision,
        summary: &mut SyncSummary,
        conflicts: &mut Vec<DetectedConflict>,
    ) -> SyncResult<()> {
        let now = now_millis();

        // A divergence found during push already covers this entity.
        if conflicts.iter().any(|c| c.record.key == revision.key) {
            return Ok(());
        }

        let Some(record) = self.ledger.get(&revision.key)? else {
            // First sight of a remote entity: apply directly.
            if revision.deleted {
                return Ok(());
            }
            let entity = VersionedEntity::from_remote(
                revision.key.clone(),
                revision.version,
                revision.modified_at,
                revision.payload.clone(),
                false,
            );
            self.entities.put(entity.clone())?;
            self.ledger.upsert(SyncStatusRecord {
                key: revision.key.clone(),
                state: SyncState::Synced,
                version: revision.version,
                modified_at: revision.modified_at,
                last_sync_attempt: Some(now),
                retry_count: 0,
                failure_reason: None,
            })?;
            self.refresh_cache(&entity);
            summary.succeeded += 1;
            summary.pulled += 1;
            return Ok(());
        };

        if record.state == SyncState::Failed {
            // Excluded until explicitly retried.
            return Ok(());
        }

        if record.state == SyncState::Conflict && self.conflicts.for_key(&revision.key).is_some() {
            // Already materialized and awaiting resolution.
            return Ok(());
        }

        // A pending download announces a remote change at or past the
        // recorded version. The detector reads the equal-version case as
        // local-ahead, so apply the fetched revision directly.
        if record.state == SyncState::PendingDownload && revision.version >= record.version {
            return self.apply_revision(record, revision, summary, now);
        }

        let local_digest = self
            .entities
            .get(&revision.key)?
            .map(|e| e.payload_digest());

        match classify(&record, local_digest, &revision) {
            SyncClassification::InSync | SyncClassification::LocalAhead => Ok(()),
            SyncClassification::RemoteAhead => self.apply_revision(record, revision, summary, now),
            SyncClassification::ConcurrentConflict => {
                let local = self.entities.get(&revision.key)?.unwrap_or_else(|| {
                    // Ledger says pending but the payload is gone; treat the
                    // local side as an empty tombstone revision.
                    VersionedEntity {
                        key: revision.key.clone(),
                        version: record.version,
                        modified_at: record.modified_at,
                        payload: Vec::new(),
                        deleted: true,
                    }
                });
                conflicts.push(DetectedConflict {
                    record,
                    local,
                    remote: revision,
                });
                Ok(())
            }
        }
    }

    /// Applies one remote revision to the entity store and commits the
    /// ledger transition.
    fn apply_revision(
        &self,
        record: SyncStatusRecord,
        revision: RemoteRevision,
        summary: &mut SyncSummary,
        now: i64,
    ) -> SyncResult<()> {
        if revision.deleted {
            debug!(entity = %revision.key, "applying remote tombstone");
            self.entities.remove(&revision.key)?;
            self.ledger.remove(&revision.key)?;
            if let Some(cache) = &self.cache {
                cache.invalidate(&revision.key);
            }
        } else {
            debug!(entity = %revision.key, version = %revision.version, "applying remote revision");
            let entity = VersionedEntity::from_remote(
                revision.key,
                revision.version,
                revision.modified_at,
                revision.payload,
                false,
            );
            self.entities.put(entity.clone())?;
            self.ledger.upsert(record.synced(entity.version, now))?;
            self.refresh_cache(&entity);
        }
        summary.succeeded += 1;
        summary.pulled += 1;
        Ok(())
    }

    /// Pulls one kind's changes, retrying transient errors. Terminal
    /// transport failure aborts the pass.
    fn pull_with_retry(&self, kind: &str) -> SyncResult<Vec<RemoteRevision>> {
        let mut attempt: u32 = 0;
        loop {
            debug!(kind, attempt, "pulling changes");
            // Version counters are per entity, so no single cursor orders a
            // whole kind; pull the full listing and let classification skip
            // the entities that are already in sync.
            match self.remote.pull_changes(kind, Version::new(0)) {
                Ok(changes) => return Ok(changes),
                Err(e) if e.is_retryable() && attempt + 1 < self.config.retry.max_attempts => {
                    attempt += 1;
                    self.stats.write().retries += 1;
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    warn!(kind, error = %e, ?delay, "transient pull failure, retrying");
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn refresh_cache(&self, entity: &VersionedEntity) {
        let Some(cache) = &self.cache else {
            return;
        };
        if entity.deleted {
            cache.invalidate(&entity.key);
        } else {
            cache.insert(entity.key.clone(), entity.payload.clone());
        }
    }

    /// Returns all conflicts awaiting resolution, oldest first.
    #[must_use]
    pub fn list_unresolved_conflicts(&self) -> Vec<ConflictRecord> {
        self.conflicts.unresolved()
    }

    /// Resolves a conflict with an explicit choice.
    ///
    /// Produces exactly one ledger transition and consumes the conflict
    /// record. On failure (unsupported merge, storage error) the conflict is
    /// retained unresolved.
    pub fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        choice: Resolution,
    ) -> SyncResult<SyncStatusRecord> {
        let conflict = self
            .conflicts
            .take(conflict_id)
            .ok_or(SyncError::UnknownConflict(conflict_id))?;

        let now = now_millis();
        let resolved = match self.resolver.resolve(&conflict, choice, now) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.conflicts.upsert(conflict);
                return Err(e);
            }
        };

        match self.commit_resolution(&resolved, now) {
            Ok(record) => {
                info!(entity = %record.key, resolution = ?choice, version = %record.version, "conflict resolved");
                Ok(record)
            }
            Err(e) => {
                self.conflicts.upsert(conflict);
                Err(e)
            }
        }
    }

    fn commit_resolution(
        &self,
        resolved: &ResolvedConflict,
        now: i64,
    ) -> SyncResult<SyncStatusRecord> {
        self.entities.put(resolved.entity.clone())?;

        let record = match resolved.state {
            SyncState::Synced => {
                self.refresh_cache(&resolved.entity);
                SyncStatusRecord {
                    key: resolved.entity.key.clone(),
                    state: SyncState::Synced,
                    version: resolved.entity.version,
                    modified_at: now,
                    last_sync_attempt: Some(now),
                    retry_count: 0,
                    failure_reason: None,
                }
            }
            _ => {
                if let Some(cache) = &self.cache {
                    cache.invalidate(&resolved.entity.key);
                }
                SyncStatusRecord::pending_upload(
                    resolved.entity.key.clone(),
                    resolved.entity.version,
                    now,
                )
            }
        };

        self.ledger.upsert(record.clone())?;
        Ok(record)
    }

    /// Re-queues a failed record for upload.
    pub fn retry_failed(&self, key: &EntityKey) -> SyncResult<SyncStatusRecord> {
        let record = self
            .ledger
            .get(key)?
            .filter(|r| r.state == SyncState::Failed)
            .ok_or_else(|| SyncError::NothingToRetry(key.to_string()))?;

        let requeued = record.requeued();
        self.ledger.upsert(requeued.clone())?;
        Ok(requeued)
    }
}
