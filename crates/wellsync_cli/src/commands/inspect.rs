//! Inspect command implementation.

use serde::Serialize;
use std::path::Path;
use wellsync_model::SyncStatusRecord;
use wellsync_store::{FileLedger, LedgerStore};

/// One ledger record as shown to the operator.
#[derive(Debug, Serialize)]
pub struct RecordView {
    /// Entity id.
    pub entity_id: String,
    /// Entity kind.
    pub kind: String,
    /// Sync state code name.
    pub state: String,
    /// Local version counter.
    pub version: u64,
    /// Last local modification, unix millis.
    pub modified_at: i64,
    /// Last sync attempt, unix millis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_attempt: Option<i64>,
    /// Retries consumed so far.
    pub retry_count: u32,
    /// Failure reason, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<&SyncStatusRecord> for RecordView {
    fn from(record: &SyncStatusRecord) -> Self {
        Self {
            entity_id: record.key.entity_id.clone(),
            kind: record.key.kind.clone(),
            state: format!("{:?}", record.state),
            version: record.version.as_u64(),
            modified_at: record.modified_at,
            last_sync_attempt: record.last_sync_attempt,
            retry_count: record.retry_count,
            failure_reason: record.failure_reason.clone(),
        }
    }
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    entity: Option<&str>,
    kind: Option<&str>,
    pending_only: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = FileLedger::open(path)?;

    let mut records = match kind {
        Some(kind) => ledger.by_kind(kind)?,
        None => ledger.records()?,
    };
    if let Some(entity) = entity {
        records.retain(|r| r.key.entity_id == entity);
    }
    if pending_only {
        records.retain(|r| r.state.needs_sync());
    }
    records.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));

    let views: Vec<RecordView> = records.iter().map(RecordView::from).collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        _ => {
            if views.is_empty() {
                println!("No matching records");
                return Ok(());
            }
            for view in &views {
                print!(
                    "{}/{}  v{}  {}",
                    view.kind, view.entity_id, view.version, view.state
                );
                if view.retry_count > 0 {
                    print!("  retries={}", view.retry_count);
                }
                if let Some(reason) = &view.failure_reason {
                    print!("  reason={reason:?}");
                }
                println!();
            }
        }
    }

    Ok(())
}
