//! Status command implementation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use wellsync_model::SyncState;
use wellsync_store::{FileLedger, LedgerStore};

/// Ledger state summary.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    /// Ledger file path.
    pub path: String,
    /// Total number of tracked entities.
    pub total: usize,
    /// Entities waiting to be uploaded.
    pub pending_upload: usize,
    /// Entities waiting for a remote fetch.
    pub pending_download: usize,
    /// Entities in sync with the remote.
    pub synced: usize,
    /// Entities awaiting conflict resolution.
    pub conflict: usize,
    /// Entities that exhausted their retry budget.
    pub failed: usize,
    /// Per-kind breakdown (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<KindStats>>,
}

/// Counts for a single entity kind.
#[derive(Debug, Serialize)]
pub struct KindStats {
    /// Entity kind.
    pub kind: String,
    /// Tracked entities of this kind.
    pub total: usize,
    /// Entities of this kind awaiting sync work.
    pub pending: usize,
}

/// Runs the status command.
pub fn run(path: &Path, show_kinds: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = FileLedger::open(path)?;
    let records = ledger.records()?;

    let mut result = StatusResult {
        path: path.display().to_string(),
        total: records.len(),
        pending_upload: 0,
        pending_download: 0,
        synced: 0,
        conflict: 0,
        failed: 0,
        kinds: None,
    };

    let mut by_kind: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for record in &records {
        match record.state {
            SyncState::PendingUpload => result.pending_upload += 1,
            SyncState::PendingDownload => result.pending_download += 1,
            SyncState::Synced => result.synced += 1,
            SyncState::Conflict => result.conflict += 1,
            SyncState::Failed => result.failed += 1,
        }
        if show_kinds {
            let entry = by_kind.entry(record.key.kind.clone()).or_insert((0, 0));
            entry.0 += 1;
            if record.state.needs_sync() {
                entry.1 += 1;
            }
        }
    }

    if show_kinds {
        result.kinds = Some(
            by_kind
                .into_iter()
                .map(|(kind, (total, pending))| KindStats {
                    kind,
                    total,
                    pending,
                })
                .collect(),
        );
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &StatusResult) {
    println!("WellSync Ledger Status");
    println!("======================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Entities: {}", result.total);
    println!("  Pending upload:   {}", result.pending_upload);
    println!("  Pending download: {}", result.pending_download);
    println!("  Synced:           {}", result.synced);
    println!("  Conflict:         {}", result.conflict);
    println!("  Failed:           {}", result.failed);

    if let Some(kinds) = &result.kinds {
        println!();
        println!("Kinds:");
        for stats in kinds {
            println!(
                "  {} - {} entities, {} pending",
                stats.kind, stats.total, stats.pending
            );
        }
    }
}
