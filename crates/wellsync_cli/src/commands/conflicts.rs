//! Conflicts command implementation.

use std::path::Path;
use wellsync_model::SyncState;
use wellsync_store::{FileLedger, LedgerStore};

use super::inspect::RecordView;

/// Runs the conflicts command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = FileLedger::open(path)?;
    let mut records = ledger.by_state(SyncState::Conflict)?;
    records.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));

    let views: Vec<RecordView> = records.iter().map(RecordView::from).collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        _ => {
            if views.is_empty() {
                println!("No conflicts");
                return Ok(());
            }
            println!("{} entities awaiting resolution:", views.len());
            for view in &views {
                println!("  {}/{}  local v{}", view.kind, view.entity_id, view.version);
            }
        }
    }

    Ok(())
}
