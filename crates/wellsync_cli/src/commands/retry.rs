//! Retry command implementation.

use std::path::Path;
use wellsync_model::{EntityKey, SyncState};
use wellsync_store::{FileLedger, LedgerStore};

/// Runs the retry command.
pub fn run(
    path: &Path,
    entity: Option<&str>,
    kind: Option<&str>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = FileLedger::open(path)?;

    let targets = match (entity, kind) {
        (Some(entity), Some(kind)) => {
            let key = EntityKey::new(entity, kind);
            match ledger.get(&key)? {
                Some(record) if record.state == SyncState::Failed => vec![record],
                Some(record) => {
                    return Err(format!(
                        "{} is {:?}, only failed records can be retried",
                        key, record.state
                    )
                    .into());
                }
                None => return Err(format!("no record for {key}").into()),
            }
        }
        _ => ledger.by_state(SyncState::Failed)?,
    };

    if targets.is_empty() {
        println!("Nothing to retry");
        return Ok(());
    }

    for record in targets {
        let key = record.key.clone();
        if dry_run {
            println!("Would re-queue {key} (v{})", record.version.as_u64());
        } else {
            ledger.upsert(record.requeued())?;
            println!("Re-queued {key} for upload");
        }
    }

    Ok(())
}
