//! WellSync CLI
//!
//! Command-line tools for inspecting and repairing sync ledgers.
//!
//! # Commands
//!
//! - `status` - Summarize the ledger by sync state
//! - `inspect` - List individual ledger records
//! - `conflicts` - List entities stuck in conflict
//! - `retry` - Re-queue failed entities for upload

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// WellSync command-line ledger tools.
#[derive(Parser)]
#[command(name = "wellsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the ledger file
    #[arg(global = true, short, long)]
    ledger: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the ledger by sync state
    Status {
        /// Break counts down by entity kind
        #[arg(short, long)]
        kinds: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List individual ledger records
    Inspect {
        /// Only show the record for this entity id (requires --kind)
        #[arg(short, long)]
        entity: Option<String>,

        /// Only show records for this entity kind
        #[arg(short, long)]
        kind: Option<String>,

        /// Only show records awaiting sync work
        #[arg(short, long)]
        pending: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List entities stuck in conflict
    Conflicts {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Re-queue failed entities for upload
    Retry {
        /// Entity id to retry (all failed records when omitted)
        #[arg(short, long)]
        entity: Option<String>,

        /// Entity kind, required with --entity
        #[arg(short, long)]
        kind: Option<String>,

        /// Dry run - show what would be re-queued
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status { kinds, format } => {
            let path = cli.ledger.ok_or("Ledger path required for status")?;
            commands::status::run(&path, kinds, &format)?;
        }
        Commands::Inspect {
            entity,
            kind,
            pending,
            format,
        } => {
            let path = cli.ledger.ok_or("Ledger path required for inspect")?;
            if entity.is_some() && kind.is_none() {
                return Err("--kind is required with --entity".into());
            }
            commands::inspect::run(&path, entity.as_deref(), kind.as_deref(), pending, &format)?;
        }
        Commands::Conflicts { format } => {
            let path = cli.ledger.ok_or("Ledger path required for conflicts")?;
            commands::conflicts::run(&path, &format)?;
        }
        Commands::Retry {
            entity,
            kind,
            dry_run,
        } => {
            let path = cli.ledger.ok_or("Ledger path required for retry")?;
            if entity.is_some() && kind.is_none() {
                return Err("--kind is required with --entity".into());
            }
            commands::retry::run(&path, entity.as_deref(), kind.as_deref(), dry_run)?;
        }
        Commands::Version => {
            println!("WellSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
