//! # WellSync Store
//!
//! Ledger and entity storage backends for WellSync.
//!
//! This crate provides:
//! - [`LedgerStore`] - durable CRUD for sync status records
//! - [`MemoryLedger`] - for testing and ephemeral use
//! - [`FileLedger`] - CBOR snapshot persistence with atomic rewrites
//! - [`EntityStore`] / [`MemoryEntityStore`] - versioned entity payloads
//! - [`PreloadCache`] - bounded LRU shadow of already-synced data
//!
//! ## Design Principles
//!
//! - Stores are internally thread-safe but do not order mutations;
//!   the sync orchestrator owns single-writer discipline
//! - Storage failures surface as [`StoreError`], never as silent nulls
//! - A ledger mutation is durable before the call returns

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod entities;
mod error;
mod file;
mod ledger;
mod memory;

pub use cache::{CacheStats, PreloadCache};
pub use entities::{EntityStore, MemoryEntityStore};
pub use error::{StoreError, StoreResult};
pub use file::FileLedger;
pub use ledger::LedgerStore;
pub use memory::MemoryLedger;
