//! # WellSync Engine
//!
//! Sync orchestrator and conflict resolution engine for WellSync.
//!
//! This crate provides:
//! - Full-sync pass state machine (enumerate → push → pull → reconcile)
//! - Conflict materialization and explicit resolution
//! - Retry with exponential backoff for transient transport errors
//! - Per-user single-flight pass guard
//! - Remote backend abstraction with mock and in-memory implementations
//!
//! ## Architecture
//!
//! A pass enumerates outstanding ledger records, pushes local edits before
//! pulling remote changes, and never applies a remote payload over an
//! unpushed local edit without classifying it first. Concurrent divergences
//! surface as conflict records awaiting an explicit resolution; nothing is
//! resolved implicitly.
//!
//! ## Key Invariants
//!
//! - At most one pass runs per user at a time
//! - Every ledger record transition for an entity is atomic per attempt
//! - Cancellation takes effect between entities, never mid-entity
//! - Terminal failures are surfaced in the pass summary, never swallowed

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod guard;
mod remote;
mod resolver;

pub use config::{RetryConfig, SyncConfig};
pub use engine::{now_millis, PassState, SyncEngine, SyncStats, SyncSummary};
pub use error::{SyncError, SyncResult};
pub use guard::{PassGuard, PassRegistry};
pub use remote::{MemoryRemote, MockRemote, PushOutcome, RemoteBackend};
pub use resolver::{ConflictResolver, ConflictStore, ResolvedConflict};
