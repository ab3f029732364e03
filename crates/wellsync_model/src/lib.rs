//! # WellSync Model
//!
//! Sync data model and conflict classification for WellSync.
//!
//! This crate provides:
//! - `VersionedEntity` for version-counted entity envelopes
//! - `SyncStatusRecord` for per-entity sync state
//! - `classify` for pure conflict detection
//! - `ConflictRecord` for materialized concurrent divergence
//! - `MergeRegistry` for domain-supplied merge functions
//!
//! This is a pure model crate with no I/O operations. Version counters
//! are authoritative everywhere; timestamps are advisory and never used
//! as tie-breakers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod detect;
mod entity;
mod error;
mod ledger;
mod merge;

pub use conflict::{ConflictId, ConflictRecord, Resolution};
pub use detect::{classify, RemoteRevision, SyncClassification};
pub use entity::{EntityKey, PayloadDigest, Version, VersionedEntity};
pub use error::{ModelError, ModelResult};
pub use ledger::{SyncState, SyncStatusRecord};
pub use merge::{MergeFn, MergeRegistry};
