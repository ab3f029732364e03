//! CLI command implementations.

pub mod conflicts;
pub mod inspect;
pub mod retry;
pub mod status;
