//! Infrastructure layer
//!
//! Adapters implementing the outbound ports.

pub mod persistence;
mod records;
mod stats;

pub use persistence::*;
pub use records::InMemoryRecordSource;
pub use stats::SnapshotStatsProvider;
