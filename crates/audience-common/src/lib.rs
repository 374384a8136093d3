//! Audience Common - Shared types for the segmentation core
//!
//! This crate provides the primitives every bounded context leans on:
//! - Entity identifiers
//! - Monotonic modification timestamps
//! - Lock-free counters for lightweight telemetry
//! - Configuration and tracing setup
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::*;
pub use error::*;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier value object for entities (tags, segments, records, users)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Next modification timestamp after `previous`.
///
/// Returns the wall clock when it has moved past `previous`, otherwise
/// `previous` plus one microsecond, so `updated_at` always strictly increases.
pub fn advance_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Lock-free counter for telemetry
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create new counter
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Increment and return previous value
    #[inline(always)]
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Add value and return previous
    #[inline(always)]
    pub fn add(&self, val: u64) -> u64 {
        self.0.fetch_add(val, Ordering::Relaxed)
    }

    /// Get current value
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_are_unique() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
        assert_eq!(EntityId::from_string("tag-1").as_str(), "tag-1");
    }

    #[test]
    fn test_entity_id_serializes_as_plain_string() {
        let id = EntityId::from("seg-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"seg-42\"");
    }

    #[test]
    fn test_advance_timestamp_strictly_increases() {
        let far_future = Utc::now() + Duration::days(1);
        let next = advance_timestamp(far_future);
        assert!(next > far_future);

        let past = Utc::now() - Duration::days(1);
        assert!(advance_timestamp(past) > past);
    }

    #[test]
    fn test_atomic_counter() {
        let counter = AtomicCounter::new(0);
        assert_eq!(counter.inc(), 0);
        assert_eq!(counter.add(5), 1);
        assert_eq!(counter.get(), 6);
    }
}
