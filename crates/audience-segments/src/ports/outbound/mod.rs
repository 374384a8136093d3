//! Outbound ports (Repository traits)
//!
//! Hexagonal architecture: these are the interfaces that infrastructure must implement.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::aggregates::{Segment, Tag};
use crate::domain::services::Membership;
use chrono::{DateTime, Utc};

use crate::domain::value_objects::{EntityId, RecordSnapshot, SegmentStats, TagStats};
use crate::domain::DomainEvent;

/// Tag repository port
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Tag>, RepositoryError>;

    /// All tags in insertion order
    async fn list(&self) -> Result<Vec<Tag>, RepositoryError>;

    /// Insert or update; an update keeps the tag's original position
    async fn save(&self, tag: &Tag) -> Result<(), RepositoryError>;

    /// `RepositoryError::NotFound` when absent
    async fn delete(&self, id: &EntityId) -> Result<(), RepositoryError>;

    /// Swap the whole contents, e.g. when restoring a snapshot
    async fn replace_all(&self, tags: Vec<Tag>) -> Result<(), RepositoryError>;
}

/// Segment repository port
#[async_trait]
pub trait SegmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Segment>, RepositoryError>;

    /// All segments in insertion order
    async fn list(&self) -> Result<Vec<Segment>, RepositoryError>;

    /// Segments labelled with `tag_id`
    async fn find_by_tag(&self, tag_id: &EntityId) -> Result<Vec<Segment>, RepositoryError>;

    async fn save(&self, segment: &Segment) -> Result<(), RepositoryError>;

    /// Apply `bookkeeping` to the stored segment only while its revision is
    /// still `revision`, leaving every other field as stored.
    ///
    /// Returns the updated segment with its pending events, or `None` when
    /// the segment is gone or its definition moved on.
    async fn record_at_revision(
        &self,
        id: &EntityId,
        revision: u64,
        bookkeeping: SegmentBookkeeping,
    ) -> Result<Option<Segment>, RepositoryError>;

    /// `RepositoryError::NotFound` when absent
    async fn delete(&self, id: &EntityId) -> Result<(), RepositoryError>;

    async fn replace_all(&self, segments: Vec<Segment>) -> Result<(), RepositoryError>;
}

/// Derived state written back after a membership run
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentBookkeeping {
    Calculated {
        member_count: usize,
        resolved_at: DateTime<Utc>,
    },
    Stats(SegmentStats),
}

impl SegmentBookkeeping {
    pub fn apply_to(self, segment: &mut Segment) {
        match self {
            Self::Calculated {
                member_count,
                resolved_at,
            } => segment.record_calculation(member_count, resolved_at),
            Self::Stats(stats) => segment.record_stats(stats),
        }
    }
}

/// Read-only access to the candidate customer records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Current immutable snapshot; its version changes with the records
    async fn snapshot(&self) -> Result<RecordSnapshot, RepositoryError>;
}

/// Aggregation collaborator behind `recompute_*_stats`
#[async_trait]
pub trait StatsProvider: Send + Sync {
    async fn tag_stats(&self, tag: &Tag) -> Result<TagStats, RepositoryError>;

    /// `segment.stats()` still holds the previous computation, if any
    async fn segment_stats(
        &self,
        segment: &Segment,
        membership: &Membership,
    ) -> Result<SegmentStats, RepositoryError>;
}

/// Event publisher port
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish domain events
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError>;
}

/// String key-value persistence shim
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    async fn set(&self, key: &str, value: String) -> Result<(), RepositoryError>;

    /// Returns whether the key existed
    async fn remove(&self, key: &str) -> Result<bool, RepositoryError>;
}

/// Repository error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
