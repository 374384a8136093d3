//! Inbound ports (Use case traits)
//!
//! Hexagonal architecture: application service interfaces.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::application::dto::*;
use crate::domain::aggregates::{Segment, SegmentError, Tag, TagError};
use crate::domain::services::{
    DeleteMode, HierarchyError, IntegrityReport, Membership, Preview, TagPath, TagSort,
};
use crate::domain::value_objects::{
    ColorError, ConditionError, ConditionGroup, EntityId, LooseConditionGroup, SegmentStats,
    TagStats,
};
use crate::ports::outbound::RepositoryError;

/// Tag hierarchy use cases
#[async_trait]
pub trait TagUseCases: Send + Sync {
    async fn create_tag(&self, command: CreateTagCommand) -> Result<Tag, UseCaseError>;

    /// Partial update of name, description, color or permissions
    async fn update_tag(&self, command: UpdateTagCommand) -> Result<Tag, UseCaseError>;

    /// Move a tag under another parent, or to the root with `None`
    async fn move_tag(&self, tag_id: &EntityId, parent_id: Option<EntityId>) -> Result<Tag, UseCaseError>;

    /// Returns the ids of every removed tag
    async fn delete_tag(&self, tag_id: &EntityId, mode: DeleteMode) -> Result<Vec<EntityId>, UseCaseError>;

    async fn get_tag(&self, tag_id: &EntityId) -> Result<Option<Tag>, UseCaseError>;

    /// All tags in insertion order
    async fn list_tags(&self) -> Result<Vec<Tag>, UseCaseError>;

    async fn children_of(
        &self,
        parent_id: Option<&EntityId>,
        sort: Option<TagSort>,
    ) -> Result<Vec<Tag>, UseCaseError>;

    async fn path_to(&self, tag_id: &EntityId) -> Result<TagPath, UseCaseError>;

    /// The whole forest as nested nodes
    async fn tag_tree(&self, sort: Option<TagSort>) -> Result<Vec<TagTreeNode>, UseCaseError>;

    async fn integrity_report(&self) -> Result<IntegrityReport, UseCaseError>;

    async fn recompute_tag_stats(&self, tag_id: &EntityId) -> Result<TagStats, UseCaseError>;
}

/// Segment definition and membership use cases
#[async_trait]
pub trait SegmentUseCases: Send + Sync {
    async fn create_segment(&self, command: CreateSegmentCommand) -> Result<Segment, UseCaseError>;

    async fn update_segment(&self, command: UpdateSegmentCommand) -> Result<Segment, UseCaseError>;

    async fn delete_segment(&self, segment_id: &EntityId) -> Result<(), UseCaseError>;

    async fn duplicate_segment(
        &self,
        segment_id: &EntityId,
        name: String,
        created_by: EntityId,
    ) -> Result<Segment, UseCaseError>;

    async fn get_segment(&self, segment_id: &EntityId) -> Result<Option<Segment>, UseCaseError>;

    async fn list_segments(&self) -> Result<Vec<Segment>, UseCaseError>;

    async fn add_static_members(&self, segment_id: &EntityId, ids: Vec<EntityId>) -> Result<Segment, UseCaseError>;

    async fn remove_static_members(&self, segment_id: &EntityId, ids: Vec<EntityId>) -> Result<Segment, UseCaseError>;

    async fn exclude_members(&self, segment_id: &EntityId, ids: Vec<EntityId>) -> Result<Segment, UseCaseError>;

    async fn include_members(&self, segment_id: &EntityId, ids: Vec<EntityId>) -> Result<Segment, UseCaseError>;

    /// Cached unless the segment revision or record snapshot moved on
    async fn resolve_members(&self, segment_id: &EntityId) -> Result<Arc<Membership>, UseCaseError>;

    async fn is_member(&self, segment_id: &EntityId, record_id: &EntityId) -> Result<bool, UseCaseError>;

    /// Strictly decode rule-builder documents using the configured list delimiter
    fn compile_rules(&self, group: LooseConditionGroup) -> Result<ConditionGroup, UseCaseError>;

    /// Evaluate an unsaved group against the current records
    async fn preview(&self, group: &ConditionGroup, sample_size: usize) -> Result<Preview, UseCaseError>;

    async fn recompute_segment_stats(&self, segment_id: &EntityId) -> Result<SegmentStats, UseCaseError>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UseCaseError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl UseCaseError {
    pub fn tag_not_found(id: &EntityId) -> Self {
        Self::NotFound { entity: "tag", id: id.clone() }
    }

    pub fn segment_not_found(id: &EntityId) -> Self {
        Self::NotFound { entity: "segment", id: id.clone() }
    }
}

impl From<TagError> for UseCaseError {
    fn from(e: TagError) -> Self {
        match e {
            TagError::EmptyName | TagError::NameTooLong(_) | TagError::SelfParent => {
                Self::Validation(e.to_string())
            }
            TagError::SystemTag(_) | TagError::DeleteDenied(_) | TagError::ReadOnly(_) => {
                Self::ConstraintViolation(e.to_string())
            }
        }
    }
}

impl From<HierarchyError> for UseCaseError {
    fn from(e: HierarchyError) -> Self {
        match e {
            HierarchyError::NotFound(id) => Self::tag_not_found(&id),
            HierarchyError::Tag(e) => e.into(),
            HierarchyError::Cycle(_) | HierarchyError::DanglingParent { .. } => {
                Self::Integrity(e.to_string())
            }
            HierarchyError::ParentNotFound(_)
            | HierarchyError::WouldCycle { .. }
            | HierarchyError::DepthExceeded { .. }
            | HierarchyError::HasChildren { .. } => Self::ConstraintViolation(e.to_string()),
        }
    }
}

impl From<SegmentError> for UseCaseError {
    fn from(e: SegmentError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<ColorError> for UseCaseError {
    fn from(e: ColorError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<ConditionError> for UseCaseError {
    fn from(e: ConditionError) -> Self {
        Self::Validation(e.to_string())
    }
}
