//! Domain Events
//!
//! Events raised by aggregates to communicate state changes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::aggregates::segment::SegmentType;
use crate::domain::value_objects::EntityId;

/// All domain events in the segmentation bounded context
#[derive(Clone, Debug, Serialize)]
pub enum DomainEvent {
    Tag(TagEvent),
    Segment(SegmentEvent),
}

#[derive(Clone, Debug, Serialize)]
pub enum TagEvent {
    Created {
        tag_id: EntityId,
        name: String,
        parent_id: Option<EntityId>,
        created_by: EntityId,
        created_at: DateTime<Utc>,
    },

    Updated {
        tag_id: EntityId,
        updated_at: DateTime<Utc>,
    },

    Reparented {
        tag_id: EntityId,
        from_parent: Option<EntityId>,
        to_parent: Option<EntityId>,
    },

    Deleted {
        tag_id: EntityId,
        deleted_at: DateTime<Utc>,
    },
}

#[derive(Clone, Debug, Serialize)]
pub enum SegmentEvent {
    Created {
        segment_id: EntityId,
        name: String,
        segment_type: SegmentType,
        created_at: DateTime<Utc>,
    },

    Updated {
        segment_id: EntityId,
        updated_at: DateTime<Utc>,
    },

    /// Rules, member lists or type changed; cached membership is stale
    DefinitionChanged {
        segment_id: EntityId,
        revision: u64,
    },

    MembershipResolved {
        segment_id: EntityId,
        revision: u64,
        member_count: usize,
        resolved_at: DateTime<Utc>,
    },

    Deleted {
        segment_id: EntityId,
        deleted_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Get the aggregate ID this event belongs to
    pub fn aggregate_id(&self) -> &EntityId {
        match self {
            DomainEvent::Tag(e) => match e {
                TagEvent::Created { tag_id, .. }
                | TagEvent::Updated { tag_id, .. }
                | TagEvent::Reparented { tag_id, .. }
                | TagEvent::Deleted { tag_id, .. } => tag_id,
            },
            DomainEvent::Segment(e) => match e {
                SegmentEvent::Created { segment_id, .. }
                | SegmentEvent::Updated { segment_id, .. }
                | SegmentEvent::DefinitionChanged { segment_id, .. }
                | SegmentEvent::MembershipResolved { segment_id, .. }
                | SegmentEvent::Deleted { segment_id, .. } => segment_id,
            },
        }
    }

    /// Get event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Tag(e) => match e {
                TagEvent::Created { .. } => "tag.created",
                TagEvent::Updated { .. } => "tag.updated",
                TagEvent::Reparented { .. } => "tag.reparented",
                TagEvent::Deleted { .. } => "tag.deleted",
            },
            DomainEvent::Segment(e) => match e {
                SegmentEvent::Created { .. } => "segment.created",
                SegmentEvent::Updated { .. } => "segment.updated",
                SegmentEvent::DefinitionChanged { .. } => "segment.definition_changed",
                SegmentEvent::MembershipResolved { .. } => "segment.membership_resolved",
                SegmentEvent::Deleted { .. } => "segment.deleted",
            },
        }
    }
}
