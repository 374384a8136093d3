//! Data Transfer Objects (DTOs)
//!
//! Objects for transferring data across boundaries.

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{Segment, SegmentType, Tag, TagPermissions, TagType};
use crate::domain::value_objects::{ConditionGroup, EntityId};

// =============================================================================
// Tag Commands
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateTagCommand {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `#rrggbb`; the default grey when absent
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub tag_type: TagType,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    pub created_by: EntityId,
}

impl CreateTagCommand {
    pub fn new(name: impl Into<String>, created_by: EntityId) -> Self {
        Self {
            name: name.into(),
            description: None,
            color: None,
            tag_type: TagType::User,
            parent_id: None,
            created_by,
        }
    }

    pub fn under(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateTagCommand {
    pub tag_id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    /// `Some(None)` clears the description
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub permissions: Option<TagPermissions>,
}

// =============================================================================
// Segment Commands
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSegmentCommand {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub segment_type: SegmentType,
    #[serde(default)]
    pub root_group: ConditionGroup,
    #[serde(default)]
    pub static_members: Vec<EntityId>,
    #[serde(default)]
    pub excluded_members: Vec<EntityId>,
    #[serde(default)]
    pub tags: Vec<EntityId>,
    pub created_by: EntityId,
}

impl CreateSegmentCommand {
    pub fn new(name: impl Into<String>, segment_type: SegmentType, created_by: EntityId) -> Self {
        Self {
            name: name.into(),
            description: None,
            segment_type,
            root_group: ConditionGroup::default(),
            static_members: vec![],
            excluded_members: vec![],
            tags: vec![],
            created_by,
        }
    }

    pub fn with_rules(mut self, root_group: ConditionGroup) -> Self {
        self.root_group = root_group;
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateSegmentCommand {
    pub segment_id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub segment_type: Option<SegmentType>,
    #[serde(default)]
    pub root_group: Option<ConditionGroup>,
    #[serde(default)]
    pub static_members: Option<Vec<EntityId>>,
    #[serde(default)]
    pub excluded_members: Option<Vec<EntityId>>,
    #[serde(default)]
    pub tags: Option<Vec<EntityId>>,
}

impl UpdateSegmentCommand {
    pub fn new(segment_id: EntityId) -> Self {
        Self {
            segment_id,
            ..Default::default()
        }
    }
}

// =============================================================================
// Views (Read Models)
// =============================================================================

/// One tag with its nested children
#[derive(Clone, Debug, Serialize)]
pub struct TagTreeNode {
    pub tag: Tag,
    pub children: Vec<TagTreeNode>,
}

impl TagTreeNode {
    /// Tags in this node's subtree, the node included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TagTreeNode::size).sum::<usize>()
    }
}

/// Everything the key-value shim persists
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudienceSnapshot {
    pub format_version: u32,
    pub tags: Vec<Tag>,
    pub segments: Vec<Segment>,
}

impl AudienceSnapshot {
    pub const FORMAT_VERSION: u32 = 1;

    pub fn new(tags: Vec<Tag>, segments: Vec<Segment>) -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            tags,
            segments,
        }
    }
}
