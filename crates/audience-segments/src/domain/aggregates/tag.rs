//! Tag Aggregate
//!
//! A labelled category in the tag forest. Hierarchy-wide rules (parent must
//! exist, no cycles, depth limit) need the whole forest and live in
//! [`crate::domain::services::hierarchy`]; this aggregate guards everything
//! it can check on its own.

use audience_common::advance_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::events::{DomainEvent, TagEvent};
use crate::domain::value_objects::{EntityId, TagColor};

pub const MAX_TAG_NAME_LEN: usize = 100;

/// Input for [`Tag::create`]
#[derive(Clone, Debug)]
pub struct TagDraft {
    pub name: String,
    pub description: Option<String>,
    pub color: TagColor,
    pub tag_type: TagType,
    pub parent_id: Option<EntityId>,
    pub created_by: EntityId,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Clone, Debug, Default)]
pub struct TagPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub color: Option<TagColor>,
    pub permissions: Option<TagPermissions>,
}

/// Tag aggregate root
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tag {
    id: EntityId,
    name: String,
    description: Option<String>,
    color: TagColor,
    tag_type: TagType,
    parent_id: Option<EntityId>,
    permissions: TagPermissions,
    #[serde(default)]
    usage_count: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: EntityId,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Tag {
    /// Create a new tag (factory method)
    pub fn create(draft: TagDraft) -> Result<Self, TagError> {
        Self::create_with_id(EntityId::new(), draft)
    }

    pub fn create_with_id(id: EntityId, draft: TagDraft) -> Result<Self, TagError> {
        let name = validate_name(&draft.name)?;
        if draft.parent_id.as_ref() == Some(&id) {
            return Err(TagError::SelfParent);
        }
        let now = Utc::now();

        let mut tag = Self {
            id: id.clone(),
            name: name.clone(),
            description: normalize_description(draft.description),
            color: draft.color,
            tag_type: draft.tag_type,
            parent_id: draft.parent_id.clone(),
            permissions: TagPermissions::for_type(draft.tag_type),
            usage_count: 0,
            created_at: now,
            updated_at: now,
            created_by: draft.created_by.clone(),
            events: vec![],
        };

        tag.raise_event(DomainEvent::Tag(TagEvent::Created {
            tag_id: id,
            name,
            parent_id: draft.parent_id,
            created_by: draft.created_by,
            created_at: now,
        }));

        Ok(tag)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> &EntityId { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn color(&self) -> &TagColor { &self.color }
    pub fn tag_type(&self) -> TagType { self.tag_type }
    pub fn parent_id(&self) -> Option<&EntityId> { self.parent_id.as_ref() }
    pub fn permissions(&self) -> &TagPermissions { &self.permissions }
    pub fn usage_count(&self) -> u64 { self.usage_count }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn created_by(&self) -> &EntityId { &self.created_by }
    pub fn is_root(&self) -> bool { self.parent_id.is_none() }
    pub fn is_system(&self) -> bool { self.tag_type == TagType::System }

    // =========================================================================
    // Business Operations
    // =========================================================================

    /// Apply a partial update. Always stamps `updated_at`; returns whether
    /// any field value actually changed.
    pub fn apply(&mut self, patch: TagPatch) -> Result<bool, TagError> {
        self.ensure_editable()?;

        let mut changed = false;
        if let Some(name) = patch.name {
            let name = validate_name(&name)?;
            changed |= name != self.name;
            self.name = name;
        }
        if let Some(description) = patch.description {
            let description = normalize_description(description);
            changed |= description != self.description;
            self.description = description;
        }
        if let Some(color) = patch.color {
            changed |= color != self.color;
            self.color = color;
        }
        if let Some(permissions) = patch.permissions {
            changed |= permissions != self.permissions;
            self.permissions = permissions;
        }

        self.touch();
        self.raise_event(DomainEvent::Tag(TagEvent::Updated {
            tag_id: self.id.clone(),
            updated_at: self.updated_at,
        }));
        Ok(changed)
    }

    /// Move under another parent (or to the root with `None`).
    ///
    /// The caller is responsible for checking that the parent exists and
    /// that the move keeps the forest acyclic.
    pub fn reparent(&mut self, parent_id: Option<EntityId>) -> Result<bool, TagError> {
        self.ensure_editable()?;
        if parent_id.as_ref() == Some(&self.id) {
            return Err(TagError::SelfParent);
        }
        if parent_id == self.parent_id {
            return Ok(false);
        }

        let from_parent = std::mem::replace(&mut self.parent_id, parent_id.clone());
        self.touch();
        self.raise_event(DomainEvent::Tag(TagEvent::Reparented {
            tag_id: self.id.clone(),
            from_parent,
            to_parent: parent_id,
        }));
        Ok(true)
    }

    /// Cache the last computed usage count; not a user edit, so no touch
    pub fn record_usage(&mut self, usage_count: u64) {
        self.usage_count = usage_count;
    }

    pub fn ensure_deletable(&self) -> Result<(), TagError> {
        if self.is_system() {
            return Err(TagError::SystemTag(self.id.clone()));
        }
        if !self.permissions.can_delete {
            return Err(TagError::DeleteDenied(self.id.clone()));
        }
        Ok(())
    }

    /// Record deletion; the repository removal is the caller's
    pub fn mark_deleted(&mut self) -> Result<(), TagError> {
        self.ensure_deletable()?;
        self.raise_event(DomainEvent::Tag(TagEvent::Deleted {
            tag_id: self.id.clone(),
            deleted_at: Utc::now(),
        }));
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), TagError> {
        if self.permissions.can_edit {
            Ok(())
        } else {
            Err(TagError::ReadOnly(self.id.clone()))
        }
    }

    // =========================================================================
    // Domain Events
    // =========================================================================

    /// Get and clear accumulated domain events
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise_event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    fn touch(&mut self) {
        self.updated_at = advance_timestamp(self.updated_at);
    }
}

fn validate_name(name: &str) -> Result<String, TagError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TagError::EmptyName);
    }
    if name.chars().count() > MAX_TAG_NAME_LEN {
        return Err(TagError::NameTooLong(MAX_TAG_NAME_LEN));
    }
    Ok(name.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

// =============================================================================
// Supporting Types
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagType {
    #[default]
    User,
    System,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPermissions {
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_assign: bool,
}

impl TagPermissions {
    pub fn for_type(tag_type: TagType) -> Self {
        match tag_type {
            TagType::User => Self {
                can_edit: true,
                can_delete: true,
                can_assign: true,
            },
            TagType::System => Self {
                can_edit: false,
                can_delete: false,
                can_assign: true,
            },
        }
    }
}

impl Default for TagPermissions {
    fn default() -> Self {
        Self::for_type(TagType::User)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("tag name cannot be empty")]
    EmptyName,

    #[error("tag name longer than {0} characters")]
    NameTooLong(usize),

    #[error("a tag cannot be its own parent")]
    SelfParent,

    #[error("system tag {0} cannot be deleted")]
    SystemTag(EntityId),

    #[error("tag {0} does not allow deletion")]
    DeleteDenied(EntityId),

    #[error("tag {0} is read-only")]
    ReadOnly(EntityId),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, tag_type: TagType) -> TagDraft {
        TagDraft {
            name: name.into(),
            description: None,
            color: TagColor::default(),
            tag_type,
            parent_id: None,
            created_by: EntityId::from("user-1"),
        }
    }

    #[test]
    fn test_tag_creation() {
        let mut tag = Tag::create(draft("  VIP  ", TagType::User)).unwrap();
        assert_eq!(tag.name(), "VIP");
        assert!(tag.is_root());
        assert_eq!(tag.created_at(), tag.updated_at());

        let events = tag.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DomainEvent::Tag(TagEvent::Created { .. })));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(Tag::create(draft("   ", TagType::User)).unwrap_err(), TagError::EmptyName);
        let long = "x".repeat(MAX_TAG_NAME_LEN + 1);
        assert!(matches!(Tag::create(draft(&long, TagType::User)), Err(TagError::NameTooLong(_))));
    }

    #[test]
    fn test_apply_patch_stamps_updated_at() {
        let mut tag = Tag::create(draft("VIP", TagType::User)).unwrap();
        let before = tag.updated_at();

        let changed = tag
            .apply(TagPatch {
                name: Some("Gold".into()),
                description: Some(Some("top spenders".into())),
                ..Default::default()
            })
            .unwrap();

        assert!(changed);
        assert_eq!(tag.name(), "Gold");
        assert_eq!(tag.description(), Some("top spenders"));
        assert!(tag.updated_at() > before);
    }

    #[test]
    fn test_unchanged_patch_still_stamps() {
        let mut tag = Tag::create(draft("VIP", TagType::User)).unwrap();
        let before = tag.updated_at();
        assert!(!tag.apply(TagPatch { name: Some("VIP".into()), ..Default::default() }).unwrap());
        assert!(tag.updated_at() > before);
    }

    #[test]
    fn test_system_tag_rules() {
        let mut tag = Tag::create(draft("Imported", TagType::System)).unwrap();
        assert!(matches!(tag.ensure_deletable(), Err(TagError::SystemTag(_))));
        assert!(matches!(tag.mark_deleted(), Err(TagError::SystemTag(_))));
        assert!(matches!(
            tag.apply(TagPatch { name: Some("x".into()), ..Default::default() }),
            Err(TagError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_reparent() {
        let mut tag = Tag::create(draft("Child", TagType::User)).unwrap();
        tag.take_events();

        let own_id = tag.id().clone();
        assert_eq!(tag.reparent(Some(own_id)), Err(TagError::SelfParent));

        assert!(tag.reparent(Some(EntityId::from("parent"))).unwrap());
        assert!(!tag.reparent(Some(EntityId::from("parent"))).unwrap());
        assert_eq!(tag.parent_id(), Some(&EntityId::from("parent")));

        let events = tag.take_events();
        assert!(matches!(events[0], DomainEvent::Tag(TagEvent::Reparented { .. })));
    }

    #[test]
    fn test_serde_skips_events() {
        let tag = Tag::create(draft("VIP", TagType::User)).unwrap();
        let json = serde_json::to_value(&tag).unwrap();
        assert!(json.get("events").is_none());

        let mut restored: Tag = serde_json::from_value(json).unwrap();
        assert_eq!(restored.id(), tag.id());
        assert!(restored.take_events().is_empty());
    }
}
