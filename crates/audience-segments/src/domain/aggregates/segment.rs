//! Segment Aggregate
//!
//! A named audience definition: a condition tree plus explicit member
//! lists. Every change to what decides membership bumps `revision`, which
//! is what cached membership is validated against.

use audience_common::advance_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::domain::events::{DomainEvent, SegmentEvent};
use crate::domain::value_objects::{ConditionGroup, EntityId, SegmentStats};

pub const MAX_SEGMENT_NAME_LEN: usize = 100;

/// Input for [`Segment::create`]
#[derive(Clone, Debug, Default)]
pub struct SegmentDraft {
    pub name: String,
    pub description: Option<String>,
    pub segment_type: SegmentType,
    pub root_group: ConditionGroup,
    pub static_members: Vec<EntityId>,
    pub excluded_members: Vec<EntityId>,
    pub tags: Vec<EntityId>,
    pub created_by: EntityId,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Clone, Debug, Default)]
pub struct SegmentPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub segment_type: Option<SegmentType>,
    pub root_group: Option<ConditionGroup>,
    pub static_members: Option<Vec<EntityId>>,
    pub excluded_members: Option<Vec<EntityId>>,
    pub tags: Option<Vec<EntityId>>,
}

impl SegmentPatch {
    /// Whether applying the patch can change membership
    pub fn touches_definition(&self) -> bool {
        self.segment_type.is_some()
            || self.root_group.is_some()
            || self.static_members.is_some()
            || self.excluded_members.is_some()
    }
}

/// Segment aggregate root
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Segment {
    id: EntityId,
    name: String,
    description: Option<String>,
    segment_type: SegmentType,
    root_group: ConditionGroup,
    static_members: BTreeSet<EntityId>,
    excluded_members: BTreeSet<EntityId>,
    tags: BTreeSet<EntityId>,
    revision: u64,
    #[serde(default)]
    stats: Option<SegmentStats>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: EntityId,
    last_calculated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Segment {
    /// Create a new segment (factory method)
    pub fn create(draft: SegmentDraft) -> Result<Self, SegmentError> {
        Self::create_with_id(EntityId::new(), draft)
    }

    pub fn create_with_id(id: EntityId, draft: SegmentDraft) -> Result<Self, SegmentError> {
        let name = validate_name(&draft.name)?;
        let now = Utc::now();

        let mut segment = Self {
            id: id.clone(),
            name: name.clone(),
            description: normalize_description(draft.description),
            segment_type: draft.segment_type,
            root_group: draft.root_group,
            static_members: draft.static_members.into_iter().collect(),
            excluded_members: draft.excluded_members.into_iter().collect(),
            tags: draft.tags.into_iter().collect(),
            revision: 1,
            stats: None,
            created_at: now,
            updated_at: now,
            created_by: draft.created_by,
            last_calculated_at: None,
            events: vec![],
        };

        segment.raise_event(DomainEvent::Segment(SegmentEvent::Created {
            segment_id: id,
            name,
            segment_type: segment.segment_type,
            created_at: now,
        }));

        Ok(segment)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> &EntityId { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn segment_type(&self) -> SegmentType { self.segment_type }
    pub fn root_group(&self) -> &ConditionGroup { &self.root_group }
    pub fn static_members(&self) -> &BTreeSet<EntityId> { &self.static_members }
    pub fn excluded_members(&self) -> &BTreeSet<EntityId> { &self.excluded_members }
    pub fn tags(&self) -> &BTreeSet<EntityId> { &self.tags }
    pub fn revision(&self) -> u64 { self.revision }
    pub fn stats(&self) -> Option<&SegmentStats> { self.stats.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn created_by(&self) -> &EntityId { &self.created_by }
    pub fn last_calculated_at(&self) -> Option<DateTime<Utc>> { self.last_calculated_at }

    pub fn uses_rules(&self) -> bool {
        matches!(self.segment_type, SegmentType::Dynamic | SegmentType::Mixed)
    }

    pub fn uses_static_members(&self) -> bool {
        matches!(self.segment_type, SegmentType::Static | SegmentType::Mixed)
    }

    // =========================================================================
    // Business Operations
    // =========================================================================

    /// Apply a partial update. Always stamps `updated_at`; returns whether
    /// the membership definition changed (and `revision` moved).
    pub fn apply(&mut self, patch: SegmentPatch) -> Result<bool, SegmentError> {
        let name = patch.name.as_deref().map(validate_name).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = normalize_description(description);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags.into_iter().collect();
        }

        let mut definition_changed = false;
        if let Some(segment_type) = patch.segment_type {
            definition_changed |= segment_type != self.segment_type;
            self.segment_type = segment_type;
        }
        if let Some(root_group) = patch.root_group {
            definition_changed |= root_group != self.root_group;
            self.root_group = root_group;
        }
        if let Some(members) = patch.static_members {
            let members: BTreeSet<_> = members.into_iter().collect();
            definition_changed |= members != self.static_members;
            self.static_members = members;
        }
        if let Some(members) = patch.excluded_members {
            let members: BTreeSet<_> = members.into_iter().collect();
            definition_changed |= members != self.excluded_members;
            self.excluded_members = members;
        }

        self.touch();
        self.raise_event(DomainEvent::Segment(SegmentEvent::Updated {
            segment_id: self.id.clone(),
            updated_at: self.updated_at,
        }));
        if definition_changed {
            self.bump_revision();
        }
        Ok(definition_changed)
    }

    /// Returns the number of ids that were not already static members
    pub fn add_static_members(&mut self, ids: impl IntoIterator<Item = EntityId>) -> usize {
        let added = ids
            .into_iter()
            .filter(|id| self.static_members.insert(id.clone()))
            .count();
        self.finish_member_change(added)
    }

    pub fn remove_static_members(&mut self, ids: impl IntoIterator<Item = EntityId>) -> usize {
        let removed = ids
            .into_iter()
            .filter(|id| self.static_members.remove(id))
            .count();
        self.finish_member_change(removed)
    }

    /// Excluded ids never resolve as members, whatever the rules say
    pub fn exclude_members(&mut self, ids: impl IntoIterator<Item = EntityId>) -> usize {
        let added = ids
            .into_iter()
            .filter(|id| self.excluded_members.insert(id.clone()))
            .count();
        self.finish_member_change(added)
    }

    /// Lift exclusions
    pub fn include_members(&mut self, ids: impl IntoIterator<Item = EntityId>) -> usize {
        let removed = ids
            .into_iter()
            .filter(|id| self.excluded_members.remove(id))
            .count();
        self.finish_member_change(removed)
    }

    pub fn attach_tag(&mut self, tag_id: EntityId) -> bool {
        let attached = self.tags.insert(tag_id);
        if attached {
            self.touch();
        }
        attached
    }

    pub fn detach_tag(&mut self, tag_id: &EntityId) -> bool {
        let detached = self.tags.remove(tag_id);
        if detached {
            self.touch();
        }
        detached
    }

    /// Stamp a finished membership resolution; not a user edit, so no touch
    pub fn record_calculation(&mut self, member_count: usize, resolved_at: DateTime<Utc>) {
        self.last_calculated_at = Some(resolved_at);
        self.raise_event(DomainEvent::Segment(SegmentEvent::MembershipResolved {
            segment_id: self.id.clone(),
            revision: self.revision,
            member_count,
            resolved_at,
        }));
    }

    pub fn record_stats(&mut self, stats: SegmentStats) {
        self.stats = Some(stats);
    }

    /// Record deletion; the repository removal is the caller's
    pub fn mark_deleted(&mut self) {
        self.raise_event(DomainEvent::Segment(SegmentEvent::Deleted {
            segment_id: self.id.clone(),
            deleted_at: Utc::now(),
        }));
    }

    /// Copy the definition into a fresh segment with its own id and history
    pub fn duplicate(&self, name: &str, created_by: EntityId) -> Result<Segment, SegmentError> {
        Segment::create(SegmentDraft {
            name: name.to_string(),
            description: self.description.clone(),
            segment_type: self.segment_type,
            root_group: self.root_group.clone(),
            static_members: self.static_members.iter().cloned().collect(),
            excluded_members: self.excluded_members.iter().cloned().collect(),
            tags: self.tags.iter().cloned().collect(),
            created_by,
        })
    }

    fn finish_member_change(&mut self, count: usize) -> usize {
        if count > 0 {
            self.touch();
            self.bump_revision();
        }
        count
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
        self.raise_event(DomainEvent::Segment(SegmentEvent::DefinitionChanged {
            segment_id: self.id.clone(),
            revision: self.revision,
        }));
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

fn validate_name(name: &str) -> Result<String, SegmentError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SegmentError::EmptyName);
    }
    if name.chars().count() > MAX_SEGMENT_NAME_LEN {
        return Err(SegmentError::NameTooLong(MAX_SEGMENT_NAME_LEN));
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

/// How membership is decided
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SegmentType {
    /// Rule evaluation only
    #[default]
    Dynamic,
    /// Explicit member list only
    Static,
    /// Rules plus static members, minus exclusions
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("segment name cannot be empty")]
    EmptyName,

    #[error("segment name longer than {0} characters")]
    NameTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Condition, Field, NumberTest, Test};

    fn draft(name: &str) -> SegmentDraft {
        SegmentDraft {
            name: name.into(),
            created_by: EntityId::from("user-1"),
            ..Default::default()
        }
    }

    fn ids(raw: &[&str]) -> Vec<EntityId> {
        raw.iter().map(|s| EntityId::from(*s)).collect()
    }

    #[test]
    fn test_segment_creation() {
        let mut segment = Segment::create(SegmentDraft {
            static_members: ids(&["a", "a", "b"]),
            ..draft(" High value ")
        })
        .unwrap();

        assert_eq!(segment.name(), "High value");
        assert_eq!(segment.static_members().len(), 2);
        assert_eq!(segment.revision(), 1);
        assert!(segment.last_calculated_at().is_none());

        let events = segment.take_events();
        assert!(matches!(events[0], DomainEvent::Segment(SegmentEvent::Created { .. })));
    }

    #[test]
    fn test_rename_stamps_without_revision() {
        let mut segment = Segment::create(draft("A")).unwrap();
        let before = segment.updated_at();

        let definition_changed = segment
            .apply(SegmentPatch { name: Some("X".into()), ..Default::default() })
            .unwrap();

        assert!(!definition_changed);
        assert_eq!(segment.name(), "X");
        assert!(segment.updated_at() > before);
        assert_eq!(segment.revision(), 1);
    }

    #[test]
    fn test_root_group_change_bumps_revision() {
        let mut segment = Segment::create(draft("A")).unwrap();
        segment.take_events();

        let rule = Condition::new(Field::Revenue, Test::Number(NumberTest::GreaterThan(100.0))).unwrap();
        let changed = segment
            .apply(SegmentPatch {
                root_group: Some(ConditionGroup::all(vec![rule])),
                ..Default::default()
            })
            .unwrap();

        assert!(changed);
        assert_eq!(segment.revision(), 2);
        let events = segment.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, DomainEvent::Segment(SegmentEvent::DefinitionChanged { revision: 2, .. }))));
    }

    #[test]
    fn test_invalid_rename_leaves_segment_untouched() {
        let mut segment = Segment::create(draft("A")).unwrap();
        let before = segment.updated_at();
        let result = segment.apply(SegmentPatch {
            name: Some("  ".into()),
            static_members: Some(ids(&["a"])),
            ..Default::default()
        });

        assert_eq!(result, Err(SegmentError::EmptyName));
        assert_eq!(segment.updated_at(), before);
        assert!(segment.static_members().is_empty());
    }

    #[test]
    fn test_member_operations() {
        let mut segment = Segment::create(SegmentDraft {
            segment_type: SegmentType::Static,
            ..draft("VIPs")
        })
        .unwrap();

        assert_eq!(segment.add_static_members(ids(&["a", "b"])), 2);
        assert_eq!(segment.add_static_members(ids(&["b"])), 0);
        assert_eq!(segment.revision(), 2);

        assert_eq!(segment.exclude_members(ids(&["b"])), 1);
        assert!(segment.static_members().contains(&EntityId::from("b")));
        assert_eq!(segment.revision(), 3);

        assert_eq!(segment.include_members(ids(&["b", "zz"])), 1);
        assert_eq!(segment.remove_static_members(ids(&["a"])), 1);
        assert_eq!(segment.revision(), 5);
    }

    #[test]
    fn test_tags_do_not_move_revision() {
        let mut segment = Segment::create(draft("A")).unwrap();
        assert!(segment.attach_tag(EntityId::from("t1")));
        assert!(!segment.attach_tag(EntityId::from("t1")));
        assert!(segment.detach_tag(&EntityId::from("t1")));
        assert_eq!(segment.revision(), 1);
    }

    #[test]
    fn test_duplicate() {
        let original = Segment::create(SegmentDraft {
            segment_type: SegmentType::Mixed,
            static_members: ids(&["a"]),
            ..draft("A")
        })
        .unwrap();

        let copy = original.duplicate("A (copy)", EntityId::from("user-2")).unwrap();
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.segment_type(), SegmentType::Mixed);
        assert_eq!(copy.static_members(), original.static_members());
        assert_eq!(copy.created_by(), &EntityId::from("user-2"));
    }

    #[test]
    fn test_serde_roundtrip_keeps_definition() {
        let segment = Segment::create(SegmentDraft {
            excluded_members: ids(&["x"]),
            ..draft("A")
        })
        .unwrap();

        let json = serde_json::to_string(&segment).unwrap();
        let restored: Segment = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.excluded_members(), segment.excluded_members());
        assert_eq!(restored.root_group(), segment.root_group());
        assert_eq!(restored.revision(), segment.revision());
    }
}
