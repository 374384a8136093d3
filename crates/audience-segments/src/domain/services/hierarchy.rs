//! Tag hierarchy navigation
//!
//! [`TagHierarchy`] is a read-only view over a snapshot of the tag forest in
//! store insertion order. Every upward walk carries a visited set, so stored
//! data with a parent cycle is reported instead of looping.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::warn;

use crate::domain::aggregates::{Tag, TagError};
use crate::domain::value_objects::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSortKey {
    Name,
    CreatedAt,
    UsageCount,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSort {
    pub key: TagSortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

impl TagSort {
    pub fn asc(key: TagSortKey) -> Self {
        Self { key, direction: SortDirection::Asc }
    }

    pub fn desc(key: TagSortKey) -> Self {
        Self { key, direction: SortDirection::Desc }
    }

    fn compare(&self, a: &Tag, b: &Tag) -> Ordering {
        let ordering = match self.key {
            TagSortKey::Name => a.name().to_lowercase().cmp(&b.name().to_lowercase()),
            TagSortKey::CreatedAt => a.created_at().cmp(&b.created_at()),
            TagSortKey::UsageCount => a.usage_count().cmp(&b.usage_count()),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// How a tag that still has children is deleted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Refuse while children exist
    #[default]
    Restrict,
    /// Delete the whole subtree
    Cascade,
    /// Move children to the deleted tag's parent
    Reparent,
}

/// How an upward walk stopped
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathEnd {
    /// Reached a tag without a parent
    Root,
    /// A `parent_id` pointed at a tag that does not exist
    MissingParent(EntityId),
    /// A `parent_id` pointed back into the walked path
    Cycle(EntityId),
}

/// Root-to-node path. When `end` is not [`PathEnd::Root`] the path is the
/// best-effort part that could be walked.
#[derive(Clone, Debug)]
pub struct TagPath {
    pub tags: Vec<Tag>,
    pub end: PathEnd,
}

impl TagPath {
    pub fn is_complete(&self) -> bool {
        self.end == PathEnd::Root
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.tags.iter().map(|t| t.id().clone()).collect()
    }

    /// The full path, or the integrity problem that cut it short
    pub fn into_complete(self) -> Result<Vec<Tag>, HierarchyError> {
        let tag = self.tags.last().map(|t| t.id().clone()).unwrap_or_default();
        match self.end {
            PathEnd::Root => Ok(self.tags),
            PathEnd::MissingParent(parent) => Err(HierarchyError::DanglingParent { tag, parent }),
            PathEnd::Cycle(at) => Err(HierarchyError::Cycle(at)),
        }
    }
}

/// Problems found by [`TagHierarchy::integrity_report`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Tags that sit on a parent cycle
    pub cyclic: BTreeSet<EntityId>,
    /// `(tag, missing parent)` pairs
    pub dangling: Vec<(EntityId, EntityId)>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.cyclic.is_empty() && self.dangling.is_empty()
    }
}

/// Result of [`TagHierarchy::plan_delete`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletePlan {
    /// Tags to remove, the requested tag first
    pub remove: Vec<EntityId>,
    /// `(child, new parent)` moves to apply before removal
    pub reparent: Vec<(EntityId, Option<EntityId>)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("tag {0} not found")]
    NotFound(EntityId),

    #[error("parent tag {0} not found")]
    ParentNotFound(EntityId),

    #[error("moving tag {tag} under {parent} would create a cycle")]
    WouldCycle { tag: EntityId, parent: EntityId },

    #[error("tag hierarchy deeper than {max} levels")]
    DepthExceeded { max: usize },

    #[error("tag {tag} has {count} children; use cascade or reparent")]
    HasChildren { tag: EntityId, count: usize },

    #[error("tag hierarchy contains a cycle at {0}")]
    Cycle(EntityId),

    #[error("tag {tag} references missing parent {parent}")]
    DanglingParent { tag: EntityId, parent: EntityId },

    #[error(transparent)]
    Tag(#[from] TagError),
}

/// Read-only view of the tag forest
#[derive(Clone, Debug, Default)]
pub struct TagHierarchy {
    tags: Vec<Tag>,
    index: HashMap<EntityId, usize>,
    children: HashMap<Option<EntityId>, Vec<usize>>,
}

impl TagHierarchy {
    /// Build from tags in store insertion order
    pub fn new(tags: Vec<Tag>) -> Self {
        let mut index = HashMap::with_capacity(tags.len());
        let mut children: HashMap<Option<EntityId>, Vec<usize>> = HashMap::new();

        for (position, tag) in tags.iter().enumerate() {
            index.insert(tag.id().clone(), position);
            children
                .entry(tag.parent_id().cloned())
                .or_default()
                .push(position);
        }

        Self { tags, index, children }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Tag> {
        self.index.get(id).map(|&i| &self.tags[i])
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Direct children of `parent` (roots for `None`), insertion order
    /// unless sorted. Sorting is stable.
    pub fn children_of(&self, parent: Option<&EntityId>, sort: Option<TagSort>) -> Vec<&Tag> {
        let mut children: Vec<&Tag> = self
            .children
            .get(&parent.cloned())
            .map(|positions| positions.iter().map(|&i| &self.tags[i]).collect())
            .unwrap_or_default();

        if let Some(sort) = sort {
            children.sort_by(|a, b| sort.compare(a, b));
        }
        children
    }

    pub fn child_count(&self, id: &EntityId) -> usize {
        self.children.get(&Some(id.clone())).map_or(0, Vec::len)
    }

    /// Walk `parent_id` links up from `id`
    pub fn path_to(&self, id: &EntityId) -> Result<TagPath, HierarchyError> {
        let start = self.get(id).ok_or_else(|| HierarchyError::NotFound(id.clone()))?;

        let mut visited = HashSet::new();
        let mut tags = vec![];
        let mut current = start;

        let end = loop {
            visited.insert(current.id().clone());
            tags.push(current.clone());

            let Some(parent_id) = current.parent_id() else {
                break PathEnd::Root;
            };
            if visited.contains(parent_id) {
                warn!(tag_id = %id, cycle_at = %parent_id, "Tag hierarchy contains a parent cycle");
                break PathEnd::Cycle(parent_id.clone());
            }
            match self.get(parent_id) {
                Some(parent) => current = parent,
                None => break PathEnd::MissingParent(parent_id.clone()),
            }
        };

        tags.reverse();
        Ok(TagPath { tags, end })
    }

    /// Number of tags on the root-to-node path (roots are at depth 1)
    pub fn depth_of(&self, id: &EntityId) -> Result<usize, HierarchyError> {
        Ok(self.path_to(id)?.tags.len())
    }

    /// Every tag below `id`, breadth first, excluding `id` itself
    pub fn descendants_of(&self, id: &EntityId) -> Result<Vec<&Tag>, HierarchyError> {
        if !self.contains(id) {
            return Err(HierarchyError::NotFound(id.clone()));
        }

        let mut seen = HashSet::from([id.clone()]);
        let mut queue = VecDeque::from([id.clone()]);
        let mut out = vec![];

        while let Some(next) = queue.pop_front() {
            for child in self.children_of(Some(&next), None) {
                if seen.insert(child.id().clone()) {
                    queue.push_back(child.id().clone());
                    out.push(child);
                }
            }
        }
        Ok(out)
    }

    /// Levels in the subtree rooted at `id` (a leaf has height 1)
    pub fn subtree_height(&self, id: &EntityId) -> usize {
        fn height(h: &TagHierarchy, id: &EntityId, seen: &mut HashSet<EntityId>) -> usize {
            if !seen.insert(id.clone()) {
                return 0;
            }
            1 + h
                .children_of(Some(id), None)
                .iter()
                .map(|child| height(h, child.id(), seen))
                .max()
                .unwrap_or(0)
        }
        height(self, id, &mut HashSet::new())
    }

    /// Whether making `new_parent` the parent of `id` closes a loop
    pub fn would_create_cycle(&self, id: &EntityId, new_parent: &EntityId) -> bool {
        if id == new_parent {
            return true;
        }

        let mut visited = HashSet::new();
        let mut current = Some(new_parent);
        while let Some(cursor) = current {
            if cursor == id || !visited.insert(cursor.clone()) {
                return true;
            }
            current = self.get(cursor).and_then(Tag::parent_id);
        }
        false
    }

    /// Check that a tag may live under `parent`.
    ///
    /// `tag` is `None` for a tag that does not exist yet.
    pub fn validate_placement(
        &self,
        tag: Option<&EntityId>,
        parent: Option<&EntityId>,
        max_depth: usize,
    ) -> Result<(), HierarchyError> {
        let parent_depth = match parent {
            None => 0,
            Some(parent) => {
                if !self.contains(parent) {
                    return Err(HierarchyError::ParentNotFound(parent.clone()));
                }
                if let Some(tag) = tag {
                    if self.would_create_cycle(tag, parent) {
                        return Err(HierarchyError::WouldCycle {
                            tag: tag.clone(),
                            parent: parent.clone(),
                        });
                    }
                }
                let path = self.path_to(parent)?;
                if let PathEnd::Cycle(at) = path.end {
                    return Err(HierarchyError::Cycle(at));
                }
                path.tags.len()
            }
        };

        let height = tag.map_or(1, |t| self.subtree_height(t).max(1));
        if parent_depth + height > max_depth {
            return Err(HierarchyError::DepthExceeded { max: max_depth });
        }
        Ok(())
    }

    /// Work out what deleting `id` under `mode` removes and moves
    pub fn plan_delete(&self, id: &EntityId, mode: DeleteMode) -> Result<DeletePlan, HierarchyError> {
        let tag = self.get(id).ok_or_else(|| HierarchyError::NotFound(id.clone()))?;
        tag.ensure_deletable()?;

        let children = self.children_of(Some(id), None);
        if children.is_empty() {
            return Ok(DeletePlan {
                remove: vec![id.clone()],
                reparent: vec![],
            });
        }

        match mode {
            DeleteMode::Restrict => Err(HierarchyError::HasChildren {
                tag: id.clone(),
                count: children.len(),
            }),
            DeleteMode::Cascade => {
                let descendants = self.descendants_of(id)?;
                for descendant in &descendants {
                    descendant.ensure_deletable()?;
                }
                let mut remove = vec![id.clone()];
                remove.extend(descendants.iter().map(|t| t.id().clone()));
                Ok(DeletePlan { remove, reparent: vec![] })
            }
            DeleteMode::Reparent => Ok(DeletePlan {
                remove: vec![id.clone()],
                reparent: children
                    .iter()
                    .map(|child| (child.id().clone(), tag.parent_id().cloned()))
                    .collect(),
            }),
        }
    }

    /// Cycles and dangling parent references across the whole forest
    pub fn integrity_report(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();

        for tag in &self.tags {
            if let Some(parent) = tag.parent_id() {
                if !self.contains(parent) {
                    report.dangling.push((tag.id().clone(), parent.clone()));
                }
            }

            if report.cyclic.contains(tag.id()) {
                continue;
            }
            let mut order = vec![];
            let mut current = Some(tag);
            while let Some(cursor) = current {
                if let Some(at) = order.iter().position(|id| id == cursor.id()) {
                    report.cyclic.extend(order.drain(at..));
                    break;
                }
                order.push(cursor.id().clone());
                current = cursor.parent_id().and_then(|p| self.get(p));
            }
        }

        if !report.is_clean() {
            warn!(
                cyclic = report.cyclic.len(),
                dangling = report.dangling.len(),
                "Tag hierarchy integrity problems"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{TagDraft, TagType};
    use crate::domain::value_objects::TagColor;
    use proptest::prelude::*;

    fn tag(id: &str, parent: Option<&str>) -> Tag {
        typed_tag(id, parent, TagType::User)
    }

    fn typed_tag(id: &str, parent: Option<&str>, tag_type: TagType) -> Tag {
        Tag::create_with_id(
            EntityId::from(id),
            TagDraft {
                name: id.to_uppercase(),
                description: None,
                color: TagColor::default(),
                tag_type,
                parent_id: parent.map(EntityId::from),
                created_by: EntityId::from("user-1"),
            },
        )
        .unwrap()
    }

    fn id(raw: &str) -> EntityId {
        EntityId::from(raw)
    }

    fn names(tags: &[&Tag]) -> Vec<String> {
        tags.iter().map(|t| t.name().to_string()).collect()
    }

    /// root ─┬─ a ── a1
    ///       └─ b
    /// other
    fn forest() -> TagHierarchy {
        TagHierarchy::new(vec![
            tag("root", None),
            tag("b", Some("root")),
            tag("a", Some("root")),
            tag("a1", Some("a")),
            tag("other", None),
        ])
    }

    #[test]
    fn test_children_in_insertion_order() {
        let h = forest();
        assert_eq!(names(&h.children_of(None, None)), ["ROOT", "OTHER"]);
        assert_eq!(names(&h.children_of(Some(&id("root")), None)), ["B", "A"]);
        assert!(h.children_of(Some(&id("a1")), None).is_empty());
    }

    #[test]
    fn test_children_sorted() {
        let mut b = tag("b", Some("root"));
        b.record_usage(10);
        let mut a = tag("a", Some("root"));
        a.record_usage(3);
        let h = TagHierarchy::new(vec![tag("root", None), b, a]);

        let by_name = h.children_of(Some(&id("root")), Some(TagSort::asc(TagSortKey::Name)));
        assert_eq!(names(&by_name), ["A", "B"]);

        let by_usage = h.children_of(Some(&id("root")), Some(TagSort::desc(TagSortKey::UsageCount)));
        assert_eq!(names(&by_usage), ["B", "A"]);
    }

    #[test]
    fn test_path_to() {
        let h = forest();
        let path = h.path_to(&id("a1")).unwrap();
        assert!(path.is_complete());
        assert_eq!(path.ids(), vec![id("root"), id("a"), id("a1")]);
        assert_eq!(h.depth_of(&id("a1")).unwrap(), 3);
        assert!(matches!(h.path_to(&id("nope")), Err(HierarchyError::NotFound(_))));
    }

    #[test]
    fn test_path_stops_at_missing_parent() {
        let h = TagHierarchy::new(vec![tag("orphan", Some("gone"))]);
        let path = h.path_to(&id("orphan")).unwrap();
        assert_eq!(path.end, PathEnd::MissingParent(id("gone")));
        assert!(matches!(
            path.into_complete(),
            Err(HierarchyError::DanglingParent { .. })
        ));
    }

    #[test]
    fn test_path_terminates_on_cycle() {
        let h = TagHierarchy::new(vec![tag("x", Some("y")), tag("y", Some("z")), tag("z", Some("x"))]);
        let path = h.path_to(&id("x")).unwrap();

        assert_eq!(path.tags.len(), 3);
        assert_eq!(path.end, PathEnd::Cycle(id("x")));
        assert!(matches!(path.into_complete(), Err(HierarchyError::Cycle(_))));
    }

    #[test]
    fn test_descendants_and_height() {
        let h = forest();
        let below: Vec<_> = h.descendants_of(&id("root")).unwrap().iter().map(|t| t.id().clone()).collect();
        assert_eq!(below, vec![id("b"), id("a"), id("a1")]);
        assert_eq!(h.subtree_height(&id("root")), 3);
        assert_eq!(h.subtree_height(&id("b")), 1);
    }

    #[test]
    fn test_would_create_cycle() {
        let h = forest();
        assert!(h.would_create_cycle(&id("root"), &id("a1")));
        assert!(h.would_create_cycle(&id("a"), &id("a")));
        assert!(!h.would_create_cycle(&id("a"), &id("b")));
        assert!(!h.would_create_cycle(&id("other"), &id("a1")));
    }

    #[test]
    fn test_validate_placement() {
        let h = forest();
        assert!(h.validate_placement(None, Some(&id("a1")), 8).is_ok());
        assert_eq!(
            h.validate_placement(None, Some(&id("a1")), 3),
            Err(HierarchyError::DepthExceeded { max: 3 })
        );
        assert_eq!(
            h.validate_placement(None, Some(&id("ghost")), 8),
            Err(HierarchyError::ParentNotFound(id("ghost")))
        );
        assert!(matches!(
            h.validate_placement(Some(&id("root")), Some(&id("a1")), 8),
            Err(HierarchyError::WouldCycle { .. })
        ));
        // a (height 2) under other (depth 1) needs 3 levels
        assert!(h.validate_placement(Some(&id("a")), Some(&id("other")), 3).is_ok());
        assert!(h.validate_placement(Some(&id("a")), Some(&id("other")), 2).is_err());
    }

    #[test]
    fn test_delete_plans() {
        let h = forest();

        assert_eq!(
            h.plan_delete(&id("root"), DeleteMode::Restrict),
            Err(HierarchyError::HasChildren { tag: id("root"), count: 2 })
        );

        let cascade = h.plan_delete(&id("root"), DeleteMode::Cascade).unwrap();
        assert_eq!(cascade.remove, vec![id("root"), id("b"), id("a"), id("a1")]);

        let lift = h.plan_delete(&id("a"), DeleteMode::Reparent).unwrap();
        assert_eq!(lift.remove, vec![id("a")]);
        assert_eq!(lift.reparent, vec![(id("a1"), Some(id("root")))]);

        let leaf = h.plan_delete(&id("b"), DeleteMode::Restrict).unwrap();
        assert_eq!(leaf.remove, vec![id("b")]);
    }

    #[test]
    fn test_system_tags_block_deletion() {
        let h = TagHierarchy::new(vec![
            tag("parent", None),
            typed_tag("sys", Some("parent"), TagType::System),
        ]);

        assert!(matches!(
            h.plan_delete(&id("sys"), DeleteMode::Restrict),
            Err(HierarchyError::Tag(TagError::SystemTag(_)))
        ));
        assert!(matches!(
            h.plan_delete(&id("parent"), DeleteMode::Cascade),
            Err(HierarchyError::Tag(TagError::SystemTag(_)))
        ));
    }

    #[test]
    fn test_integrity_report() {
        assert!(forest().integrity_report().is_clean());

        let h = TagHierarchy::new(vec![
            tag("x", Some("y")),
            tag("y", Some("x")),
            tag("tail", Some("x")),
            tag("orphan", Some("gone")),
        ]);
        let report = h.integrity_report();
        assert_eq!(report.cyclic, BTreeSet::from([id("x"), id("y")]));
        assert_eq!(report.dangling, vec![(id("orphan"), id("gone"))]);
    }

    proptest! {
        #[test]
        fn prop_path_to_always_terminates(parents in proptest::collection::vec(proptest::option::of(0usize..12), 1..12)) {
            let n = parents.len();
            let tags: Vec<Tag> = parents
                .iter()
                .enumerate()
                .map(|(i, parent)| {
                    let parent = parent.filter(|p| *p != i && *p < n + 2).map(|p| format!("t{p}"));
                    tag(&format!("t{i}"), parent.as_deref())
                })
                .collect();
            let h = TagHierarchy::new(tags);

            for i in 0..n {
                let path = h.path_to(&id(&format!("t{i}"))).unwrap();
                prop_assert!(path.tags.len() <= n);
                prop_assert_eq!(path.tags.last().map(|t| t.id().clone()), Some(id(&format!("t{i}"))));
            }
            let _ = h.integrity_report();
        }
    }
}
