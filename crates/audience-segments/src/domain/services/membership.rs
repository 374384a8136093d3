//! Segment membership resolution

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use super::evaluator::ConditionEvaluator;
use crate::domain::aggregates::{Segment, SegmentType};
use crate::domain::value_objects::{ConditionGroup, CustomerRecord, EntityId, RecordSnapshot};

/// Resolved member set of one segment revision over one record snapshot
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Membership {
    pub segment_id: EntityId,
    pub revision: u64,
    pub snapshot_version: u64,
    pub members: BTreeSet<EntityId>,
    /// Records matched by the rules, before static members and exclusions
    pub dynamic_matches: usize,
    pub calculated_at: DateTime<Utc>,
}

impl Membership {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.members.contains(id)
    }

    /// Still describes `segment` over the snapshot with `snapshot_version`
    pub fn is_current(&self, revision: u64, snapshot_version: u64) -> bool {
        self.revision == revision && self.snapshot_version == snapshot_version
    }
}

/// Match summary for a group that has not been saved
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Preview {
    pub matched: usize,
    pub total: usize,
    pub sample: Vec<EntityId>,
}

/// Membership resolution domain service
pub struct MembershipResolver;

impl MembershipResolver {
    /// - DYNAMIC: records the rules match
    /// - STATIC: `static_members \ excluded_members`
    /// - MIXED: `(rule matches ∪ static_members) \ excluded_members`
    pub fn resolve(
        evaluator: &ConditionEvaluator,
        segment: &Segment,
        snapshot: &RecordSnapshot,
    ) -> Membership {
        let mut members = BTreeSet::new();
        let mut dynamic_matches = 0;

        if segment.uses_rules() {
            for record in snapshot.records.iter() {
                if evaluator.evaluate(segment.root_group(), record) {
                    dynamic_matches += 1;
                    members.insert(record.id.clone());
                }
            }
        }
        if segment.uses_static_members() {
            members.extend(segment.static_members().iter().cloned());
        }
        members.retain(|id| !segment.excluded_members().contains(id));

        Membership {
            segment_id: segment.id().clone(),
            revision: segment.revision(),
            snapshot_version: snapshot.version,
            members,
            dynamic_matches,
            calculated_at: Utc::now(),
        }
    }

    /// Single-candidate form of [`MembershipResolver::resolve`]; `record`
    /// is `None` when the id has no record in the snapshot.
    pub fn is_member(
        evaluator: &ConditionEvaluator,
        segment: &Segment,
        id: &EntityId,
        record: Option<&CustomerRecord>,
    ) -> bool {
        if segment.excluded_members().contains(id) {
            return false;
        }
        if segment.uses_static_members() && segment.static_members().contains(id) {
            return true;
        }
        match (segment.segment_type(), record) {
            (SegmentType::Dynamic | SegmentType::Mixed, Some(record)) => {
                evaluator.evaluate(segment.root_group(), record)
            }
            _ => false,
        }
    }

    /// Evaluate `group` over the snapshot, keeping at most `sample_size` ids
    pub fn preview(
        evaluator: &ConditionEvaluator,
        group: &ConditionGroup,
        snapshot: &RecordSnapshot,
        sample_size: usize,
    ) -> Preview {
        let mut matched = 0;
        let mut sample = Vec::with_capacity(sample_size.min(snapshot.len()));

        for record in snapshot.records.iter().filter(|r| evaluator.evaluate(group, r)) {
            matched += 1;
            if sample.len() < sample_size {
                sample.push(record.id.clone());
            }
        }

        Preview {
            matched,
            total: snapshot.len(),
            sample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::SegmentDraft;
    use crate::domain::value_objects::{Condition, Field, NumberTest, Test};

    fn snapshot() -> RecordSnapshot {
        RecordSnapshot::new(
            7,
            vec![
                CustomerRecord::new(EntityId::from("c1")).with(Field::Revenue, 500.0),
                CustomerRecord::new(EntityId::from("c2")).with(Field::Revenue, 50.0),
                CustomerRecord::new(EntityId::from("c3")).with(Field::Revenue, 250.0),
                CustomerRecord::new(EntityId::from("c4")),
            ],
        )
    }

    fn big_spenders() -> ConditionGroup {
        ConditionGroup::all(vec![
            Condition::new(Field::Revenue, Test::Number(NumberTest::GreaterThan(100.0))).unwrap(),
        ])
    }

    fn segment(segment_type: SegmentType, statics: &[&str], excluded: &[&str]) -> Segment {
        Segment::create(SegmentDraft {
            name: "Big spenders".into(),
            segment_type,
            root_group: big_spenders(),
            static_members: statics.iter().map(|s| EntityId::from(*s)).collect(),
            excluded_members: excluded.iter().map(|s| EntityId::from(*s)).collect(),
            created_by: EntityId::from("user-1"),
            ..Default::default()
        })
        .unwrap()
    }

    fn ids(membership: &Membership) -> Vec<&str> {
        membership.members.iter().map(EntityId::as_str).collect()
    }

    #[test]
    fn test_dynamic_membership() {
        let eval = ConditionEvaluator::default();
        let m = MembershipResolver::resolve(&eval, &segment(SegmentType::Dynamic, &["c4"], &[]), &snapshot());

        assert_eq!(ids(&m), ["c1", "c3"]);
        assert_eq!(m.dynamic_matches, 2);
        assert_eq!(m.snapshot_version, 7);
        assert!(m.is_current(1, 7));
        assert!(!m.is_current(1, 8));
    }

    #[test]
    fn test_static_membership_ignores_rules() {
        let eval = ConditionEvaluator::default();
        let seg = segment(SegmentType::Static, &["c2", "c4", "unknown"], &["c4"]);
        let m = MembershipResolver::resolve(&eval, &seg, &snapshot());

        assert_eq!(ids(&m), ["c2", "unknown"]);
        assert_eq!(m.dynamic_matches, 0);
    }

    #[test]
    fn test_mixed_exclusion_wins() {
        let eval = ConditionEvaluator::default();
        let seg = segment(SegmentType::Mixed, &["c2"], &["c1", "c2"]);
        let m = MembershipResolver::resolve(&eval, &seg, &snapshot());

        assert_eq!(ids(&m), ["c3"]);
        assert!(!m.contains(&EntityId::from("c1")));
    }

    #[test]
    fn test_is_member_agrees_with_resolve() {
        let eval = ConditionEvaluator::default();
        let snap = snapshot();
        let seg = segment(SegmentType::Mixed, &["c4"], &["c3"]);
        let resolved = MembershipResolver::resolve(&eval, &seg, &snap);

        for record in snap.records.iter() {
            assert_eq!(
                MembershipResolver::is_member(&eval, &seg, &record.id, Some(record)),
                resolved.contains(&record.id),
                "{}",
                record.id
            );
        }
        assert!(!MembershipResolver::is_member(&eval, &seg, &EntityId::from("ghost"), None));
    }

    #[test]
    fn test_preview() {
        let eval = ConditionEvaluator::default();
        let preview = MembershipResolver::preview(&eval, &big_spenders(), &snapshot(), 1);
        assert_eq!(preview.matched, 2);
        assert_eq!(preview.total, 4);
        assert_eq!(preview.sample, vec![EntityId::from("c1")]);
    }
}
