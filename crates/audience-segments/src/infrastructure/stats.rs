//! Stats computed straight from the record snapshot

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::domain::aggregates::{Segment, Tag};
use crate::domain::services::Membership;
use crate::domain::value_objects::{Field, SegmentStats, TagStats};
use crate::ports::outbound::{RecordSource, RepositoryError, SegmentRepository, StatsProvider};

/// A member converted once they placed at least one order.
/// Members with no record in the snapshot count as not converted.
pub struct SnapshotStatsProvider {
    records: Arc<dyn RecordSource>,
    segments: Arc<dyn SegmentRepository>,
}

impl SnapshotStatsProvider {
    pub fn new(records: Arc<dyn RecordSource>, segments: Arc<dyn SegmentRepository>) -> Self {
        Self { records, segments }
    }
}

#[async_trait]
impl StatsProvider for SnapshotStatsProvider {
    async fn tag_stats(&self, tag: &Tag) -> Result<TagStats, RepositoryError> {
        let snapshot = self.records.snapshot().await?;
        let record_count = snapshot.records.iter().filter(|r| r.has_tag(tag.id())).count() as u64;
        let segment_count = self.segments.find_by_tag(tag.id()).await?.len() as u64;

        debug!(tag_id = %tag.id(), record_count, segment_count, "Tag stats");
        Ok(TagStats {
            tag_id: tag.id().clone(),
            usage_count: record_count + segment_count,
            record_count,
            segment_count,
            computed_at: Utc::now(),
        })
    }

    async fn segment_stats(
        &self,
        segment: &Segment,
        membership: &Membership,
    ) -> Result<SegmentStats, RepositoryError> {
        let member_count = membership.len();
        let previous_member_count = segment.stats().map(|s| s.member_count);

        let conversion_rate = if member_count == 0 {
            None
        } else {
            let snapshot = self.records.snapshot().await?;
            let converted = snapshot
                .records
                .iter()
                .filter(|r| membership.contains(&r.id))
                .filter(|r| {
                    r.get(Field::OrderCount)
                        .and_then(|v| v.as_number())
                        .is_some_and(|n| n >= 1.0)
                })
                .count();
            Some(converted as f64 / member_count as f64)
        };

        Ok(SegmentStats {
            segment_id: segment.id().clone(),
            member_count,
            previous_member_count,
            growth_rate: SegmentStats::growth_between(previous_member_count, member_count),
            conversion_rate,
            computed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{SegmentDraft, SegmentType, TagDraft, TagType};
    use crate::domain::services::{ConditionEvaluator, MembershipResolver};
    use crate::domain::value_objects::{CustomerRecord, EntityId, TagColor};
    use crate::infrastructure::{InMemoryRecordSource, InMemorySegmentRepository};

    fn customer(id: &str, orders: i64) -> CustomerRecord {
        CustomerRecord::new(EntityId::from(id)).with(Field::OrderCount, orders)
    }

    fn static_segment(members: &[&str]) -> Segment {
        Segment::create(SegmentDraft {
            name: "Picked".into(),
            segment_type: SegmentType::Static,
            static_members: members.iter().map(|m| EntityId::from(*m)).collect(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_conversion_counts_ordering_members() {
        let records = Arc::new(InMemoryRecordSource::new());
        records.replace(vec![customer("a", 2), customer("b", 0), customer("c", 1)]);
        let provider = SnapshotStatsProvider::new(records.clone(), Arc::new(InMemorySegmentRepository::new()));

        // "ghost" has no record and so cannot have converted
        let segment = static_segment(&["a", "b", "ghost"]);
        let snapshot = records.snapshot().await.unwrap();
        let membership = MembershipResolver::resolve(&ConditionEvaluator::default(), &segment, &snapshot);

        let stats = provider.segment_stats(&segment, &membership).await.unwrap();
        assert_eq!(stats.member_count, 3);
        assert_eq!(stats.conversion_rate, Some(1.0 / 3.0));
        assert_eq!(stats.growth_rate, None);
    }

    #[tokio::test]
    async fn test_empty_segment_has_no_conversion_rate() {
        let records = Arc::new(InMemoryRecordSource::new());
        let provider = SnapshotStatsProvider::new(records.clone(), Arc::new(InMemorySegmentRepository::new()));
        let segment = static_segment(&[]);
        let membership = MembershipResolver::resolve(
            &ConditionEvaluator::default(),
            &segment,
            &records.snapshot().await.unwrap(),
        );

        let stats = provider.segment_stats(&segment, &membership).await.unwrap();
        assert_eq!((stats.member_count, stats.conversion_rate), (0, None));
    }

    #[tokio::test]
    async fn test_tag_stats_counts_records_and_segments() {
        let tag = Tag::create(TagDraft {
            name: "VIP".into(),
            description: None,
            color: TagColor::default(),
            tag_type: TagType::User,
            parent_id: None,
            created_by: EntityId::from("user-1"),
        })
        .unwrap();

        let records = Arc::new(InMemoryRecordSource::new());
        records.replace(vec![
            customer("a", 0).with_tag(tag.id().clone()),
            customer("b", 0).with_tag(tag.id().clone()),
            customer("c", 0),
        ]);
        let segments = Arc::new(InMemorySegmentRepository::new());
        let provider = SnapshotStatsProvider::new(records, segments.clone());

        let stats = provider.tag_stats(&tag).await.unwrap();
        assert_eq!((stats.record_count, stats.segment_count, stats.usage_count), (2, 0, 2));
    }
}
