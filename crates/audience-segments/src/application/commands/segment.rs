//! Segment application service

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::dto::*;
use crate::cache::MembershipCache;
use crate::domain::aggregates::{Segment, SegmentDraft, SegmentPatch};
use crate::domain::services::{ConditionEvaluator, Membership, MembershipResolver, Preview};
use crate::domain::value_objects::{ConditionGroup, EntityId, LooseConditionGroup, SegmentStats};
use crate::ports::inbound::{SegmentUseCases, UseCaseError};
use crate::ports::outbound::{
    EventPublisher, RecordSource, SegmentBookkeeping, SegmentRepository, StatsProvider, TagRepository,
};

/// Segment application service
pub struct SegmentService {
    segment_repo: Arc<dyn SegmentRepository>,
    tag_repo: Arc<dyn TagRepository>,
    records: Arc<dyn RecordSource>,
    stats: Arc<dyn StatsProvider>,
    event_publisher: Arc<dyn EventPublisher>,
    cache: Arc<MembershipCache>,
    evaluator: ConditionEvaluator,
}

impl SegmentService {
    pub fn new(
        segment_repo: Arc<dyn SegmentRepository>,
        tag_repo: Arc<dyn TagRepository>,
        records: Arc<dyn RecordSource>,
        stats: Arc<dyn StatsProvider>,
        event_publisher: Arc<dyn EventPublisher>,
        cache: Arc<MembershipCache>,
        evaluator: ConditionEvaluator,
    ) -> Self {
        Self {
            segment_repo,
            tag_repo,
            records,
            stats,
            event_publisher,
            cache,
            evaluator,
        }
    }

    pub fn cache(&self) -> &MembershipCache {
        &self.cache
    }

    async fn load(&self, id: &EntityId) -> Result<Segment, UseCaseError> {
        self.segment_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| UseCaseError::segment_not_found(id))
    }

    async fn save_and_publish(&self, segment: &mut Segment) -> Result<(), UseCaseError> {
        let events = segment.take_events();
        self.segment_repo.save(segment).await?;
        self.event_publisher.publish(events).await?;
        Ok(())
    }

    /// Writes derived state back unless the definition changed meanwhile
    async fn record_bookkeeping(
        &self,
        segment_id: &EntityId,
        revision: u64,
        bookkeeping: SegmentBookkeeping,
    ) -> Result<(), UseCaseError> {
        match self
            .segment_repo
            .record_at_revision(segment_id, revision, bookkeeping)
            .await?
        {
            Some(mut stored) => self.event_publisher.publish(stored.take_events()).await?,
            None => debug!(segment_id = %segment_id, revision, "Segment moved on; bookkeeping skipped"),
        }
        Ok(())
    }

    /// Labels must exist and allow assignment
    async fn check_tags(&self, tags: &[EntityId]) -> Result<(), UseCaseError> {
        for id in tags {
            let tag = self
                .tag_repo
                .find_by_id(id)
                .await?
                .ok_or_else(|| UseCaseError::tag_not_found(id))?;
            if !tag.permissions().can_assign {
                return Err(UseCaseError::ConstraintViolation(format!(
                    "tag {id} cannot be assigned"
                )));
            }
        }
        Ok(())
    }

    async fn change_members(
        &self,
        segment_id: &EntityId,
        change: impl FnOnce(&mut Segment) -> usize + Send,
    ) -> Result<Segment, UseCaseError> {
        let mut segment = self.load(segment_id).await?;
        let changed = change(&mut segment);

        if changed > 0 {
            self.cache.invalidate(segment_id);
            self.save_and_publish(&mut segment).await?;
        }
        info!(segment_id = %segment_id, changed, revision = segment.revision(), "Segment members changed");
        Ok(segment)
    }
}

#[async_trait]
impl SegmentUseCases for SegmentService {
    async fn create_segment(&self, command: CreateSegmentCommand) -> Result<Segment, UseCaseError> {
        self.check_tags(&command.tags).await?;

        let mut segment = Segment::create(SegmentDraft {
            name: command.name,
            description: command.description,
            segment_type: command.segment_type,
            root_group: command.root_group,
            static_members: command.static_members,
            excluded_members: command.excluded_members,
            tags: command.tags,
            created_by: command.created_by,
        })?;

        self.save_and_publish(&mut segment).await?;
        info!(segment_id = %segment.id(), name = segment.name(), segment_type = ?segment.segment_type(), "Segment created");
        Ok(segment)
    }

    async fn update_segment(&self, command: UpdateSegmentCommand) -> Result<Segment, UseCaseError> {
        let mut segment = self.load(&command.segment_id).await?;
        if let Some(tags) = &command.tags {
            self.check_tags(tags).await?;
        }

        let definition_changed = segment.apply(SegmentPatch {
            name: command.name,
            description: command.description,
            segment_type: command.segment_type,
            root_group: command.root_group,
            static_members: command.static_members,
            excluded_members: command.excluded_members,
            tags: command.tags,
        })?;

        self.cache.invalidate(segment.id());
        self.save_and_publish(&mut segment).await?;
        info!(
            segment_id = %segment.id(),
            definition_changed,
            revision = segment.revision(),
            "Segment updated"
        );
        Ok(segment)
    }

    async fn delete_segment(&self, segment_id: &EntityId) -> Result<(), UseCaseError> {
        let mut segment = self.load(segment_id).await?;
        segment.mark_deleted();

        self.segment_repo.delete(segment_id).await?;
        self.cache.invalidate(segment_id);
        self.event_publisher.publish(segment.take_events()).await?;
        info!(segment_id = %segment_id, "Segment deleted");
        Ok(())
    }

    async fn duplicate_segment(
        &self,
        segment_id: &EntityId,
        name: String,
        created_by: EntityId,
    ) -> Result<Segment, UseCaseError> {
        let original = self.load(segment_id).await?;
        let mut copy = original.duplicate(&name, created_by)?;

        self.save_and_publish(&mut copy).await?;
        info!(segment_id = %copy.id(), source = %segment_id, "Segment duplicated");
        Ok(copy)
    }

    async fn get_segment(&self, segment_id: &EntityId) -> Result<Option<Segment>, UseCaseError> {
        Ok(self.segment_repo.find_by_id(segment_id).await?)
    }

    async fn list_segments(&self) -> Result<Vec<Segment>, UseCaseError> {
        Ok(self.segment_repo.list().await?)
    }

    async fn add_static_members(&self, segment_id: &EntityId, ids: Vec<EntityId>) -> Result<Segment, UseCaseError> {
        self.change_members(segment_id, move |s| s.add_static_members(ids)).await
    }

    async fn remove_static_members(&self, segment_id: &EntityId, ids: Vec<EntityId>) -> Result<Segment, UseCaseError> {
        self.change_members(segment_id, move |s| s.remove_static_members(ids)).await
    }

    async fn exclude_members(&self, segment_id: &EntityId, ids: Vec<EntityId>) -> Result<Segment, UseCaseError> {
        self.change_members(segment_id, move |s| s.exclude_members(ids)).await
    }

    async fn include_members(&self, segment_id: &EntityId, ids: Vec<EntityId>) -> Result<Segment, UseCaseError> {
        self.change_members(segment_id, move |s| s.include_members(ids)).await
    }

    async fn resolve_members(&self, segment_id: &EntityId) -> Result<Arc<Membership>, UseCaseError> {
        let segment = self.load(segment_id).await?;
        let snapshot = self.records.snapshot().await?;

        if let Some(membership) = self.cache.get(segment_id, segment.revision(), snapshot.version) {
            return Ok(membership);
        }

        let membership = Arc::new(MembershipResolver::resolve(&self.evaluator, &segment, &snapshot));
        self.cache.insert(membership.clone());

        self.record_bookkeeping(
            segment_id,
            membership.revision,
            SegmentBookkeeping::Calculated {
                member_count: membership.len(),
                resolved_at: membership.calculated_at,
            },
        )
        .await?;

        info!(
            segment_id = %segment_id,
            revision = membership.revision,
            snapshot_version = membership.snapshot_version,
            members = membership.len(),
            candidates = snapshot.len(),
            "Segment membership resolved"
        );
        Ok(membership)
    }

    async fn is_member(&self, segment_id: &EntityId, record_id: &EntityId) -> Result<bool, UseCaseError> {
        let segment = self.load(segment_id).await?;
        let snapshot = self.records.snapshot().await?;

        if let Some(membership) = self.cache.get(segment_id, segment.revision(), snapshot.version) {
            return Ok(membership.contains(record_id));
        }
        Ok(MembershipResolver::is_member(
            &self.evaluator,
            &segment,
            record_id,
            snapshot.find(record_id),
        ))
    }

    fn compile_rules(&self, group: LooseConditionGroup) -> Result<ConditionGroup, UseCaseError> {
        Ok(group.into_group(self.evaluator.options().list_delimiter)?)
    }

    async fn preview(&self, group: &ConditionGroup, sample_size: usize) -> Result<Preview, UseCaseError> {
        let snapshot = self.records.snapshot().await?;
        let preview = MembershipResolver::preview(&self.evaluator, group, &snapshot, sample_size);
        debug!(matched = preview.matched, total = preview.total, "Segment preview");
        Ok(preview)
    }

    async fn recompute_segment_stats(&self, segment_id: &EntityId) -> Result<SegmentStats, UseCaseError> {
        let membership = self.resolve_members(segment_id).await?;

        let segment = self.load(segment_id).await?;
        let stats = self.stats.segment_stats(&segment, &membership).await?;

        self.record_bookkeeping(segment_id, membership.revision, SegmentBookkeeping::Stats(stats.clone()))
            .await?;
        info!(
            segment_id = %segment_id,
            members = stats.member_count,
            growth_rate = ?stats.growth_rate,
            conversion_rate = ?stats.conversion_rate,
            "Segment stats recomputed"
        );
        Ok(stats)
    }
}
