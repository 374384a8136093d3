//! Tag application service

use async_trait::async_trait;
use audience_common::TagConfig;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::dto::*;
use crate::domain::aggregates::{Tag, TagDraft, TagPatch};
use crate::domain::services::{DeleteMode, IntegrityReport, TagHierarchy, TagPath, TagSort};
use crate::domain::value_objects::{EntityId, TagColor, TagStats};
use crate::ports::inbound::{TagUseCases, UseCaseError};
use crate::ports::outbound::{EventPublisher, SegmentRepository, StatsProvider, TagRepository};

/// Tag application service
pub struct TagService {
    tag_repo: Arc<dyn TagRepository>,
    segment_repo: Arc<dyn SegmentRepository>,
    stats: Arc<dyn StatsProvider>,
    event_publisher: Arc<dyn EventPublisher>,
    config: TagConfig,
}

impl TagService {
    pub fn new(
        tag_repo: Arc<dyn TagRepository>,
        segment_repo: Arc<dyn SegmentRepository>,
        stats: Arc<dyn StatsProvider>,
        event_publisher: Arc<dyn EventPublisher>,
        config: TagConfig,
    ) -> Self {
        Self {
            tag_repo,
            segment_repo,
            stats,
            event_publisher,
            config,
        }
    }

    async fn hierarchy(&self) -> Result<TagHierarchy, UseCaseError> {
        Ok(TagHierarchy::new(self.tag_repo.list().await?))
    }

    async fn load(&self, id: &EntityId) -> Result<Tag, UseCaseError> {
        self.tag_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| UseCaseError::tag_not_found(id))
    }

    async fn save_and_publish(&self, tag: &mut Tag) -> Result<(), UseCaseError> {
        let events = tag.take_events();
        self.tag_repo.save(tag).await?;
        self.event_publisher.publish(events).await?;
        Ok(())
    }
}

fn parse_color(color: Option<String>) -> Result<Option<TagColor>, UseCaseError> {
    Ok(color.map(TagColor::new).transpose()?)
}

fn build_tree(
    hierarchy: &TagHierarchy,
    parent: Option<&EntityId>,
    sort: Option<TagSort>,
    seen: &mut HashSet<EntityId>,
) -> Vec<TagTreeNode> {
    let mut nodes = vec![];
    for tag in hierarchy.children_of(parent, sort) {
        if !seen.insert(tag.id().clone()) {
            continue;
        }
        nodes.push(TagTreeNode {
            tag: tag.clone(),
            children: build_tree(hierarchy, Some(tag.id()), sort, seen),
        });
    }
    nodes
}

#[async_trait]
impl TagUseCases for TagService {
    async fn create_tag(&self, command: CreateTagCommand) -> Result<Tag, UseCaseError> {
        let color = parse_color(command.color)?.unwrap_or_default();

        let hierarchy = self.hierarchy().await?;
        hierarchy.validate_placement(None, command.parent_id.as_ref(), self.config.max_depth)?;

        let mut tag = Tag::create(TagDraft {
            name: command.name,
            description: command.description,
            color,
            tag_type: command.tag_type,
            parent_id: command.parent_id,
            created_by: command.created_by,
        })?;

        self.save_and_publish(&mut tag).await?;
        info!(tag_id = %tag.id(), name = tag.name(), "Tag created");
        Ok(tag)
    }

    async fn update_tag(&self, command: UpdateTagCommand) -> Result<Tag, UseCaseError> {
        let mut tag = self.load(&command.tag_id).await?;

        let changed = tag.apply(TagPatch {
            name: command.name,
            description: command.description,
            color: parse_color(command.color)?,
            permissions: command.permissions,
        })?;

        self.save_and_publish(&mut tag).await?;
        info!(tag_id = %tag.id(), changed, "Tag updated");
        Ok(tag)
    }

    async fn move_tag(&self, tag_id: &EntityId, parent_id: Option<EntityId>) -> Result<Tag, UseCaseError> {
        let mut tag = self.load(tag_id).await?;

        let hierarchy = self.hierarchy().await?;
        hierarchy.validate_placement(Some(tag_id), parent_id.as_ref(), self.config.max_depth)?;

        if tag.reparent(parent_id)? {
            self.save_and_publish(&mut tag).await?;
            info!(tag_id = %tag_id, parent_id = ?tag.parent_id(), "Tag moved");
        }
        Ok(tag)
    }

    async fn delete_tag(&self, tag_id: &EntityId, mode: DeleteMode) -> Result<Vec<EntityId>, UseCaseError> {
        let hierarchy = self.hierarchy().await?;
        let plan = hierarchy.plan_delete(tag_id, mode)?;

        // Validate every mutation before writing any of them
        let mut lifted = Vec::with_capacity(plan.reparent.len());
        for (child_id, new_parent) in &plan.reparent {
            let mut child = self.load(child_id).await?;
            child.reparent(new_parent.clone())?;
            lifted.push(child);
        }
        let mut removed = Vec::with_capacity(plan.remove.len());
        for id in &plan.remove {
            let mut tag = self.load(id).await?;
            tag.mark_deleted()?;
            removed.push(tag);
        }

        for child in &mut lifted {
            self.save_and_publish(child).await?;
        }
        let mut events = vec![];
        for tag in &mut removed {
            self.tag_repo.delete(tag.id()).await?;
            events.extend(tag.take_events());
        }

        for id in &plan.remove {
            for mut segment in self.segment_repo.find_by_tag(id).await? {
                segment.detach_tag(id);
                self.segment_repo.save(&segment).await?;
            }
        }
        self.event_publisher.publish(events).await?;

        info!(
            tag_id = %tag_id,
            ?mode,
            removed = plan.remove.len(),
            reparented = plan.reparent.len(),
            "Tag deleted"
        );
        Ok(plan.remove)
    }

    async fn get_tag(&self, tag_id: &EntityId) -> Result<Option<Tag>, UseCaseError> {
        Ok(self.tag_repo.find_by_id(tag_id).await?)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, UseCaseError> {
        Ok(self.tag_repo.list().await?)
    }

    async fn children_of(
        &self,
        parent_id: Option<&EntityId>,
        sort: Option<TagSort>,
    ) -> Result<Vec<Tag>, UseCaseError> {
        let hierarchy = self.hierarchy().await?;
        if let Some(parent_id) = parent_id {
            if !hierarchy.contains(parent_id) {
                return Err(UseCaseError::tag_not_found(parent_id));
            }
        }
        Ok(hierarchy.children_of(parent_id, sort).into_iter().cloned().collect())
    }

    async fn path_to(&self, tag_id: &EntityId) -> Result<TagPath, UseCaseError> {
        Ok(self.hierarchy().await?.path_to(tag_id)?)
    }

    async fn tag_tree(&self, sort: Option<TagSort>) -> Result<Vec<TagTreeNode>, UseCaseError> {
        let hierarchy = self.hierarchy().await?;
        let mut seen = HashSet::new();
        let roots = build_tree(&hierarchy, None, sort, &mut seen);

        if seen.len() < hierarchy.len() {
            warn!(
                unreachable = hierarchy.len() - seen.len(),
                "Tags unreachable from any root were left out of the tree"
            );
        }
        Ok(roots)
    }

    async fn integrity_report(&self) -> Result<IntegrityReport, UseCaseError> {
        Ok(self.hierarchy().await?.integrity_report())
    }

    async fn recompute_tag_stats(&self, tag_id: &EntityId) -> Result<TagStats, UseCaseError> {
        let mut tag = self.load(tag_id).await?;
        let stats = self.stats.tag_stats(&tag).await?;

        tag.record_usage(stats.usage_count);
        self.save_and_publish(&mut tag).await?;
        Ok(stats)
    }
}
