//! Explicit context object wiring the services to their collaborators

use audience_common::{AudienceConfig, AudienceResult};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::commands::{SegmentService, TagService};
use crate::application::dto::AudienceSnapshot;
use crate::cache::MembershipCache;
use crate::domain::services::{ConditionEvaluator, EvaluationOptions, TagHierarchy};
use crate::infrastructure::{
    InMemoryRecordSource, InMemorySegmentRepository, InMemoryTagRepository, JsonFileKeyValueStore,
    SnapshotStatsProvider, TracingEventPublisher,
};
use crate::ports::inbound::UseCaseError;
use crate::ports::outbound::{
    EventPublisher, KeyValueStore, RecordSource, RepositoryError, SegmentRepository,
    StatsProvider, TagRepository,
};

/// Collaborators injected into [`AudienceContext`]
#[derive(Clone)]
pub struct AudiencePorts {
    pub tags: Arc<dyn TagRepository>,
    pub segments: Arc<dyn SegmentRepository>,
    pub records: Arc<dyn RecordSource>,
    pub stats: Arc<dyn StatsProvider>,
    pub events: Arc<dyn EventPublisher>,
}

impl AudiencePorts {
    /// In-memory repositories, snapshot-based stats and tracing events
    /// around the given record source
    pub fn in_memory(records: Arc<dyn RecordSource>) -> Self {
        let segments: Arc<dyn SegmentRepository> = Arc::new(InMemorySegmentRepository::new());
        Self {
            tags: Arc::new(InMemoryTagRepository::new()),
            stats: Arc::new(SnapshotStatsProvider::new(records.clone(), segments.clone())),
            segments,
            records,
            events: Arc::new(TracingEventPublisher),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }
}

/// Tag and segment services sharing one configuration, one set of
/// collaborators and one membership cache
pub struct AudienceContext {
    config: AudienceConfig,
    ports: AudiencePorts,
    cache: Arc<MembershipCache>,
    tags: TagService,
    segments: SegmentService,
}

impl AudienceContext {
    pub fn new(config: AudienceConfig, ports: AudiencePorts) -> AudienceResult<Self> {
        config.validate()?;

        let cache = Arc::new(MembershipCache::new(&config.cache));
        let evaluator = ConditionEvaluator::new(EvaluationOptions::from(&config.evaluation));

        let tags = TagService::new(
            ports.tags.clone(),
            ports.segments.clone(),
            ports.stats.clone(),
            ports.events.clone(),
            config.tags.clone(),
        );
        let segments = SegmentService::new(
            ports.segments.clone(),
            ports.tags.clone(),
            ports.records.clone(),
            ports.stats.clone(),
            ports.events.clone(),
            cache.clone(),
            evaluator,
        );

        info!(
            text_match = ?config.evaluation.text_match,
            cache_capacity = config.cache.max_capacity,
            max_tag_depth = config.tags.max_depth,
            "Audience context ready"
        );

        Ok(Self {
            config,
            ports,
            cache,
            tags,
            segments,
        })
    }

    /// Fully in-memory context with an empty record source
    pub fn in_memory(config: AudienceConfig) -> AudienceResult<Self> {
        let records: Arc<dyn RecordSource> = Arc::new(InMemoryRecordSource::new());
        Self::new(config, AudiencePorts::in_memory(records))
    }

    pub fn config(&self) -> &AudienceConfig {
        &self.config
    }

    pub fn tags(&self) -> &TagService {
        &self.tags
    }

    pub fn segments(&self) -> &SegmentService {
        &self.segments
    }

    pub fn records(&self) -> &Arc<dyn RecordSource> {
        &self.ports.records
    }

    pub fn cache(&self) -> &MembershipCache {
        &self.cache
    }

    /// Key under which [`AudienceContext::persist`] stores the snapshot
    pub fn snapshot_key(&self) -> String {
        format!("{}.snapshot", self.config.storage.key_prefix)
    }

    /// The JSON file store named by `storage.snapshot_path`, if configured
    pub fn configured_store(&self) -> AudienceResult<Option<JsonFileKeyValueStore>> {
        self.config
            .storage
            .snapshot_path
            .as_ref()
            .map(JsonFileKeyValueStore::open)
            .transpose()
    }

    /// Write every tag and segment to `store`
    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<(), UseCaseError> {
        let snapshot = AudienceSnapshot::new(
            self.ports.tags.list().await?,
            self.ports.segments.list().await?,
        );
        let json = serde_json::to_string(&snapshot).map_err(RepositoryError::from)?;

        store.set(&self.snapshot_key(), json).await?;
        info!(
            tags = snapshot.tags.len(),
            segments = snapshot.segments.len(),
            key = %self.snapshot_key(),
            "Audience snapshot persisted"
        );
        Ok(())
    }

    /// Replace repository contents with the snapshot in `store`.
    ///
    /// Returns `false` when the store holds no snapshot.
    pub async fn restore(&self, store: &dyn KeyValueStore) -> Result<bool, UseCaseError> {
        let Some(json) = store.get(&self.snapshot_key()).await? else {
            return Ok(false);
        };
        let snapshot: AudienceSnapshot = serde_json::from_str(&json).map_err(RepositoryError::from)?;
        if snapshot.format_version != AudienceSnapshot::FORMAT_VERSION {
            return Err(RepositoryError::Serialization(format!(
                "unsupported snapshot format {}",
                snapshot.format_version
            ))
            .into());
        }

        let report = TagHierarchy::new(snapshot.tags.clone()).integrity_report();
        if !report.is_clean() {
            warn!(
                cyclic = report.cyclic.len(),
                dangling = report.dangling.len(),
                "Restored tag hierarchy has integrity problems"
            );
        }

        let (tags, segments) = (snapshot.tags.len(), snapshot.segments.len());
        self.ports.tags.replace_all(snapshot.tags).await?;
        self.ports.segments.replace_all(snapshot.segments).await?;
        self.cache.clear();

        info!(tags, segments, "Audience snapshot restored");
        Ok(true)
    }
}
