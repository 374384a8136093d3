//! In-memory repository implementations

mod kv;

pub use kv::{InMemoryKeyValueStore, JsonFileKeyValueStore};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::info;

use crate::domain::aggregates::{Segment, Tag};
use crate::domain::value_objects::EntityId;
use crate::domain::DomainEvent;
use crate::ports::outbound::{
    EventPublisher, RepositoryError, SegmentBookkeeping, SegmentRepository, TagRepository,
};

/// Map that remembers first-insertion order
struct Ordered<T> {
    order: Vec<EntityId>,
    items: HashMap<EntityId, T>,
}

impl<T: Clone> Ordered<T> {
    fn new() -> Self {
        Self {
            order: vec![],
            items: HashMap::new(),
        }
    }

    fn upsert(&mut self, id: &EntityId, item: T) {
        if self.items.insert(id.clone(), item).is_none() {
            self.order.push(id.clone());
        }
    }

    fn remove(&mut self, id: &EntityId) -> Result<(), RepositoryError> {
        self.items.remove(id).ok_or(RepositoryError::NotFound)?;
        self.order.retain(|o| o != id);
        Ok(())
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    fn replace(&mut self, items: impl IntoIterator<Item = (EntityId, T)>) {
        self.order.clear();
        self.items.clear();
        for (id, item) in items {
            self.upsert(&id, item);
        }
    }
}

/// In-memory tag repository
pub struct InMemoryTagRepository {
    tags: RwLock<Ordered<Tag>>,
}

impl InMemoryTagRepository {
    pub fn new() -> Self {
        Self {
            tags: RwLock::new(Ordered::new()),
        }
    }
}

impl Default for InMemoryTagRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TagRepository for InMemoryTagRepository {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Tag>, RepositoryError> {
        Ok(self.tags.read().items.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Tag>, RepositoryError> {
        Ok(self.tags.read().values().cloned().collect())
    }

    async fn save(&self, tag: &Tag) -> Result<(), RepositoryError> {
        let mut stored = tag.clone();
        stored.take_events();
        self.tags.write().upsert(tag.id(), stored);
        Ok(())
    }

    async fn delete(&self, id: &EntityId) -> Result<(), RepositoryError> {
        self.tags.write().remove(id)
    }

    async fn replace_all(&self, tags: Vec<Tag>) -> Result<(), RepositoryError> {
        self.tags
            .write()
            .replace(tags.into_iter().map(|t| (t.id().clone(), t)));
        Ok(())
    }
}

/// In-memory segment repository
pub struct InMemorySegmentRepository {
    segments: RwLock<Ordered<Segment>>,
}

impl InMemorySegmentRepository {
    pub fn new() -> Self {
        Self {
            segments: RwLock::new(Ordered::new()),
        }
    }
}

impl Default for InMemorySegmentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentRepository for InMemorySegmentRepository {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Segment>, RepositoryError> {
        Ok(self.segments.read().items.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Segment>, RepositoryError> {
        Ok(self.segments.read().values().cloned().collect())
    }

    async fn find_by_tag(&self, tag_id: &EntityId) -> Result<Vec<Segment>, RepositoryError> {
        Ok(self
            .segments
            .read()
            .values()
            .filter(|s| s.tags().contains(tag_id))
            .cloned()
            .collect())
    }

    async fn save(&self, segment: &Segment) -> Result<(), RepositoryError> {
        let mut stored = segment.clone();
        stored.take_events();
        self.segments.write().upsert(segment.id(), stored);
        Ok(())
    }

    async fn record_at_revision(
        &self,
        id: &EntityId,
        revision: u64,
        bookkeeping: SegmentBookkeeping,
    ) -> Result<Option<Segment>, RepositoryError> {
        let mut segments = self.segments.write();
        let Some(stored) = segments.items.get_mut(id) else {
            return Ok(None);
        };
        if stored.revision() != revision {
            return Ok(None);
        }

        bookkeeping.apply_to(stored);
        let updated = stored.clone();
        stored.take_events();
        Ok(Some(updated))
    }

    async fn delete(&self, id: &EntityId) -> Result<(), RepositoryError> {
        self.segments.write().remove(id)
    }

    async fn replace_all(&self, segments: Vec<Segment>) -> Result<(), RepositoryError> {
        self.segments
            .write()
            .replace(segments.into_iter().map(|s| (s.id().clone(), s)));
        Ok(())
    }
}

/// No-op event publisher
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Logs each event at info level
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        for event in &events {
            info!(
                event_type = event.event_type(),
                aggregate_id = %event.aggregate_id(),
                "Domain event"
            );
        }
        Ok(())
    }
}

/// Collects events for later inspection
#[derive(Default)]
pub struct InMemoryEventPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drain everything published so far
    pub fn take(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        self.events.lock().extend(events);
        Ok(())
    }
}
