//! Membership cache keyed by segment id

use audience_common::{AtomicCounter, CacheConfig};
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::services::Membership;
use crate::domain::value_objects::EntityId;

/// Resolved memberships with bounded size and TTL.
///
/// An entry is only served while the segment revision and the record
/// snapshot version it was computed from are both current.
pub struct MembershipCache {
    cache: Cache<EntityId, Arc<Membership>>,
    hits: AtomicCounter,
    misses: AtomicCounter,
}

impl MembershipCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.time_to_live_secs))
            .build();

        Self {
            cache,
            hits: AtomicCounter::new(0),
            misses: AtomicCounter::new(0),
        }
    }

    /// Get cached membership if it matches `revision` and `snapshot_version`
    pub fn get(&self, segment_id: &EntityId, revision: u64, snapshot_version: u64) -> Option<Arc<Membership>> {
        match self.cache.get(segment_id) {
            Some(membership) if membership.is_current(revision, snapshot_version) => {
                self.hits.inc();
                debug!(segment_id = %segment_id, revision, "Membership cache hit");
                Some(membership)
            }
            Some(stale) => {
                self.misses.inc();
                debug!(
                    segment_id = %segment_id,
                    cached_revision = stale.revision,
                    revision,
                    cached_snapshot = stale.snapshot_version,
                    snapshot_version,
                    "Membership cache entry stale"
                );
                self.cache.invalidate(segment_id);
                None
            }
            None => {
                self.misses.inc();
                debug!(segment_id = %segment_id, "Membership cache miss");
                None
            }
        }
    }

    pub fn insert(&self, membership: Arc<Membership>) {
        self.cache.insert(membership.segment_id.clone(), membership);
    }

    pub fn invalidate(&self, segment_id: &EntityId) {
        self.cache.invalidate(segment_id);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Share of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.get();
        let total = hits + self.misses.get();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    pub fn misses(&self) -> u64 {
        self.misses.get()
    }

    /// Approximate entry count (moka applies writes lazily)
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.entry_count() == 0
    }
}

impl Default for MembershipCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
