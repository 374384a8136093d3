//! In-memory customer record source
//!
//! Readers get the current snapshot lock-free; writers serialize on a mutex
//! and publish a new snapshot with the next version.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::domain::value_objects::{CustomerRecord, EntityId, RecordSnapshot};
use crate::ports::outbound::{RecordSource, RepositoryError};

pub struct InMemoryRecordSource {
    current: ArcSwap<RecordSnapshot>,
    write_lock: Mutex<()>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RecordSnapshot::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Swap in a whole new record set
    pub fn replace(&self, records: Vec<CustomerRecord>) -> u64 {
        let _guard = self.write_lock.lock();
        self.publish(records)
    }

    /// Insert a record or overwrite the one with the same id
    pub fn upsert(&self, record: CustomerRecord) -> u64 {
        let _guard = self.write_lock.lock();
        let mut records = self.current.load().records.to_vec();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.publish(records)
    }

    /// Returns `None` when no such record exists; the version is left alone
    pub fn remove(&self, id: &EntityId) -> Option<u64> {
        let _guard = self.write_lock.lock();
        let current = self.current.load();
        if current.find(id).is_none() {
            return None;
        }
        let records = current.records.iter().filter(|r| &r.id != id).cloned().collect();
        Some(self.publish(records))
    }

    fn publish(&self, records: Vec<CustomerRecord>) -> u64 {
        let version = self.current.load().version + 1;
        debug!(version, records = records.len(), "Record snapshot published");
        self.current.store(Arc::new(RecordSnapshot::new(version, records)));
        version
    }
}

impl Default for InMemoryRecordSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn snapshot(&self) -> Result<RecordSnapshot, RepositoryError> {
        Ok(RecordSnapshot::clone(&self.current.load()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Field;

    fn record(id: &str, revenue: f64) -> CustomerRecord {
        CustomerRecord::new(EntityId::from(id)).with(Field::Revenue, revenue)
    }

    #[tokio::test]
    async fn test_versions_advance_on_every_write() {
        let source = InMemoryRecordSource::new();
        assert_eq!(source.snapshot().await.unwrap().version, 0);

        assert_eq!(source.replace(vec![record("a", 1.0), record("b", 2.0)]), 1);
        assert_eq!(source.upsert(record("a", 5.0)), 2);
        assert_eq!(source.len(), 2);

        let snapshot = source.snapshot().await.unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(
            snapshot.find(&EntityId::from("a")).and_then(|r| r.get(Field::Revenue)).and_then(|v| v.as_number()),
            Some(5.0)
        );
    }

    #[tokio::test]
    async fn test_old_snapshots_are_unaffected() {
        let source = InMemoryRecordSource::new();
        source.replace(vec![record("a", 1.0)]);
        let before = source.snapshot().await.unwrap();

        source.upsert(record("b", 1.0));
        assert_eq!(before.len(), 1);
        assert_eq!(source.snapshot().await.unwrap().len(), 2);
    }

    #[test]
    fn test_remove_missing_keeps_version() {
        let source = InMemoryRecordSource::new();
        source.replace(vec![record("a", 1.0)]);

        assert_eq!(source.remove(&EntityId::from("zzz")), None);
        assert_eq!(source.version(), 1);
        assert_eq!(source.remove(&EntityId::from("a")), Some(2));
        assert!(source.is_empty());
    }
}
