use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::LraId;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::record::LraRecord;
use crate::store::RecordStore;

/// In-memory record store.
///
/// Backs the coordinator in tests and single-node deployments. Records are
/// cloned out on read, so a caller never holds the store lock across a
/// participant callback.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<LraId, LraRecord>>>,
}

impl InMemoryRecordStore {
    /// Creates a new empty record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records held.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put(&self, record: LraRecord) -> Result<()> {
        self.records.write().await.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: LraId) -> Result<LraRecord> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_active(&self) -> Result<Vec<LraRecord>> {
        let records = self.records.read().await;
        let mut active: Vec<_> = records
            .values()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect();
        active.sort_by_key(|r| r.started_at);
        Ok(active)
    }

    async fn list_all(&self) -> Result<Vec<LraRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by_key(|r| r.started_at);
        Ok(all)
    }

    async fn delete(&self, id: LraId) -> Result<()> {
        self.records.write().await.remove(&id);
        Ok(())
    }
}
