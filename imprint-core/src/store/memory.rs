//! In-memory fingerprint store.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{FingerprintRecord, FingerprintStore};
use crate::error::StoreError;

/// Fingerprint store backed by a concurrent hash map.
///
/// Each key lives in a single shard, so an upsert holds that shard's write
/// lock for the whole replacement.
#[derive(Debug, Default)]
pub struct MemoryFingerprintStore {
    records: DashMap<String, FingerprintRecord>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FingerprintStore for MemoryFingerprintStore {
    async fn upsert(&self, record: &FingerprintRecord) -> Result<(), StoreError> {
        self.records.insert(record.key.clone(), record.clone());
        tracing::debug!(key = %record.key, "Stored fingerprint");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<FingerprintRecord>, StoreError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<FingerprintRecord>, StoreError> {
        let mut records: Vec<FingerprintRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(key).is_some())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.len() as u64)
    }
}
