use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{RecordStore, StorageError, StorageRecord};

/// In-memory [`RecordStore`] keyed by `(kind, id)`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: DashMap<(String, String), StorageRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: &str, id: &str) -> (String, String) {
        (kind.to_owned(), id.to_owned())
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn add_record(&self, record: StorageRecord) -> Result<(), StorageError> {
        let key = Self::key(&record.kind, &record.id);
        if self.records.contains_key(&key) {
            return Err(StorageError::DuplicateId(record.id));
        }
        self.records.insert(key, record);
        Ok(())
    }

    async fn update_record(&self, record: StorageRecord) -> Result<(), StorageError> {
        let key = Self::key(&record.kind, &record.id);
        if !self.records.contains_key(&key) {
            return Err(StorageError::NotFound);
        }
        self.records.insert(key, record);
        Ok(())
    }

    async fn delete_record(&self, kind: &str, id: &str) -> Result<(), StorageError> {
        self.records
            .remove(&Self::key(kind, id))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn get_record(&self, kind: &str, id: &str) -> Result<Option<StorageRecord>, StorageError> {
        Ok(self.records.get(&Self::key(kind, id)).map(|r| r.clone()))
    }

    async fn find_one(
        &self,
        kind: &str,
        query: &HashMap<String, String>,
    ) -> Result<Option<StorageRecord>, StorageError> {
        Ok(self
            .records
            .iter()
            .find(|entry| entry.kind == kind && entry.matches(query))
            .map(|entry| entry.clone()))
    }

    async fn find_all(
        &self,
        kind: &str,
        query: &HashMap<String, String>,
    ) -> Result<Vec<StorageRecord>, StorageError> {
        let mut records: Vec<StorageRecord> = self
            .records
            .iter()
            .filter(|entry| entry.kind == kind && entry.matches(query))
            .map(|entry| entry.clone())
            .collect();
        // DashMap iteration order is arbitrary; keep results stable for callers.
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
