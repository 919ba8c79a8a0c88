//! Typed record storage with tag-based queries.
//!
//! Records are opaque string values addressed by `(kind, id)` and indexed by
//! string tags. The [`RecordStore`] trait is the persistence seam consumed by
//! the connection manager; [`InMemoryStore`] is the bundled reference
//! implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod memory;

pub use memory::InMemoryStore;

/// Errors for record store operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate record id: {0}")]
    DuplicateId(String),
    #[error("generic: {0}")]
    Generic(String),
}

/// A stored record: a typed, tagged, opaque value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRecord {
    /// Record kind, e.g. `"connection"` or `"did_doc"`.
    pub kind: String,
    pub id: String,
    pub value: String,
    pub tags: HashMap<String, String>,
}

impl StorageRecord {
    /// Creates a record with a fresh UUID identifier.
    pub fn new(kind: impl Into<String>, value: impl Into<String>, tags: HashMap<String, String>) -> Self {
        Self::with_id(kind, Uuid::new_v4().to_string(), value, tags)
    }

    pub fn with_id(
        kind: impl Into<String>,
        id: impl Into<String>,
        value: impl Into<String>,
        tags: HashMap<String, String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            value: value.into(),
            tags,
        }
    }

    /// Whether every `(key, value)` pair of `query` matches this record's tags.
    pub fn matches(&self, query: &HashMap<String, String>) -> bool {
        query.iter().all(|(k, v)| self.tags.get(k) == Some(v))
    }
}

/// Async record store contract.
///
/// Lookups by tag return `Option`/`Vec` rather than failing; mutations of a
/// specific record fail with [`StorageError::NotFound`] when the target is
/// absent.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Adds a new record. Fails with [`StorageError::DuplicateId`] if a record
    /// of the same kind and id already exists.
    async fn add_record(&self, record: StorageRecord) -> Result<(), StorageError>;

    /// Replaces the value and tags of an existing record.
    async fn update_record(&self, record: StorageRecord) -> Result<(), StorageError>;

    async fn delete_record(&self, kind: &str, id: &str) -> Result<(), StorageError>;

    async fn get_record(&self, kind: &str, id: &str) -> Result<Option<StorageRecord>, StorageError>;

    /// Returns one record of `kind` matching every tag in `query`, if any.
    async fn find_one(
        &self,
        kind: &str,
        query: &HashMap<String, String>,
    ) -> Result<Option<StorageRecord>, StorageError>;

    /// Returns all records of `kind` matching every tag in `query`.
    async fn find_all(
        &self,
        kind: &str,
        query: &HashMap<String, String>,
    ) -> Result<Vec<StorageRecord>, StorageError>;
}
