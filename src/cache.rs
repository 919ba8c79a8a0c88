//! In-memory cache with per-key cooperative locking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::traits::{Cache, CacheHandle};

/// Reference [`Cache`] implementation.
///
/// One task holds a key's entry at a time; values expire after their TTL.
#[derive(Default)]
pub struct InMemoryCache {
    locks: DashMap<String, Arc<Mutex<()>>>,
    entries: Arc<DashMap<String, (Value, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn acquire(&self, key: &str) -> Box<dyn CacheHandle> {
        let lock = self
            .locks
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        Box::new(InMemoryCacheHandle {
            key: key.to_owned(),
            entries: Arc::clone(&self.entries),
            _guard: guard,
        })
    }
}

struct InMemoryCacheHandle {
    key: String,
    entries: Arc<DashMap<String, (Value, Instant)>>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl CacheHandle for InMemoryCacheHandle {
    fn result(&self) -> Option<Value> {
        self.entries.get(&self.key).and_then(|entry| {
            let (value, deadline) = entry.value();
            (*deadline > Instant::now()).then(|| value.clone())
        })
    }

    async fn set_result(&mut self, value: Value, ttl: Duration) {
        self.entries
            .insert(self.key.clone(), (value, Instant::now() + ttl));
    }
}
