//! Shared Cache Handle
//!
//! Cloneable handle serializing every store operation behind one lock.

use std::sync::Arc;

use axum::http::HeaderMap;
use bytes::Bytes;
use tokio::sync::Mutex;

use crate::cache::{CacheEntry, CacheStats, CacheStore};
use crate::config::CacheConfig;

// == Byte Cache ==
/// Injectable handle to one cache instance.
///
/// The entry map, the LRU index and the byte/entry totals all live behind the
/// same mutex, so membership and totals are never observed out of step.
#[derive(Debug, Clone)]
pub struct ByteCache {
    store: Arc<Mutex<CacheStore>>,
    config: Arc<CacheConfig>,
}

impl ByteCache {
    /// Creates an empty cache with the given limits.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(CacheStore::new(config.clone()))),
            config: Arc::new(config),
        }
    }

    /// Looks up a path, extending its life on a hit.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.store.lock().await.get(key)
    }

    /// Inserts a complete body. See [`CacheStore::set`] for the limits.
    pub async fn set(&self, key: impl Into<String>, headers: HeaderMap, data: Bytes) -> bool {
        self.store.lock().await.set(key.into(), headers, data)
    }

    /// Removes a path if cached.
    pub async fn remove(&self, key: &str) -> bool {
        self.store.lock().await.remove(key)
    }

    /// Removes a path whose file changed on disk.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.store.lock().await.invalidate(key)
    }

    /// Drops entries idle for longer than the ttl.
    pub async fn sweep_expired(&self) -> usize {
        self.store.lock().await.sweep_expired()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.store.lock().await.contains(key)
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn total_bytes(&self) -> usize {
        self.store.lock().await.total_bytes()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.lock().await.stats()
    }

    /// Limits this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
