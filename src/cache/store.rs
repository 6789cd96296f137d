//! Cache Store Module
//!
//! Bounded byte cache combining HashMap storage with LRU tracking and
//! inactivity expiry.

use std::collections::HashMap;

use axum::http::HeaderMap;
use bytes::Bytes;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LruTracker};
use crate::config::CacheConfig;

// == Cache Store ==
/// Cache storage bounded by entry count and total bytes.
///
/// `total_bytes` always equals the sum of the stored body sizes and
/// `entries.len()` never exceeds `max_entries`.
#[derive(Debug)]
pub struct CacheStore {
    /// Path-keyed storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Sum of `data.len()` over all entries
    total_bytes: usize,
    /// Limits fixed at construction
    config: CacheConfig,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with the given limits.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            total_bytes: 0,
            config,
        }
    }

    // == Set ==
    /// Inserts a complete body, returning whether it was accepted.
    ///
    /// Declined without any state change when the body alone exceeds
    /// `max_bytes`, or when it would push the byte total past `max_bytes`.
    /// An existing entry under the same key is replaced, and its size does
    /// not count against the new one. At `max_entries`, the least recently
    /// accessed entry is evicted first.
    pub fn set(&mut self, key: String, headers: HeaderMap, data: Bytes) -> bool {
        if self.config.is_disabled() {
            return false;
        }

        let len = data.len();
        let replaced = self.entries.get(&key).map(CacheEntry::len).unwrap_or(0);
        let projected = self.total_bytes - replaced;

        if len > self.config.max_bytes || projected + len > self.config.max_bytes {
            debug!(key = %key, len, total = self.total_bytes, "Cache set rejected");
            self.stats.record_rejection();
            return false;
        }

        // Replacement is remove-then-insert
        self.remove_entry(&key);

        if self.entries.len() >= self.config.max_entries {
            if let Some(evicted) = self.lru.evict_oldest() {
                if let Some(entry) = self.entries.remove(&evicted) {
                    self.total_bytes -= entry.len();
                }
                self.stats.record_eviction();
                debug!(key = %evicted, "Evicted least recently used entry");
            }
        }

        self.lru.touch(&key);
        self.total_bytes += len;
        self.entries.insert(key.clone(), CacheEntry::new(key, headers, data));
        self.sync_totals();
        true
    }

    // == Get ==
    /// Retrieves an entry, pushing its expiry window forward.
    ///
    /// An entry found idle for `ttl` or longer is removed and reported as a
    /// miss, whether or not the sweep has reached it yet.
    pub fn get(&mut self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let ttl = self.config.ttl;

        let expired = match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(ttl, now) => {
                entry.touch(now);
                let entry = entry.clone();
                self.lru.touch(key);
                self.stats.record_hit();
                return Some(entry);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            self.sync_totals();
        }
        self.stats.record_miss();
        None
    }

    // == Remove ==
    /// Removes an entry if present. Idempotent.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key);
        self.sync_totals();
        removed
    }

    /// Removes an entry because its backing file changed.
    pub fn invalidate(&mut self, key: &str) -> bool {
        let removed = self.remove(key);
        if removed {
            self.stats.record_invalidation();
        }
        removed
    }

    // == Sweep Expired ==
    /// Removes all entries idle for `ttl` or longer.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let ttl = self.config.ttl;
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(ttl, now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }

        self.stats.record_expirations(expired.len());
        self.sync_totals();
        expired.len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.total_bytes -= entry.len();
                self.lru.remove(key);
                true
            }
            None => false,
        }
    }

    fn sync_totals(&mut self) {
        self.stats.set_totals(self.entries.len(), self.total_bytes);
    }
}
