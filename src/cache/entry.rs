//! Cache Entry Module
//!
//! Defines a single cached response body with its header snapshot.

use std::time::Duration;

use axum::http::{header, HeaderMap};
use bytes::Bytes;
use tokio::time::Instant;

// == Cache Entry ==
/// A complete, already transformed response body plus the headers it was
/// produced with.
///
/// Headers and data are fixed at insertion. Only `last_access` moves, and only
/// the store moves it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Canonical absolute file path
    pub key: String,
    /// Response headers snapshot
    pub headers: HeaderMap,
    /// Complete response body
    pub data: Bytes,
    /// Last successful read (or insertion)
    pub last_access: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry, accessed now.
    pub fn new(key: String, headers: HeaderMap, data: Bytes) -> Self {
        Self {
            key,
            headers,
            data,
            last_access: Instant::now(),
        }
    }

    /// Size of the body in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // == Is Expired ==
    /// Checks whether the entry has gone `ttl` without access.
    ///
    /// Boundary condition: an entry idle for exactly `ttl` is expired.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_access) >= ttl
    }

    /// Marks the entry as read at `now`.
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_access = now;
    }

    /// The `Last-Modified` value the body was produced with.
    pub fn last_modified(&self) -> Option<&str> {
        self.headers
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
    }

    /// Whether the body is gzip encoded.
    pub fn is_gzip(&self) -> bool {
        self.headers
            .get(header::CONTENT_ENCODING)
            .map(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"))
            .unwrap_or(false)
    }
}
