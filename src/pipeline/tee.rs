//! Output capture for cache filling.
//!
//! The tee sees every chunk after the last transform. When the stream
//! completes, the captured body and its length are handed to the cache.
//! A tee that is dropped before completion inserts nothing, and a body that
//! grows past the cache's byte limit stops being captured.

use std::path::PathBuf;

use axum::http::{header, HeaderMap, HeaderValue};
use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::cache::ByteCache;
use crate::tasks::FileWatchInvalidator;

/// Where a completed capture goes.
#[derive(Debug)]
pub struct CacheFill {
    cache: ByteCache,
    key: String,
    headers: HeaderMap,
    watch: Option<(FileWatchInvalidator, PathBuf)>,
}

impl CacheFill {
    pub fn new(cache: ByteCache, key: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            cache,
            key: key.into(),
            headers,
            watch: None,
        }
    }

    /// Watches `path` for as long as its body stays cached.
    pub fn watching(mut self, invalidator: FileWatchInvalidator, path: PathBuf) -> Self {
        self.watch = Some((invalidator, path));
        self
    }

    /// Largest body the cache could accept.
    pub fn limit(&self) -> usize {
        self.cache.config().max_bytes
    }

    /// Inserts the complete body with its final `Content-Length`.
    ///
    /// The watch goes up before the insert so a change racing the fill still
    /// evicts it. A watch this fill registered is dropped again when the
    /// cache declines the body.
    pub async fn complete(self, data: Bytes) -> bool {
        let mut headers = self.headers;
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(data.len()));

        let registered = match &self.watch {
            Some((invalidator, path)) => match invalidator.watch(path).await {
                Ok(added) => added,
                Err(e) => {
                    debug!(path = %path.display(), "Cannot watch file: {}", e);
                    false
                }
            },
            None => false,
        };

        let len = data.len();
        let accepted = self.cache.set(self.key.clone(), headers, data).await;
        debug!(key = %self.key, len, accepted, "Cache fill");

        if !accepted && registered {
            if let Some((invalidator, path)) = &self.watch {
                invalidator.unwatch(path).await;
            }
        }
        accepted
    }
}

/// Copies the outgoing stream when a fill is attached.
#[derive(Debug)]
pub struct Tee {
    fill: Option<CacheFill>,
    buf: BytesMut,
    limit: usize,
}

impl Tee {
    /// A tee that fills `fill` on completion.
    pub fn filling(fill: CacheFill) -> Self {
        Self {
            limit: fill.limit(),
            fill: Some(fill),
            buf: BytesMut::new(),
        }
    }

    /// A tee that captures nothing.
    pub fn passthrough() -> Self {
        Self {
            fill: None,
            buf: BytesMut::new(),
            limit: 0,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.fill.is_some()
    }

    /// Copies `chunk`, or gives up the fill once the body outgrows the cache.
    pub fn capture(&mut self, chunk: &Bytes) {
        let Some(fill) = &self.fill else {
            return;
        };

        if self.buf.len() + chunk.len() > self.limit {
            debug!(key = %fill.key, limit = self.limit, "Body outgrew the cache, fill abandoned");
            self.fill = None;
            self.buf = BytesMut::new();
            return;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes captured so far.
    pub fn captured(&self) -> usize {
        self.buf.len()
    }

    /// Finishes the capture, returning whether the cache took the body.
    pub async fn finish(self) -> bool {
        match self.fill {
            Some(fill) => fill.complete(self.buf.freeze()).await,
            None => false,
        }
    }
}
