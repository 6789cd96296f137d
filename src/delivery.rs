//! Segmented Delivery Module
//!
//! Writes cached bodies back to clients. Small bodies go out in one write;
//! bodies at or above the segment threshold are sliced into bounded windows
//! that the connection pulls one at a time.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream;

use crate::cache::CacheEntry;

/// Largest single write for a segmented body.
pub const SEGMENT_WINDOW: usize = 64 * 1024;

/// Zero-copy windows over a byte buffer.
#[derive(Debug, Clone)]
pub struct Segments {
    data: Bytes,
    window: usize,
}

impl Segments {
    pub fn new(data: Bytes, window: usize) -> Self {
        Self {
            data,
            window: window.max(1),
        }
    }
}

impl Iterator for Segments {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.data.is_empty() {
            return None;
        }
        let take = self.window.min(self.data.len());
        Some(self.data.split_to(take))
    }
}

/// Window size for a given threshold.
pub fn window_for(threshold: usize) -> usize {
    SEGMENT_WINDOW.min(threshold).max(1)
}

/// Builds a response body for a complete cached payload.
///
/// The stream is only polled when the connection can take more, so a slow
/// client holds at most one window in flight beyond what the cache already
/// owns.
pub fn segmented_body(data: Bytes, threshold: usize) -> Body {
    if data.len() < threshold {
        return Body::from(data);
    }
    let segments = Segments::new(data, window_for(threshold));
    Body::from_stream(stream::iter(segments.map(Ok::<_, Infallible>)))
}

/// Serves a cache hit. The entry's header snapshot already carries
/// `Content-Length`, so nothing here recomputes it.
pub fn cached_response(entry: CacheEntry, threshold: usize, head_only: bool) -> Response {
    let body = if head_only {
        Body::empty()
    } else {
        segmented_body(entry.data, threshold)
    };

    let mut response = (StatusCode::OK, body).into_response();
    *response.headers_mut() = entry.headers;
    response
}
