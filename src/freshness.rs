//! Conditional request handling.
//!
//! Decides whether a client already holds the current representation by
//! comparing the resource's `Last-Modified` HTTP-date against the request's
//! `If-Modified-Since` value, byte for byte.

use std::time::SystemTime;

use axum::http::{header, HeaderMap};

/// Outcome of a freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The client copy is current; answer 304 with no body.
    Fresh,
    /// Serve the body.
    Stale,
}

/// Compares modification stamps when client caching is enabled.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessChecker {
    enabled: bool,
}

impl FreshnessChecker {
    /// A checker that only reports `Fresh` when `max_age` is non-zero.
    pub fn new(max_age: u64) -> Self {
        Self {
            enabled: max_age > 0,
        }
    }

    /// Exact string comparison. A client date newer than `last_modified` is
    /// still `Stale`; clients echo the value they were sent.
    pub fn check(&self, last_modified: &str, if_modified_since: Option<&str>) -> Freshness {
        match if_modified_since {
            Some(since) if self.enabled && since == last_modified => Freshness::Fresh,
            _ => Freshness::Stale,
        }
    }

    /// Same as [`check`](Self::check), reading the conditional header from a request.
    pub fn check_request(&self, last_modified: &str, request: &HeaderMap) -> Freshness {
        let since = request
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok());
        self.check(last_modified, since)
    }
}

/// Formats a modification time as an HTTP-date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}
