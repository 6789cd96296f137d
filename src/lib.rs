//! Static Cache - A static file server with an in-memory response cache
//!
//! Serves files with conditional GET, streams them through optional minify and
//! gzip stages, and keeps the finished bodies in a bounded, TTL-evicting cache
//! that is invalidated when the files change on disk.

pub mod api;
pub mod cache;
pub mod config;
pub mod delivery;
pub mod error;
pub mod files;
pub mod freshness;
pub mod models;
pub mod pipeline;
pub mod serve;
pub mod tasks;

pub use api::AppState;
pub use cache::ByteCache;
pub use config::{CacheConfig, Config};
pub use freshness::{Freshness, FreshnessChecker};
pub use serve::FileServer;
pub use tasks::{spawn_invalidator, spawn_sweep_task, FileWatchInvalidator};
