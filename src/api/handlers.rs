//! API Handlers
//!
//! HTTP request handlers for file serving and the operational endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::Response,
    Json,
};

use crate::cache::ByteCache;
use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::models::{HealthResponse, StatsResponse};
use crate::serve::FileServer;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// File server, including its cache and watcher
    pub server: Arc<FileServer>,
    /// Same cache the server fills, for stats
    pub cache: ByteCache,
}

impl AppState {
    /// Creates a new AppState around a built server.
    pub fn new(server: FileServer) -> Self {
        let cache = server.cache().clone();
        Self {
            server: Arc::new(server),
            cache,
        }
    }

    /// Creates a new AppState from configuration, without file watching.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        let cache = ByteCache::new(config.cache.clone());
        Ok(Self::new(FileServer::new(config, cache)?))
    }
}

/// Fallback handler: every path not claimed by another route is a file.
pub async fn serve_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response> {
    state.server.serve(&method, uri.path(), &headers).await
}

/// Handler for GET /_cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats().await))
}

/// Handler for GET /_cache/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
