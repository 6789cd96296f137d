//! API Routes
//!
//! Configures the Axum router: two operational endpoints, everything else
//! falls through to the file server.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, serve_handler, stats_handler, AppState};

/// Creates the main router.
///
/// # Endpoints
/// - `GET /_cache/stats` - Cache statistics
/// - `GET /_cache/health` - Health check endpoint
/// - anything else - File serving (GET and HEAD)
///
/// # Middleware
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/_cache/stats", get(stats_handler))
        .route("/_cache/health", get(health_handler))
        .fallback(serve_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
