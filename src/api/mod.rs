//! API Module
//!
//! HTTP handlers and routing for the file server.
//!
//! # Endpoints
//! - `GET /_cache/stats` - Get cache statistics
//! - `GET /_cache/health` - Health check endpoint
//! - fallback - Serve files under the mount path

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
