//! Response models for the file server
//!
//! JSON bodies for the operational endpoints and for error responses.

pub mod responses;

// Re-export commonly used types
pub use responses::{ErrorResponse, HealthResponse, StatsResponse};
