//! Error types for the file server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Serve Error Enum ==
/// Outcome of a request that could not be served.
///
/// Only this type carries externally visible status codes; cache decisions
/// never surface here.
#[derive(Error, Debug)]
pub enum ServeError {
    /// Path does not resolve to a regular file
    #[error("Not found: {0}")]
    NotFound(String),

    /// Hidden file or path escaping the root
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Anything other than GET or HEAD
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Disk read or transform failed before any byte was sent
    #[error("Stream failure: {0}")]
    Stream(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServeError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::NotFound(_) => StatusCode::NOT_FOUND,
            ServeError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServeError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ServeError::Stream(_) | ServeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Keep disk error details out of the response body
        let message = match &self {
            ServeError::Stream(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Config Error Enum ==
/// Configuration rejected at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The root directory could not be resolved
    #[error("Cannot resolve root directory {path}: {source}")]
    Root {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// == Result Type Alias ==
/// Convenience Result type for the file server.
pub type Result<T> = std::result::Result<T, ServeError>;
