//! Error types for the resource cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the resource cache.
///
/// Cloneable so a single-flight fetch outcome can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Invalid request data (empty key, bad parameters)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No strategy matches the resource key, or an override names an unknown strategy
    #[error("No strategy matches: {0}")]
    StrategyNotFound(String),

    /// Resource is neither cached nor reachable over the network
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Network fetch exceeded its timeout
    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    /// Network fetch failed
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Durable backend read or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Strategy table or configuration is malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for failures of the fetch capability (timeout or error).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            CacheError::NetworkTimeout(_) | CacheError::NetworkError(_)
        )
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Persistence(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::StrategyNotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            CacheError::ResourceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            CacheError::NetworkTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
            CacheError::NetworkError(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            CacheError::InvalidConfig(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::Persistence(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            CacheError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the resource cache.
pub type Result<T> = std::result::Result<T, CacheError>;
