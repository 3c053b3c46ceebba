//! Request DTOs for the resource cache API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

/// Query of `GET /resolve/*key`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveQuery {
    /// Strategy name overriding the key's matched strategy
    #[serde(default)]
    pub strategy: Option<String>,
}

/// Query of `PUT /entries/*key`
#[derive(Debug, Clone, Deserialize)]
pub struct PutQuery {
    /// Bucket the payload is stored in
    pub strategy: String,
}

/// Query of `GET /predictions/*key`
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    5
}

/// Request body of `POST /events`
#[derive(Debug, Clone, Deserialize)]
pub struct RecordEventRequest {
    pub resource_key: String,
    pub session_id: String,
}

impl RecordEventRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.resource_key.is_empty() {
            return Some("resource_key cannot be empty".to_string());
        }
        if self.session_id.is_empty() {
            return Some("session_id cannot be empty".to_string());
        }
        None
    }
}

/// Request body of `POST /navigate`
#[derive(Debug, Clone, Deserialize)]
pub struct NavigateRequest {
    pub resource_key: String,
}
