//! Response DTOs for the resource cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::behavior::Prediction;
use crate::cache::CacheStats;
use crate::prefetch::{PrefetchStats, ScheduledPrefetch};

/// Generic acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response body of `DELETE /entries/*key`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub key: String,
    /// False when nothing was cached under the key
    pub removed: bool,
}

/// Response body of `DELETE /entries`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

/// Response body of `POST /navigate`
#[derive(Debug, Clone, Serialize)]
pub struct NavigateResponse {
    pub resource_key: String,
    pub scheduled: Vec<ScheduledPrefetch>,
}

/// Response body of `GET /predictions/*key`
#[derive(Debug, Clone, Serialize)]
pub struct PredictionsResponse {
    pub resource_key: String,
    pub predictions: Vec<Prediction>,
}

/// Response body of `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub cache: CacheStats,
    /// Overall hits / (hits + misses)
    pub hit_rate: f64,
    pub prefetch: PrefetchStats,
}

impl StatsResponse {
    pub fn new(cache: CacheStats, prefetch: PrefetchStats) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            prefetch,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "degraded" once persistence is memory-only
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(degraded: bool) -> Self {
        Self {
            status: if degraded { "degraded" } else { "healthy" }.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialize() {
        let json = serde_json::to_string(&HealthResponse::new(false)).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));

        let json = serde_json::to_string(&HealthResponse::new(true)).unwrap();
        assert!(json.contains("degraded"));
    }

    #[test]
    fn test_invalidate_response_serialize() {
        let resp = InvalidateResponse {
            key: "/a".to_string(),
            removed: true,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"key":"/a","removed":true}"#);
    }
}
