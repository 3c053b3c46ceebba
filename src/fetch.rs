//! Fetch Module
//!
//! The network capability injected into the cache engine. The engine never
//! talks to a transport directly; it only calls [`Fetcher::fetch`].

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{CacheError, Result};

// == Fetcher Trait ==
/// Fetches the payload of a resource from the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `key`, failing with `NetworkError` (or `NetworkTimeout`).
    async fn fetch(&self, key: &str) -> Result<Bytes>;
}

// == HTTP Fetcher ==
/// Fetcher that resolves resource keys against an upstream origin.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: String,
}

impl HttpFetcher {
    /// Creates a fetcher for the given origin (e.g. `http://127.0.0.1:8080`).
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds the absolute URL for a resource key.
    pub fn url_for(&self, key: &str) -> String {
        if key.starts_with("http://") || key.starts_with("https://") {
            key.to_string()
        } else if key.starts_with('/') {
            format!("{}{}", self.origin, key)
        } else {
            format!("{}/{}", self.origin, key)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, key: &str) -> Result<Bytes> {
        let url = self.url_for(key);
        debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                CacheError::NetworkTimeout(format!("{}: {}", url, e))
            } else {
                CacheError::NetworkError(format!("{}: {}", url, e))
            }
        })?;

        if !response.status().is_success() {
            return Err(CacheError::NetworkError(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| CacheError::NetworkError(format!("{}: {}", url, e)))
    }
}
