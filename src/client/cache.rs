//! Cache de respostas indexado por URL absoluta e um único método HTTP.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode, Url};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

/// A stored response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub url: Url,
    pub method: Method,
    pub status: StatusCode,
    pub etag: String,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(url: Url, method: Method, body: Vec<u8>) -> Self {
        let etag = format!("\"{:x}\"", Sha256::digest(&body));
        Self {
            url,
            method,
            status: StatusCode::OK,
            etag,
            body,
            stored_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<(Url, Method), CachedResponse>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `body` for exactly `(url, method)`, replacing any previous entry.
    pub async fn store(&self, url: Url, method: Method, body: Vec<u8>) -> CachedResponse {
        let response = CachedResponse::new(url.clone(), method.clone(), body);
        debug!(%url, %method, bytes = response.body.len(), "Caching response");
        self.entries
            .write()
            .await
            .insert((url, method), response.clone());
        response
    }

    pub async fn lookup(&self, url: &Url, method: &Method) -> Option<CachedResponse> {
        self.entries
            .read()
            .await
            .get(&(url.clone(), method.clone()))
            .cloned()
    }

    pub async fn remove(&self, url: &Url, method: &Method) -> Option<CachedResponse> {
        self.entries.write().await.remove(&(url.clone(), method.clone()))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://localhost:4567/things/1").unwrap()
    }

    #[tokio::test]
    async fn test_lookup_is_method_specific() {
        let cache = ResponseCache::new();
        cache.store(url(), Method::GET, b"{}".to_vec()).await;

        assert!(cache.lookup(&url(), &Method::GET).await.is_some());
        assert!(cache.lookup(&url(), &Method::POST).await.is_none());
    }

    #[tokio::test]
    async fn test_store_replaces_entry() {
        let cache = ResponseCache::new();
        let first = cache.store(url(), Method::GET, b"one".to_vec()).await;
        let second = cache.store(url(), Method::GET, b"two".to_vec()).await;

        assert_ne!(first.etag, second.etag);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.lookup(&url(), &Method::GET).await.unwrap().body, b"two");
    }

    #[test]
    fn test_etag_is_quoted_sha256() {
        let response = CachedResponse::new(url(), Method::GET, Vec::new());
        assert_eq!(
            response.etag,
            "\"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\""
        );
    }
}
