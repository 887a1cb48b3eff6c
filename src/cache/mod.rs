//! Shared lookup cache with Redis and in-memory backends.
//!
//! Values are JSON strings with short TTLs (minutes). Writers invalidate by
//! key or pattern; a stale read inside the TTL window is an accepted
//! tradeoff, never a correctness requirement.

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Remove every key matching a glob-style pattern (write invalidation).
    async fn delete_pattern(&self, pattern: &str) -> Result<(), CacheError>;
}

/// Typed convenience wrapper shared by services.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw, Some(ttl)).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.backend.delete(key).await
    }

    pub async fn delete_pattern(&self, pattern: &str) -> Result<(), CacheError> {
        self.backend.delete_pattern(pattern).await
    }
}

// In-memory cache implementation, used when Redis is disabled and in tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| Instant::now() > at)
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Glob match supporting a single trailing `*`, which is all the
/// invalidation paths use.
fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let store = self
            .store
            .read()
            .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
        match store.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut store = self
            .store
            .write()
            .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
        store.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut store = self
            .store
            .write()
            .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
        store.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<(), CacheError> {
        let mut store = self
            .store
            .write()
            .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
        store.retain(|key, _| !pattern_matches(pattern, key));
        Ok(())
    }
}

/// Redis-backed cache
#[derive(Clone)]
pub struct RedisCache {
    client: Arc<redis::Client>,
    namespace: String,
}

impl RedisCache {
    pub fn new(client: Arc<redis::Client>, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        let value: Option<String> = conn.get(self.namespaced(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        let key = self.namespaced(key);
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs() as usize).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.del(self.namespaced(key)).await?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<(), CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        let keys: Vec<String> = conn.keys(self.namespaced(pattern)).await?;
        if !keys.is_empty() {
            debug!(count = keys.len(), pattern, "invalidating cache keys");
            let _: () = conn.del(keys).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        total: String,
    }

    #[tokio::test]
    async fn in_memory_round_trip_and_expiry() {
        let cache = Cache::new(Arc::new(InMemoryCache::new()));
        let value = Payload {
            total: "140.00".into(),
        };

        cache
            .set_json("invoices:list:1", &value, Duration::from_secs(60))
            .await
            .unwrap();
        let got: Option<Payload> = cache.get_json("invoices:list:1").await.unwrap();
        assert_eq!(got, Some(value));

        let missing: Option<Payload> = cache.get_json("invoices:list:2").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_entries_expire_immediately() {
        let backend = InMemoryCache::new();
        backend
            .set("k", "v", Some(Duration::from_secs(0)))
            .await
            .unwrap();
        // A zero TTL is already in the past on the next read
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn pattern_invalidation_removes_prefixed_keys_only() {
        let backend = InMemoryCache::new();
        backend.set("invoices:list:1", "a", None).await.unwrap();
        backend.set("invoices:list:2", "b", None).await.unwrap();
        backend.set("settings:minInvoiceAmount", "c", None).await.unwrap();

        backend.delete_pattern("invoices:*").await.unwrap();

        assert_eq!(backend.get("invoices:list:1").await.unwrap(), None);
        assert_eq!(backend.get("invoices:list:2").await.unwrap(), None);
        assert_eq!(
            backend.get("settings:minInvoiceAmount").await.unwrap(),
            Some("c".to_string())
        );
    }
}
