use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::ApiError;

/// Key/value backend with per-key expiry.
///
/// The in-memory backend is process-local; Redis shares state between
/// server instances and expires keys natively.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a raw value from the cache.
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError>;

    /// Set a raw value in the cache with optional TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), ApiError>;

    /// Delete a key from the cache.
    async fn del(&self, key: &str) -> Result<bool, ApiError>;

    /// Check if a live (non-expired) key exists.
    async fn exists(&self, key: &str) -> Result<bool, ApiError>;

    /// Drop every expired entry. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, ApiError> {
        Ok(0)
    }

    /// Number of stored entries, expired or not, when the backend can tell.
    async fn len(&self) -> Option<usize> {
        None
    }
}

/// The cache service shared through `AppState`.
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
}

impl CacheService {
    /// Create a new cache service with the given backend.
    pub fn new(backend: impl CacheBackend + 'static) -> Self {
        CacheService {
            backend: Arc::new(backend),
        }
    }

    /// Create an in-memory cache (single instance deployments and tests).
    pub fn in_memory() -> Self {
        CacheService::new(InMemoryCache::new())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        self.backend.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), ApiError> {
        self.backend.set(key, value, ttl).await
    }

    pub async fn del(&self, key: &str) -> Result<bool, ApiError> {
        self.backend.del(key).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        self.backend.exists(key).await
    }

    pub async fn purge_expired(&self) -> Result<usize, ApiError> {
        self.backend.purge_expired().await
    }

    pub async fn len(&self) -> Option<usize> {
        self.backend.len().await
    }

    /// Spawn a task that purges expired entries every `interval`.
    ///
    /// The task ends when the returned handle is aborted or the runtime stops.
    pub fn spawn_purger(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match cache.purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(removed = n, "purged expired cache entries"),
                    Err(e) => tracing::warn!("cache purge failed: {}", e),
                }
            }
        })
    }
}

// ── In-Memory Cache Backend ──

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |exp| now < exp)
    }
}

/// HashMap-backed cache with lazy expiry on read plus explicit purging.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let store = self.store.read().await;
        match store.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(Some(entry.value.clone())),
            Some(_) => {
                drop(store);
                self.store.write().await.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), ApiError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.store.write().await.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, ApiError> {
        Ok(self.store.write().await.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        let store = self.store.read().await;
        Ok(store
            .get(key)
            .is_some_and(|entry| entry.is_live(Instant::now())))
    }

    async fn purge_expired(&self) -> Result<usize, ApiError> {
        let now = Instant::now();
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|_, entry| entry.is_live(now));
        Ok(before - store.len())
    }

    async fn len(&self) -> Option<usize> {
        Some(self.store.read().await.len())
    }
}

// ── Redis Cache Backend ──

/// Redis-backed cache; keys expire natively via `SET ... EX`.
#[cfg(feature = "redis")]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

#[cfg(feature = "redis")]
impl RedisCache {
    /// Create a new Redis cache from a connection URL.
    pub async fn new(url: &str) -> Result<Self, ApiError> {
        let client = redis::Client::open(url)
            .map_err(|e| ApiError::Internal(format!("Redis connection error: {}", e)))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| ApiError::Internal(format!("Redis connection error: {}", e)))?;
        Ok(RedisCache { conn })
    }
}

#[cfg(feature = "redis")]
#[async_trait::async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| ApiError::Internal(format!("Redis GET error: {}", e)))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), ApiError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|e| ApiError::Internal(format!("Redis SETEX error: {}", e))),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| ApiError::Internal(format!("Redis SET error: {}", e))),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, ApiError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let count: i64 = conn
            .del(key)
            .await
            .map_err(|e| ApiError::Internal(format!("Redis DEL error: {}", e)))?;
        Ok(count > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.exists(key)
            .await
            .map_err(|e| ApiError::Internal(format!("Redis EXISTS error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_entries_are_invisible_and_purged() {
        let cache = CacheService::in_memory();
        cache
            .set("short", "1", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        cache.set("forever", "1", None).await.unwrap();
        assert!(cache.exists("short").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!cache.exists("short").await.unwrap());
        assert_eq!(cache.len().await, Some(2));
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len().await, Some(1));
        assert!(cache.exists("forever").await.unwrap());
    }

    #[tokio::test]
    async fn get_set_del() {
        let cache = CacheService::in_memory();
        assert!(cache.get("k").await.unwrap().is_none());
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.del("k").await.unwrap());
        assert!(!cache.del("k").await.unwrap());
    }
}
