//! Registry of explicitly revoked media tokens.
//!
//! Entries live in the [`CacheService`] with a TTL equal to the retention
//! window, so they disappear on their own once every token they could match
//! has expired naturally. With the in-memory backend the registry is local to
//! the process; with the Redis backend it is shared by every instance.

use std::time::Duration;

use crate::auth::codes::hash_token;
use crate::cache::CacheService;
use crate::error::ApiError;

const KEY_PREFIX: &str = "media:revoked:";

#[derive(Clone)]
pub struct RevocationRegistry {
    cache: CacheService,
    retention: Duration,
}

impl RevocationRegistry {
    /// `retention` must be at least the longest media token TTL in use.
    pub fn new(cache: CacheService, retention: Duration) -> Self {
        RevocationRegistry { cache, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn key(token: &str) -> String {
        format!("{}{}", KEY_PREFIX, hash_token(token))
    }

    /// Revoke `token` for the retention window. Revoking twice restarts the window.
    pub async fn revoke(&self, token: &str) -> Result<(), ApiError> {
        self.cache
            .set(&Self::key(token), "1", Some(self.retention))
            .await?;
        tracing::info!(
            retention_secs = self.retention.as_secs(),
            "media token revoked"
        );
        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool, ApiError> {
        self.cache.exists(&Self::key(token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoked_until_retention_elapses() {
        let cache = CacheService::in_memory();
        let registry = RevocationRegistry::new(cache.clone(), Duration::from_millis(30));

        assert!(!registry.is_revoked("tok").await.unwrap());
        registry.revoke("tok").await.unwrap();
        assert!(registry.is_revoked("tok").await.unwrap());
        assert!(!registry.is_revoked("other").await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!registry.is_revoked("tok").await.unwrap());
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len().await, Some(0));
    }
}
