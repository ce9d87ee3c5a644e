//! Redis-based session cache implementation.
//!
//! # Architecture
//!
//! One string key per account:
//! - **Key**: the decimal account ID (e.g. `42`)
//! - **Value**: the decimal token version (e.g. `3`)
//! - **TTL**: set on every write (default 1 hour)
//!
//! # Example
//!
//! ```no_run
//! use ticket_auth::stores::RedisSessionCache;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = RedisSessionCache::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::CacheError;
use crate::providers::SessionCache;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use ticket_core::{AccountId, TokenVersion};

/// Redis-based session cache.
///
/// Cloning is cheap; clones share the underlying `ConnectionManager`, which
/// reconnects on its own after failures.
#[derive(Clone)]
pub struct RedisSessionCache {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisSessionCache {
    /// Create a new Redis session cache.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns error if connection to Redis fails.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(|e| {
            CacheError::Unavailable(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    /// Wrap an existing connection manager (shared with the task queue).
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    /// Get the Redis key for an account.
    fn key(account_id: AccountId) -> String {
        account_id.to_string()
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn get_version(&self, account_id: AccountId) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn_manager.clone();

        conn.get(Self::key(account_id))
            .await
            .map_err(|e| CacheError::Unavailable(format!("Failed to get token version: {e}")))
    }

    async fn set_version(
        &self,
        account_id: AccountId,
        version: TokenVersion,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();

        // SETEX rejects a zero TTL.
        let ttl_seconds = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(Self::key(account_id), version.to_string(), ttl_seconds)
            .await
            .map_err(|e| CacheError::Unavailable(format!("Failed to set token version: {e}")))
    }

    async fn delete_version(&self, account_id: AccountId) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();

        conn.del::<_, ()>(Self::key(account_id))
            .await
            .map_err(|e| CacheError::Unavailable(format!("Failed to delete token version: {e}")))
    }
}
