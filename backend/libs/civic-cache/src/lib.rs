//! Civic cache layer
//!
//! Narrow key-value interface used by the report read path:
//! - `get` / `set` with per-key TTL / `del`
//! - Pipelined multi-key delete for invalidation fan-out
//! - JSON helpers that treat corrupted entries as misses
//! - Metrics integration
//!
//! The cache is never the source of truth. Callers are expected to treat every
//! `CacheError` as a miss or a no-op.

mod error;
mod keys;
mod metrics;

pub use error::{CacheError, CacheResult};
pub use keys::{CacheKey, ALL, ANONYMOUS, LISTING_NAMESPACE};
pub use metrics::CacheMetrics;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Pipeline};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

/// Default TTL values (seconds)
pub mod ttl {
    pub const REPORT_LISTING: u64 = 300; // 5 minutes
    pub const ADMIN_DASHBOARD: u64 = 300; // 5 minutes
}

/// String-to-string store with per-key expiry
#[async_trait::async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Get a raw value
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a raw value with TTL
    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> CacheResult<()>;

    /// Delete a key
    async fn del(&self, key: &str) -> CacheResult<()>;

    /// Delete many keys. Backends without pipelining fall back to one call per key.
    async fn del_many(&self, keys: &[String]) -> CacheResult<()> {
        for key in keys {
            self.del(key).await?;
        }
        Ok(())
    }
}

/// Read and decode a JSON value.
///
/// An entry that fails to decode is deleted and reported as a miss.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn KeyValueCache,
    key: &str,
) -> CacheResult<Option<T>> {
    let Some(data) = cache.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&data) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key = %key, error = %e, "Cache deserialization failed");
            if let Err(del_err) = cache.del(key).await {
                warn!(key = %key, error = %del_err, "Failed to delete corrupted cache entry");
            }
            Ok(None)
        }
    }
}

/// Encode a value as JSON and store it with TTL
pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn KeyValueCache,
    key: &str,
    value: &T,
    ttl_secs: u64,
) -> CacheResult<()> {
    let data = serde_json::to_string(value)?;
    cache.set(key, data, ttl_secs).await
}

/// Redis-backed cache client
#[derive(Clone)]
pub struct RedisCache {
    redis: ConnectionManager,
    metrics: CacheMetrics,
}

impl RedisCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            metrics: CacheMetrics::new(),
        }
    }

    /// Open a managed connection to `redis_url`
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(manager))
    }

    /// Round-trip check against the server
    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.redis.clone();

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => {
                debug!(key = %key, "Cache hit");
                self.metrics.record_hit(key);
                Ok(Some(data))
            }
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                self.metrics.record_miss(key);
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Redis get error");
                self.metrics.record_error(key, "get");
                Err(CacheError::Redis(e))
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| {
                self.metrics.record_error(key, "set");
                CacheError::Redis(e)
            })?;

        debug!(key = %key, ttl = ttl_secs, "Cache set");
        self.metrics.record_write(key);
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(key).await.map_err(|e| {
            self.metrics.record_error(key, "del");
            CacheError::Redis(e)
        })?;

        debug!(key = %key, "Cache delete");
        self.metrics.record_invalidation(key);
        Ok(())
    }

    async fn del_many(&self, keys: &[String]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        let mut pipe = Pipeline::new();
        for key in keys {
            pipe.del(key);
        }

        pipe.query_async::<_, ()>(&mut conn).await.map_err(|e| {
            self.metrics.record_error(&keys[0], "del");
            CacheError::Redis(e)
        })?;

        for key in keys {
            self.metrics.record_invalidation(key);
        }
        debug!(count = keys.len(), "Cache pipeline delete");
        Ok(())
    }
}
