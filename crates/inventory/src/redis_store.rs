//! Redis-backed [`CacheStore`].
//!
//! Every service instance points at the same Redis, so an invalidation
//! issued after a decrement on one instance is seen by all of them.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::cache::CacheStore;
use crate::error::CacheError;

/// Shared cache store over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
}

impl RedisCacheStore {
    /// Opens a connection manager for `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(unavailable)?;
        tracing::info!("connected to redis cache");
        Ok(Self { connection })
    }
}

fn unavailable(err: redis::RedisError) -> CacheError {
    CacheError::Unavailable(err.to_string())
}

/// Redis expiry is whole seconds; sub-second TTLs round up to one.
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(unavailable)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, value.as_ref(), expiry_secs(ttl))
            .await
            .map_err(unavailable)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(keys).await.map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_rounds_sub_second_ttl_up() {
        assert_eq!(expiry_secs(Duration::from_millis(10)), 1);
        assert_eq!(expiry_secs(Duration::ZERO), 1);
        assert_eq!(expiry_secs(Duration::from_secs(300)), 300);
    }

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let err = RedisCacheStore::connect("not a url").await.err().unwrap();
        assert!(matches!(err, CacheError::Unavailable(_)));
    }
}
