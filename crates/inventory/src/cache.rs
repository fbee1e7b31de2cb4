//! Best-effort read-through cache for product snapshots.
//!
//! The cache is never authoritative. Every failure here is logged and
//! treated as a miss, so reads keep working with the cache entirely down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::CacheError;
use crate::{Product, ProductId};

/// Default lifetime of a cached product snapshot.
pub const DEFAULT_PRODUCT_TTL: Duration = Duration::from_secs(5 * 60);

/// Pluggable key/value cache backend.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored value if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Stores a value that expires after `ttl`.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Removes every listed key. Missing keys are not an error.
    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;
}

/// In-memory cache store backed by `DashMap`.
///
/// Each entry stores `(value, inserted_at, ttl)` and is lazily evicted on access.
#[derive(Clone, Default)]
pub struct InMemoryCacheStore {
    inner: Arc<DashMap<String, (Bytes, Instant, Duration)>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// True if a live entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .get(key)
            .is_some_and(|entry| entry.value().1.elapsed() < entry.value().2)
    }

    /// Writes raw bytes under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: &str, value: Bytes, ttl: Duration) {
        self.inner
            .insert(key.to_string(), (value, Instant::now(), ttl));
    }

    /// Remove all expired entries.
    pub fn evict_expired(&self) {
        self.inner
            .retain(|_, (_, inserted, ttl)| inserted.elapsed() < *ttl);
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable(
                "in-memory cache disabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.check_available()?;
        if let Some(entry) = self.inner.get(key) {
            let (val, inserted, ttl) = entry.value();
            if inserted.elapsed() < *ttl {
                return Ok(Some(val.clone()));
            }
            // Expired: drop the read guard before removing
            drop(entry);
            self.inner.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.check_available()?;
        self.insert_raw(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        self.check_available()?;
        for key in keys {
            self.inner.remove(key);
        }
        Ok(())
    }
}

/// Product snapshots over a [`CacheStore`], keyed `product:<id>`.
#[derive(Clone)]
pub struct ProductCache<C> {
    store: C,
    ttl: Duration,
}

impl<C: CacheStore> ProductCache<C> {
    pub fn new(store: C) -> Self {
        Self::with_ttl(store, DEFAULT_PRODUCT_TTL)
    }

    pub fn with_ttl(store: C, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached snapshot, or `None` on a miss.
    ///
    /// Backend errors and undecodable entries count as misses.
    pub async fn get(&self, id: &ProductId) -> Option<Product> {
        let key = id.cache_key();
        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache read failed, falling back to storage");
                return None;
            }
        };

        match serde_json::from_slice::<Product>(&bytes) {
            Ok(product) => Some(product),
            Err(e) => {
                tracing::warn!(%key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Stores a snapshot. Failures are logged, never returned.
    pub async fn put(&self, product: &Product) {
        let key = product.id.cache_key();
        let result = match serde_json::to_vec(product) {
            Ok(json) => self.store.set(&key, Bytes::from(json), self.ttl).await,
            Err(e) => Err(CacheError::from(e)),
        };
        if let Err(e) = result {
            tracing::warn!(%key, error = %e, "failed to cache product");
        }
    }

    /// Deletes the snapshots of the given products. Failures are logged.
    pub async fn invalidate(&self, ids: &[ProductId]) {
        if ids.is_empty() {
            return;
        }
        let keys: Vec<String> = ids.iter().map(ProductId::cache_key).collect();
        if let Err(e) = self.store.delete(&keys).await {
            tracing::error!(?keys, error = %e, "failed to invalidate cached products");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> Product {
        Product {
            id: ProductId::new("p1"),
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            price: 9.99,
            stock_quantity: 100,
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_snapshot() {
        let cache = ProductCache::new(InMemoryCacheStore::new());
        cache.put(&widget()).await;

        assert!(cache.store().contains("product:p1"));
        assert_eq!(cache.get(&ProductId::new("p1")).await, Some(widget()));
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = ProductCache::new(InMemoryCacheStore::new());
        cache.put(&widget()).await;

        cache.invalidate(&[ProductId::new("p1")]).await;

        assert!(!cache.store().contains("product:p1"));
        assert_eq!(cache.get(&ProductId::new("p1")).await, None);
    }

    #[tokio::test]
    async fn corrupted_entry_is_a_miss() {
        let store = InMemoryCacheStore::new();
        store.insert_raw("product:p1", Bytes::from_static(b"{not json"), DEFAULT_PRODUCT_TTL);
        let cache = ProductCache::new(store);

        assert_eq!(cache.get(&ProductId::new("p1")).await, None);
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = ProductCache::with_ttl(InMemoryCacheStore::new(), Duration::from_millis(20));
        cache.put(&widget()).await;

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get(&ProductId::new("p1")).await, None);
        assert!(cache.store().is_empty());
    }

    #[tokio::test]
    async fn unavailable_backend_degrades_to_miss() {
        let store = InMemoryCacheStore::new();
        let cache = ProductCache::new(store.clone());
        cache.put(&widget()).await;

        store.set_unavailable(true);
        assert_eq!(cache.get(&ProductId::new("p1")).await, None);
        cache.put(&widget()).await;
        cache.invalidate(&[ProductId::new("p1")]).await;

        store.set_unavailable(false);
        assert_eq!(cache.get(&ProductId::new("p1")).await, Some(widget()));
    }

    #[tokio::test]
    async fn evict_expired_drops_stale_entries() {
        let store = InMemoryCacheStore::new();
        store.insert_raw("a", Bytes::from_static(b"1"), Duration::from_millis(1));
        store.insert_raw("b", Bytes::from_static(b"2"), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(10)).await;
        store.evict_expired();

        assert_eq!(store.len(), 1);
        assert!(store.contains("b"));
    }
}
