//! Cache-aside access to users and posts.
//!
//! The cache is never authoritative. Reads try the cache and fall through to the
//! durable store on any kind of miss, writes invalidate after the store commits,
//! and no cache failure is ever allowed to fail a request.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::core::error::{CacheError, Error};

pub(crate) const USER_TTL: Duration = Duration::from_secs(60 * 60);
pub(crate) const POST_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum CacheKey {
    User(i64),
    Post(i64),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::User(id) => write!(f, "user:{}", id),
            CacheKey::Post(id) => write!(f, "post:{}", id),
        }
    }
}

/// A key/value backend. Every call may fail independently of the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait Cache: Send + Sync {
    /// `Ok(None)` on a plain miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Succeeds when the key is already absent.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Drops expired entries, returning how many were removed. Backends that
    /// expire entries on their own have nothing to do here.
    async fn purge_expired(&self) -> Result<u64, CacheError> {
        Ok(0)
    }
}

/// In-process backend with per-entry expiry.
#[derive(Default)]
pub(crate) struct MemoryCache {
    entries: RwLock<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expiry)) if now < *expiry => return Ok(Some(value.clone())),
                Some(_) => {}
            }
        }

        // expired; only remove it if nobody replaced it in the meantime
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|(_, expiry)| now >= *expiry) {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let expiry = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_owned(), (value, expiry));

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();

        entries.retain(|_, (_, expiry)| now < *expiry);

        Ok((before - entries.len()) as u64)
    }
}

/// Read-through, write-invalidate access to an optional cache backend.
#[derive(Clone)]
pub(crate) struct CacheAside {
    backend: Option<Arc<dyn Cache>>,
    timeout: Duration,
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("enabled", &self.backend.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CacheAside {
    pub(crate) fn new(backend: Arc<dyn Cache>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    pub(crate) fn disabled() -> Self {
        Self {
            backend: None,
            timeout: Duration::ZERO,
        }
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| CacheError::Timeout)?
    }

    /// Any failure, including an undecodable value, is reported as a miss.
    pub(crate) async fn get<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let backend = self.backend.as_ref()?;
        let key = key.to_string();

        let bytes = match self.bounded(backend.get(&key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%key, "Cache read failed: {}", e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%key, "Discarding undecodable cache entry: {}", e);
                None
            }
        }
    }

    pub(crate) async fn put<T: Serialize>(&self, key: CacheKey, value: &T, ttl: Duration) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let key = key.to_string();

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%key, "Failed to encode cache entry: {}", e);
                return;
            }
        };

        if let Err(e) = self.bounded(backend.set(&key, bytes, ttl)).await {
            tracing::warn!(%key, "Cache write failed: {}", e);
        }
    }

    /// Must only be called once the durable write has committed.
    pub(crate) async fn invalidate(&self, key: CacheKey) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let key = key.to_string();

        if let Err(e) = self.bounded(backend.delete(&key)).await {
            tracing::warn!(%key, "Cache invalidation failed: {}", e);
        }
    }

    /// Serve from the cache, or load from the store and populate the cache.
    /// Absent records are not cached.
    pub(crate) async fn read_through<T, F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        load: F,
    ) -> Result<Option<T>, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, Error>>,
    {
        if let Some(value) = self.get(key).await {
            tracing::trace!(%key, "Cache hit");
            return Ok(Some(value));
        }

        let value = load().await?;

        if let Some(value) = &value {
            self.put(key, value, ttl).await;
        }

        Ok(value)
    }

    pub(crate) async fn purge_expired(&self) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        match self.bounded(backend.purge_expired()).await {
            Ok(removed) => tracing::debug!(removed, "Purged expired cache entries"),
            Err(e) => tracing::warn!("Cache purge failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory() -> CacheAside {
        CacheAside::new(Arc::new(MemoryCache::new()), Duration::from_secs(1))
    }

    #[test]
    fn test_keys() {
        assert_eq!(CacheKey::User(42).to_string(), "user:42");
        assert_eq!(CacheKey::Post(7).to_string(), "post:7");
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        cache
            .set("user:1", b"one".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(cache.get("user:1").await.unwrap(), Some(b"one".to_vec()));

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(cache.get("user:1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_purge_expired() {
        let cache = MemoryCache::new();
        cache
            .set("short", b"a".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        cache
            .set("long", b"b".to_vec(), Duration::from_secs(100))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert!(cache.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_read_through_populates_then_hits() {
        let cache = memory();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .read_through(CacheKey::Post(1), POST_TTL, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("fresh".to_string()))
                })
                .await
                .unwrap();

            assert_eq!(value.as_deref(), Some("fresh"));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_absent_records_are_not_cached() {
        let cache = memory();

        let value: Option<String> = cache
            .read_through(CacheKey::User(9), USER_TTL, || async { Ok(None) })
            .await
            .unwrap();

        assert!(value.is_none());
        assert!(cache.get::<String>(CacheKey::User(9)).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_serves_fresh_value() {
        let cache = memory();
        cache.put(CacheKey::Post(1), &"stale", POST_TTL).await;

        // durable write happens here, then the key is invalidated
        cache.invalidate(CacheKey::Post(1)).await;

        let value = cache
            .read_through(CacheKey::Post(1), POST_TTL, || async {
                Ok(Some("fresh".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(value.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_backend_failure_falls_through_to_store() {
        let mut backend = MockCache::new();
        backend
            .expect_get()
            .returning(|_| Err(CacheError::Unavailable("connection refused".into())));
        backend
            .expect_set()
            .times(1)
            .returning(|_, _, _| Err(CacheError::Unavailable("connection refused".into())));

        let cache = CacheAside::new(Arc::new(backend), Duration::from_secs(1));

        let value = cache
            .read_through(CacheKey::User(42), USER_TTL, || async {
                Ok(Some("from store".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(value.as_deref(), Some("from store"));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let mut backend = MockCache::new();
        backend
            .expect_get()
            .returning(|_| Ok(Some(b"not json".to_vec())));
        backend.expect_set().returning(|_, _, _| Ok(()));

        let cache = CacheAside::new(Arc::new(backend), Duration::from_secs(1));

        let value = cache
            .read_through(CacheKey::Post(3), POST_TTL, || async { Ok(Some(3_i64)) })
            .await
            .unwrap();

        assert_eq!(value, Some(3));
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let cache = memory();

        let result: Result<Option<String>, Error> = cache
            .read_through(CacheKey::User(1), USER_TTL, || async {
                Err(Error::DependencyUnavailable("database"))
            })
            .await;

        assert!(matches!(result, Err(Error::DependencyUnavailable(_))));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_loads() {
        let cache = CacheAside::disabled();
        let loads = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .read_through(CacheKey::User(1), USER_TTL, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(1_i64))
                })
                .await
                .unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
