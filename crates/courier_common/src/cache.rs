// --- File: crates/courier_common/src/cache.rs ---
//! In-process TTL cache for wrapping expensive asynchronous lookups.
//!
//! A generic replacement for method-level caching decorators: construct one
//! cache per concern with a namespace and TTL, then wrap any async operation
//! with [`TtlCache::get_or_load`]. Hit/miss counters are tracked for
//! observability.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

/// Cache hit/miss statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A namespaced in-process cache with a fixed TTL per entry.
pub struct TtlCache<V> {
    namespace: String,
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, V)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            ttl,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch a cached value, or run `load` and cache its result.
    ///
    /// Errors from `load` are never cached.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = load().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn insert(&self, key: &str, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (Instant::now(), value));
        debug!(namespace = %self.namespace, key, "cache entry stored");
    }

    /// Drop a single entry, e.g. after the underlying data changed.
    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }

    /// Drop every entry in the namespace.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_loaded_values() {
        let cache: TtlCache<String> = TtlCache::new("templates", Duration::from_secs(60));
        let mut loads = 0u32;

        for _ in 0..3 {
            let value = cache
                .get_or_load("welcome:en", || {
                    loads += 1;
                    async { Ok::<_, ()>("rendered".to_string()) }
                })
                .await
                .unwrap();
            assert_eq!(value, "rendered");
        }

        assert_eq!(loads, 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_reloaded() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_millis(5));
        cache.insert("k", 1).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        cache.insert("k", 7).await;
        cache.invalidate("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn load_errors_are_not_cached() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        let result: Result<u32, &str> = cache.get_or_load("k", || async { Err("boom") }).await;
        assert!(result.is_err());

        let value = cache
            .get_or_load("k", || async { Ok::<_, &str>(9) })
            .await
            .unwrap();
        assert_eq!(value, 9);
    }
}
