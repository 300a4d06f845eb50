//! TTL cache backed by a sharded concurrent map

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::config::CacheConfig;
use crate::pattern::glob_match;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Concurrent TTL cache
///
/// Readers never block each other. `get_or_compute` does not single-flight:
/// two tasks missing the same key at once may both compute, and the last
/// write wins. Callers only cache pure lookups, so the result is the same.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_default_ttl(config.default_ttl())
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fetch a live entry; expired entries are dropped on the way out
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        }

        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Insert with the default TTL
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Insert with the default TTL unless a live entry holds the key.
    ///
    /// Atomic per key; returns whether the value went in.
    pub fn insert_if_absent(&self, key: impl Into<String>, value: V) -> bool {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: now + self.default_ttl,
        };

        match self.entries.entry(key.into()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return false;
                }
                occupied.insert(entry);
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                true
            }
        }
    }

    /// Return the cached value, or run `compute` and cache its success.
    ///
    /// Errors are returned to the caller and never cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F, ttl: Duration) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = compute().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Drop every key matching `pattern` (`*` wildcard); returns how many went
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let matched = glob_match(pattern, key);
            if matched {
                removed += 1;
            }
            !matched
        });

        debug!(pattern, removed, "Cache invalidated");
        removed
    }

    /// Remove expired entries; returns how many went
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl<V: Clone + Send + Sync> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_set_and_get() {
        let cache = TtlCache::default();
        cache.insert("kyc:W1", "verified".to_string());

        assert_eq!(cache.get("kyc:W1"), Some("verified".to_string()));
        assert_eq!(cache.get("kyc:W2"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = TtlCache::default();
        cache.set("aml:W1", 42u8, Duration::from_millis(20));

        assert_eq!(cache.get("aml:W1"), Some(42));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("aml:W1"), None);
        // Expired entry is evicted on read
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_get_or_compute_hit_skips_compute() {
        let cache = TtlCache::default();
        cache.insert("kyc:W1", 7u32);
        let calls = AtomicUsize::new(0);

        let value: Result<u32, String> = cache
            .get_or_compute(
                "kyc:W1",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(99)
                },
                Duration::from_secs(60),
            )
            .await;

        assert_eq!(value, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_or_compute_miss_computes_once() {
        let cache = TtlCache::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, String> = cache
                .get_or_compute(
                    "kyc:W1",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(99)
                    },
                    Duration::from_secs(60),
                )
                .await;
            assert_eq!(value, Ok(99));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_recomputes_after_ttl() {
        let cache = TtlCache::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: Result<u32, String> = cache
                .get_or_compute(
                    "kyc:W1",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(1)
                    },
                    Duration::from_millis(10),
                )
                .await;
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_compute_error_not_cached() {
        let cache: TtlCache<u32> = TtlCache::default();

        let first: Result<u32, String> = cache
            .get_or_compute("kyc:W1", || async { Err("provider down".to_string()) }, Duration::from_secs(60))
            .await;
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second: Result<u32, String> = cache
            .get_or_compute("kyc:W1", || async { Ok(5) }, Duration::from_secs(60))
            .await;
        assert_eq!(second, Ok(5));
    }

    #[test]
    fn test_invalidate_entity_pattern() {
        let cache = TtlCache::default();
        cache.insert("kyc:W1", 1u8);
        cache.insert("aml:W1", 2u8);
        cache.insert("kyc:W2", 3u8);

        assert_eq!(cache.invalidate("*:W1"), 2);
        assert_eq!(cache.get("kyc:W1"), None);
        assert_eq!(cache.get("aml:W1"), None);
        assert_eq!(cache.get("kyc:W2"), Some(3));
    }

    #[test]
    fn test_insert_if_absent() {
        let cache = TtlCache::with_default_ttl(Duration::from_millis(20));

        assert!(cache.insert_if_absent("tx:0x1", ()));
        assert!(!cache.insert_if_absent("tx:0x1", ()));

        std::thread::sleep(Duration::from_millis(40));
        // An expired holder no longer blocks the key
        assert!(cache.insert_if_absent("tx:0x1", ()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let cache = TtlCache::default();
        cache.set("a", 1u8, Duration::from_millis(5));
        cache.set("b", 2u8, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
