//! Size-, count-, and age-bounded LRU cache.
//!
//! Each entry's size is the length of its JSON serialization. Recency is
//! access recency: a `get` hit promotes the entry. Expired entries are
//! dropped lazily, on the `get` that finds them stale.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use lru::LruCache;
use serde::Serialize;
use tracing::{debug, trace, warn};

use keywordscout_shared::{CacheConfig, KeywordScoutError, Result};

/// Cache of resolved search volumes keyed by page URL.
pub type VolumeCache = BoundedCache<u64>;

struct CacheEntry<V> {
    value: V,
    size_bytes: usize,
    inserted_at: Instant,
}

struct CacheState<V> {
    entries: LruCache<String, CacheEntry<V>>,
    total_bytes: usize,
}

/// Thread-safe LRU cache bounded by entry count, total bytes, and TTL.
pub struct BoundedCache<V> {
    config: CacheConfig,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone + Serialize> BoundedCache<V> {
    pub fn new(config: CacheConfig) -> Result<Self> {
        if config.max_entries == 0 || config.max_bytes == 0 {
            return Err(KeywordScoutError::config(
                "cache max_entries and max_bytes must be at least 1",
            ));
        }
        if config.ttl.is_zero() {
            return Err(KeywordScoutError::config("cache ttl must be positive"));
        }

        Ok(Self {
            config,
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                total_bytes: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a live entry, promoting it to most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.lock();

        match state.entries.get(key) {
            None => return None,
            Some(entry) if entry.inserted_at.elapsed() < self.config.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => {}
        }

        if let Some(stale) = state.entries.pop(key) {
            state.total_bytes -= stale.size_bytes;
            trace!(key, "evicted expired cache entry");
        }
        None
    }

    /// Insert or replace an entry, evicting least recently used entries until
    /// both the count and byte bounds hold.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let size_bytes = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes.len(),
            Err(e) => {
                warn!(key = %key, error = %e, "cache value not serializable, skipping");
                return;
            }
        };
        if size_bytes > self.config.max_bytes {
            debug!(key = %key, size_bytes, "cache value larger than cache, skipping");
            return;
        }

        let mut state = self.lock();
        if let Some(previous) = state.entries.pop(&key) {
            state.total_bytes -= previous.size_bytes;
        }

        while state.entries.len() >= self.config.max_entries
            || state.total_bytes + size_bytes > self.config.max_bytes
        {
            match state.entries.pop_lru() {
                Some((evicted, entry)) => {
                    state.total_bytes -= entry.size_bytes;
                    trace!(key = %evicted, "evicted least recently used cache entry");
                }
                None => break,
            }
        }

        state.total_bytes += size_bytes;
        state.entries.put(
            key,
            CacheEntry {
                value,
                size_bytes,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Entries currently held, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the serialized sizes of all held entries.
    pub fn total_bytes(&self) -> usize {
        self.lock().total_bytes
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.total_bytes = 0;
    }
}

impl<V> fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("BoundedCache")
            .field("config", &self.config)
            .field("len", &state.entries.len())
            .field("total_bytes", &state.total_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn cache(max_entries: usize, max_bytes: usize, ttl: Duration) -> VolumeCache {
        VolumeCache::new(CacheConfig {
            max_entries,
            max_bytes,
            ttl,
        })
        .expect("valid cache")
    }

    #[test]
    fn get_returns_inserted_value() {
        let cache = cache(50, 1024, Duration::from_secs(60));
        assert_eq!(cache.get("https://example.com/a"), None);
        cache.set("https://example.com/a", 1200);
        assert_eq!(cache.get("https://example.com/a"), Some(1200));
        assert_eq!(cache.total_bytes(), 4);
    }

    #[test]
    fn count_bound_evicts_least_recently_accessed() {
        let cache = cache(50, 5 * 1024 * 1024, Duration::from_secs(60));
        for i in 0..50 {
            cache.set(format!("k{i}"), i);
        }
        // k0 is the oldest insert but has just been read.
        assert_eq!(cache.get("k0"), Some(0));

        cache.set("k50", 50);

        assert_eq!(cache.len(), 50);
        assert_eq!(cache.get("k0"), Some(0));
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get("k50"), Some(50));
    }

    #[test]
    fn debug_reports_bounds_and_occupancy() {
        let cache = cache(50, 1024, Duration::from_secs(60));
        cache.set("a", 7);
        let rendered = format!("{cache:?}");
        assert!(rendered.contains("max_entries: 50"));
        assert!(rendered.contains("len: 1"));
        assert!(rendered.contains("total_bytes: 1"));
    }

    #[test]
    fn byte_bound_evicts_until_it_fits() {
        // Each five-digit value serializes to 5 bytes.
        let cache = cache(50, 10, Duration::from_secs(60));
        cache.set("a", 11111);
        cache.set("b", 22222);
        assert_eq!(cache.total_bytes(), 10);

        cache.set("c", 33333);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(22222));
        assert_eq!(cache.get("c"), Some(33333));
        assert_eq!(cache.total_bytes(), 10);
    }

    #[test]
    fn oversized_value_is_not_cached() {
        let cache = cache(50, 3, Duration::from_secs(60));
        cache.set("big", 123456);
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn replacing_key_adjusts_size() {
        let cache = cache(50, 1024, Duration::from_secs(60));
        cache.set("k", 1);
        cache.set("k", 100000);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 6);
        assert_eq!(cache.get("k"), Some(100000));
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let cache = cache(50, 1024, Duration::from_millis(30));
        cache.set("k", 42);
        assert_eq!(cache.len(), 1);

        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn invalid_bounds_rejected() {
        let zero_entries = VolumeCache::new(CacheConfig {
            max_entries: 0,
            max_bytes: 10,
            ttl: Duration::from_secs(1),
        });
        assert!(zero_entries.is_err());

        let zero_ttl = VolumeCache::new(CacheConfig {
            max_entries: 1,
            max_bytes: 10,
            ttl: Duration::ZERO,
        });
        assert!(zero_ttl.is_err());
    }

    #[test]
    fn concurrent_writers_keep_bookkeeping_consistent() {
        let cache = Arc::new(cache(20, 5 * 1024, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200u64 {
                        cache.set(format!("t{t}-{}", i % 30), i);
                        let _ = cache.get(&format!("t{}-{}", (t + 1) % 8, i % 30));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        assert!(cache.len() <= 20);
        let mut expected = 0;
        for t in 0..8 {
            for k in 0..30 {
                if let Some(v) = cache.get(&format!("t{t}-{k}")) {
                    expected += serde_json::to_vec(&v).unwrap().len();
                }
            }
        }
        assert_eq!(cache.total_bytes(), expected);
    }
}
