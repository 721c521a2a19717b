//! Generic in-memory TTL cache
//!
//! Every entry carries its own expiry. A read past expiry is a miss and
//! evicts the entry on the spot, so correctness never depends on the
//! periodic [`TtlCache::purge_expired`] sweep, which only reclaims memory.

use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Counters of a single [`TtlCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtlCacheCounters {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because they expired (on read or by a sweep)
    pub expired: u64,
    pub entries: u64,
}

/// Thread-safe key/value cache with per-entry expiry
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.read().len())
            .field("default_ttl", &self.default_ttl)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a cache whose [`insert`](Self::insert) uses `default_ttl`
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Value for `key` if present and not expired
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                },
                Some(_) => {},
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                },
            }
        }

        // Expired: evict eagerly, re-checking under the write lock since a
        // concurrent set may have refreshed the entry in between
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            },
            Some(_) => {
                entries.remove(key);
                self.expired.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            },
        }
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .insert(key, Entry { value, expires_at });
    }

    /// Store with the default TTL
    pub fn insert(&self, key: K, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Remove an entry, returning whether one was present
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, expired ones included until evicted
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        drop(entries);

        self.expired.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn counters(&self) -> TtlCacheCounters {
        TtlCacheCounters {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            entries: self.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn get_returns_value_before_expiry() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("k".to_string(), 1);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_read_is_a_miss_and_evicts() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("k".to_string(), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);

        let counters = cache.counters();
        assert_eq!(counters.expired, 1);
        assert_eq!(counters.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_uses_explicit_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(1_u64, "short", Duration::from_secs(1));
        cache.insert(2_u64, "long");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn set_refreshes_expiry() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("k", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.insert("k", 2);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn delete_and_clear() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.get("a"), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired_entries() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.set("old", 1, Duration::from_secs(1));
        cache.set("new", 2, Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[test]
    fn counts_hits_and_misses() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.insert(1, "x");
        cache.get(&1);
        cache.get(&1);
        cache.get(&2);

        let counters = cache.counters();
        assert_eq!(counters.hits, 2);
        assert_eq!(counters.misses, 1);
        assert_eq!(counters.entries, 1);
    }

    #[tokio::test]
    async fn concurrent_access_without_external_locking() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let mut tasks = tokio::task::JoinSet::new();

        for worker in 0..8_u64 {
            let cache = Arc::clone(&cache);
            tasks.spawn(async move {
                for i in 0..100_u64 {
                    let key = worker * 1000 + i;
                    cache.insert(key, i);
                    assert_eq!(cache.get(&key), Some(i));
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }
        assert_eq!(cache.len(), 800);
    }
}
