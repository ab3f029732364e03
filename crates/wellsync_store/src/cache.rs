//! Bounded LRU preload cache for offline reads.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wellsync_model::EntityKey;

/// Statistics for the preload cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Current number of cached entities.
    pub entry_count: usize,
    /// Current payload bytes held.
    pub size_bytes: usize,
    /// Lookup hits since creation.
    pub hits: u64,
    /// Lookup misses since creation.
    pub misses: u64,
    /// Hit rate in `[0.0, 1.0]`; zero when no lookups happened.
    pub hit_rate: f64,
}

struct CacheEntry {
    payload: Arc<Vec<u8>>,
    tick: u64,
}

struct CacheInner {
    entries: HashMap<EntityKey, CacheEntry>,
    // Access tick -> key, oldest first. Ticks are unique.
    by_tick: BTreeMap<u64, EntityKey>,
    bytes: usize,
}

/// A bounded local cache of essential, already-synced entities.
///
/// Eviction is least-recently-used, bounded by both an entry count and a
/// payload byte budget. The cache has no conflict responsibilities; it only
/// shadows synced data for fast offline reads, and the orchestrator
/// invalidates or refreshes entries as entities change.
pub struct PreloadCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
    max_bytes: usize,
    tick: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PreloadCache {
    /// Creates a cache bounded by entry count and payload bytes.
    #[must_use]
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                by_tick: BTreeMap::new(),
                bytes: 0,
            }),
            max_entries,
            max_bytes,
            tick: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::SeqCst)
    }

    /// Inserts or refreshes an entity payload, evicting as needed.
    pub fn insert(&self, key: EntityKey, payload: Vec<u8>) {
        let tick = self.next_tick();
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.remove(&key) {
            inner.by_tick.remove(&old.tick);
            inner.bytes -= old.payload.len();
        }

        inner.bytes += payload.len();
        inner.by_tick.insert(tick, key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                payload: Arc::new(payload),
                tick,
            },
        );

        self.evict_over_limits(&mut inner);
    }

    /// Bulk-loads essential entities for offline access.
    pub fn preload<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (EntityKey, Vec<u8>)>,
    {
        for (key, payload) in entries {
            self.insert(key, payload);
        }
    }

    /// Looks up a payload, refreshing its recency on hit.
    pub fn get(&self, key: &EntityKey) -> Option<Arc<Vec<u8>>> {
        let tick = self.next_tick();
        let mut inner = self.inner.lock();

        let Some(entry) = inner.entries.get_mut(key) else {
            self.misses.fetch_add(1, Ordering::SeqCst);
            return None;
        };

        let old_tick = entry.tick;
        entry.tick = tick;
        let payload = Arc::clone(&entry.payload);

        inner.by_tick.remove(&old_tick);
        inner.by_tick.insert(tick, key.clone());

        self.hits.fetch_add(1, Ordering::SeqCst);
        Some(payload)
    }

    /// Drops an entity from the cache, if present.
    pub fn invalidate(&self, key: &EntityKey) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.remove(key) {
            inner.by_tick.remove(&entry.tick);
            inner.bytes -= entry.payload.len();
        }
    }

    /// Removes all cached entities.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.by_tick.clear();
        inner.bytes = 0;
    }

    /// Returns the number of cached entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-applies the eviction policy, dropping least-recently-used entries
    /// until the cache is within both its entry and byte bounds. Insertions
    /// already evict on their own; this forces a sweep explicitly.
    pub fn evict_to_limits(&self) {
        let mut inner = self.inner.lock();
        self.evict_over_limits(&mut inner);
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let hits = self.hits.load(Ordering::SeqCst);
        let misses = self.misses.load(Ordering::SeqCst);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        CacheStats {
            entry_count: inner.entries.len(),
            size_bytes: inner.bytes,
            hits,
            misses,
            hit_rate,
        }
    }

    fn evict_over_limits(&self, inner: &mut CacheInner) {
        while !inner.entries.is_empty()
            && (inner.entries.len() > self.max_entries || inner.bytes > self.max_bytes)
        {
            let Some((&oldest_tick, _)) = inner.by_tick.iter().next() else {
                break;
            };
            if let Some(key) = inner.by_tick.remove(&oldest_tick) {
                if let Some(entry) = inner.entries.remove(&key) {
                    inner.bytes -= entry.payload.len();
                }
            }
        }
    }
}

impl std::fmt::Debug for PreloadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("PreloadCache")
            .field("entry_count", &stats.entry_count)
            .field("size_bytes", &stats.size_bytes)
            .field("max_entries", &self.max_entries)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> EntityKey {
        EntityKey::new(id, "goal")
    }

    #[test]
    fn insert_and_get() {
        let cache = PreloadCache::new(10, 1024);
        cache.insert(key("e1"), vec![1, 2, 3]);

        assert_eq!(cache.get(&key("e1")).unwrap().as_slice(), &[1, 2, 3]);
        assert!(cache.get(&key("missing")).is_none());

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.size_bytes, 3);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn entry_limit_evicts_least_recently_used() {
        let cache = PreloadCache::new(2, 1024);
        cache.insert(key("a"), vec![1]);
        cache.insert(key("b"), vec![2]);

        // Touch "a" so "b" becomes the eviction candidate.
        cache.get(&key("a"));
        cache.insert(key("c"), vec![3]);

        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn byte_limit_evicts_until_under_budget() {
        let cache = PreloadCache::new(10, 10);
        cache.insert(key("a"), vec![0; 4]);
        cache.insert(key("b"), vec![0; 4]);
        cache.insert(key("c"), vec![0; 4]);

        let stats = cache.stats();
        assert!(stats.size_bytes <= 10);
        assert_eq!(stats.entry_count, 2);
        assert!(cache.get(&key("a")).is_none());
    }

    #[test]
    fn reinsert_replaces_payload_and_bytes() {
        let cache = PreloadCache::new(10, 1024);
        cache.insert(key("a"), vec![0; 8]);
        cache.insert(key("a"), vec![0; 2]);

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.size_bytes, 2);
    }

    #[test]
    fn invalidate_drops_entry() {
        let cache = PreloadCache::new(10, 1024);
        cache.insert(key("a"), vec![1]);
        cache.invalidate(&key("a"));

        assert!(cache.is_empty());
        assert_eq!(cache.stats().size_bytes, 0);
    }

    #[test]
    fn preload_bulk_loads() {
        let cache = PreloadCache::new(10, 1024);
        cache.preload(vec![
            (key("a"), vec![1]),
            (key("b"), vec![2]),
            (key("c"), vec![3]),
        ]);

        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn clear_resets_contents_but_not_counters() {
        let cache = PreloadCache::new(10, 1024);
        cache.insert(key("a"), vec![1]);
        cache.get(&key("a"));
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.size_bytes, 0);
        assert_eq!(stats.hits, 1);
    }
}
