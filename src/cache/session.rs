//! In-memory, dual-bounded (entry count + byte budget) LRU cache.
//!
//! A hand-rolled LRU rather than the `lru` crate: the cache must evict on
//! *two* simultaneous bounds (max entries and max total bytes) with the
//! byte total tracked exactly, which the `lru` crate's API doesn't expose
//! cleanly for. See `DESIGN.md` for the reasoning.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::entry::{CacheEntry, CacheKey};

/// Snapshot of cache statistics, safe to read concurrently.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    /// Number of cache hits so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
    /// Number of cache misses so far.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
    /// Number of entries evicted so far.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

struct Node<V> {
    key: CacheKey,
    entry: CacheEntry<V>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// An in-memory LRU bounded by both entry count and total estimated bytes.
pub struct SessionCache<V: Clone> {
    inner: Mutex<Inner<V>>,
    max_entries: usize,
    max_bytes: usize,
    stats: CacheStats,
}

struct Inner<V> {
    index: HashMap<CacheKey, usize>,
    slab: Vec<Option<Node<V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    total_bytes: usize,
}

impl<V: Clone> SessionCache<V> {
    /// Creates a cache bounded by `max_entries` entries and `max_bytes`
    /// total estimated bytes.
    #[must_use]
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                index: HashMap::new(),
                slab: Vec::new(),
                head: None,
                tail: None,
                total_bytes: 0,
            }),
            max_entries,
            max_bytes,
            stats: CacheStats::default(),
        }
    }

    /// Statistics for this cache.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Looks up `key`, validating its fingerprint against the file's
    /// current `(mtime_ns, size)`. Promotes the entry to most-recently-used
    /// on a hit.
    #[must_use]
    pub fn get(&self, key: &CacheKey, current_fingerprint: (i64, u64)) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let idx = *inner.index.get(key)?;
        let fingerprint_matches = inner.slab[idx]
            .as_ref()
            .is_some_and(|n| n.entry.fingerprint == current_fingerprint);
        if !fingerprint_matches {
            self.remove_locked(&mut inner, idx);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.move_to_front(&mut inner, idx);
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        inner.slab[idx].as_ref().map(|n| n.entry.value.clone())
    }

    /// Inserts or replaces the entry for `key`, evicting LRU entries until
    /// both the entry-count and byte budgets hold.
    pub fn put(&self, key: CacheKey, entry: CacheEntry<V>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&idx) = inner.index.get(&key) {
            self.remove_locked(&mut inner, idx);
        }

        let bytes = entry.bytes_estimate;
        let node = Node {
            key: key.clone(),
            entry,
            prev: None,
            next: inner.head,
        };
        let idx = inner.slab.len();
        inner.slab.push(Some(node));
        if let Some(head) = inner.head {
            if let Some(head_node) = inner.slab[head].as_mut() {
                head_node.prev = Some(idx);
            }
        }
        inner.head = Some(idx);
        if inner.tail.is_none() {
            inner.tail = Some(idx);
        }
        inner.index.insert(key, idx);
        inner.total_bytes += bytes;

        while inner.index.len() > self.max_entries || inner.total_bytes > self.max_bytes {
            let Some(tail) = inner.tail else { break };
            self.remove_locked(&mut inner, tail);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Removes every entry whose key's file is `path` or lies under it
    /// (used for write-tool invalidation).
    pub fn invalidate_prefix(&self, path: &std::path::Path) {
        let mut inner = self.inner.lock().unwrap();
        let stale: Vec<CacheKey> = inner
            .index
            .keys()
            .filter(|k| k.file.starts_with(path) || k.file == path)
            .cloned()
            .collect();
        for key in stale {
            if let Some(idx) = inner.index.get(&key).copied() {
                self.remove_locked(&mut inner, idx);
            }
        }
    }

    fn move_to_front(&self, inner: &mut Inner<V>, idx: usize) {
        if inner.head == Some(idx) {
            return;
        }
        self.unlink(inner, idx);
        let old_head = inner.head;
        if let Some(node) = inner.slab[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(head) = old_head {
            if let Some(head_node) = inner.slab[head].as_mut() {
                head_node.prev = Some(idx);
            }
        }
        inner.head = Some(idx);
        if inner.tail.is_none() {
            inner.tail = Some(idx);
        }
    }

    fn unlink(&self, inner: &mut Inner<V>, idx: usize) {
        let (prev, next) = inner.slab[idx]
            .as_ref()
            .map(|n| (n.prev, n.next))
            .unwrap_or((None, None));
        if let Some(prev) = prev {
            if let Some(node) = inner.slab[prev].as_mut() {
                node.next = next;
            }
        } else {
            inner.head = next;
        }
        if let Some(next) = next {
            if let Some(node) = inner.slab[next].as_mut() {
                node.prev = prev;
            }
        } else {
            inner.tail = prev;
        }
    }

    fn remove_locked(&self, inner: &mut Inner<V>, idx: usize) {
        self.unlink(inner, idx);
        if let Some(node) = inner.slab[idx].take() {
            inner.index.remove(&node.key);
            inner.total_bytes = inner.total_bytes.saturating_sub(node.entry.bytes_estimate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: &str, bytes: usize) -> CacheEntry<String> {
        CacheEntry {
            value: v.to_string(),
            fingerprint: (1, 1),
            bytes_estimate: bytes,
        }
    }

    #[test]
    fn test_get_miss_then_hit() {
        let cache = SessionCache::new(10, 1_000_000);
        let key = CacheKey::new("/p/a.rs", "op", "");
        assert!(cache.get(&key, (1, 1)).is_none());
        cache.put(key.clone(), entry("value", 10));
        assert_eq!(cache.get(&key, (1, 1)), Some("value".to_string()));
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_stale_fingerprint_is_a_miss_and_evicts() {
        let cache = SessionCache::new(10, 1_000_000);
        let key = CacheKey::new("/p/a.rs", "op", "");
        cache.put(key.clone(), entry("value", 10));
        assert!(cache.get(&key, (2, 2)).is_none());
        assert!(cache.get(&key, (1, 1)).is_none());
    }

    #[test]
    fn test_evicts_lru_when_entry_count_exceeded() {
        let cache = SessionCache::new(2, 1_000_000);
        let a = CacheKey::new("/p/a.rs", "op", "");
        let b = CacheKey::new("/p/b.rs", "op", "");
        let c = CacheKey::new("/p/c.rs", "op", "");
        cache.put(a.clone(), entry("a", 1));
        cache.put(b.clone(), entry("b", 1));
        cache.put(c.clone(), entry("c", 1));
        assert!(cache.get(&a, (1, 1)).is_none());
        assert_eq!(cache.get(&b, (1, 1)), Some("b".to_string()));
        assert_eq!(cache.get(&c, (1, 1)), Some("c".to_string()));
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[test]
    fn test_evicts_when_byte_budget_exceeded() {
        let cache = SessionCache::new(100, 15);
        let a = CacheKey::new("/p/a.rs", "op", "");
        let b = CacheKey::new("/p/b.rs", "op", "");
        cache.put(a.clone(), entry("aaaaaaaaaa", 10));
        cache.put(b.clone(), entry("bbbbbbbbbb", 10));
        assert!(cache.get(&a, (1, 1)).is_none());
    }

    #[test]
    fn test_invalidate_prefix_removes_matching_file() {
        let cache = SessionCache::new(10, 1_000_000);
        let key = CacheKey::new("/p/a.rs", "op", "");
        cache.put(key.clone(), entry("value", 10));
        cache.invalidate_prefix(std::path::Path::new("/p/a.rs"));
        assert!(cache.get(&key, (1, 1)).is_none());
    }
}
