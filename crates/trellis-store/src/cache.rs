use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use trellis_types::ContentId;

/// Counters reported by [`ContentCache::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub bytes: usize,
}

struct Inner {
    entries: LruCache<ContentId, Bytes>,
    bytes: usize,
}

/// Bounded LRU cache of payloads, sized in bytes.
///
/// Inserting evicts least recently used entries until the total payload size
/// fits the budget. A payload larger than the whole budget is never cached.
pub struct ContentCache {
    inner: Mutex<Inner>,
    capacity_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContentCache {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                bytes: 0,
            }),
            capacity_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache with an entry-count bound in addition to the byte budget.
    pub fn with_entry_limit(capacity_bytes: usize, max_entries: NonZeroUsize) -> Self {
        let cache = Self::new(capacity_bytes);
        cache.lock().entries.resize(max_entries);
        cache
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("lock poisoned")
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn get(&self, id: &ContentId) -> Option<Bytes> {
        let found = self.lock().entries.get(id).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Insert a payload. Returns `false` if it exceeds the budget on its own.
    pub fn insert(&self, id: ContentId, data: Bytes) -> bool {
        if data.len() > self.capacity_bytes {
            return false;
        }
        let mut inner = self.lock();
        let size = data.len();
        if let Some((_, evicted)) = inner.entries.push(id, data) {
            inner.bytes -= evicted.len();
        }
        inner.bytes += size;
        while inner.bytes > self.capacity_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => inner.bytes -= evicted.len(),
                None => break,
            }
        }
        true
    }

    pub fn remove(&self, id: &ContentId) -> Option<Bytes> {
        let mut inner = self.lock();
        let removed = inner.entries.pop(id);
        if let Some(data) = &removed {
            inner.bytes -= data.len();
        }
        removed
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        self.lock().entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: inner.entries.len(),
            bytes: inner.bytes,
        }
    }
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("capacity_bytes", &self.capacity_bytes)
            .field("stats", &self.stats())
            .finish()
    }
}
