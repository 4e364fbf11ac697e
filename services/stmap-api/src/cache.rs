//! In-memory cache of encoded responses.
//!
//! Keys are the stable hash of a normalised call (see
//! `stmap_core::Call::cache_key`), so the same operation with the same
//! arguments hits the same entry regardless of parameter order or case.
//!
//! ## Eviction Strategy
//! - Memory-based LRU eviction when the byte budget is exceeded
//! - Freshness checked on read; stale entries are dropped lazily

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

/// Upper bound on the number of entries, independent of their size.
const MAX_ENTRIES: usize = 10_000;

struct CachedResponse {
    body: Bytes,
    content_type: &'static str,
    inserted_at: Instant,
}

impl CachedResponse {
    fn size(&self) -> u64 {
        self.body.len() as u64
    }
}

/// Counters for the response cache.
#[derive(Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    /// Entries dropped because they outlived the freshness window.
    pub expired: AtomicU64,
    pub size_bytes: AtomicU64,
    pub entry_count: AtomicU64,
}

impl CacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }
}

/// LRU cache of response bodies with a byte budget and freshness window.
///
/// Every access takes the write guard, so there is at most one writer for
/// any key at a time.
pub struct ResponseCache {
    entries: RwLock<LruCache<String, CachedResponse>>,
    max_bytes: u64,
    stale_after: Duration,
    stats: CacheStats,
}

impl ResponseCache {
    pub fn new(max_bytes: usize, stale_after: Duration) -> Self {
        let capacity = NonZeroUsize::new(MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN);
        tracing::info!(
            max_bytes,
            stale_after_secs = stale_after.as_secs(),
            "response cache initialized"
        );
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            max_bytes: max_bytes as u64,
            stale_after,
            stats: CacheStats::default(),
        }
    }

    /// Body and content type stored under `key`, if still fresh.
    pub async fn get(&self, key: &str) -> Option<(Bytes, &'static str)> {
        let mut entries = self.entries.write().await;

        let stale = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.stale_after => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some((entry.body.clone(), entry.content_type));
            }
            Some(_) => true,
            None => false,
        };

        if stale {
            if let Some(removed) = entries.pop(key) {
                self.release(removed.size(), 1);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a response. Bodies larger than the whole budget are skipped.
    pub async fn put(&self, key: String, body: Bytes, content_type: &'static str) {
        let entry = CachedResponse {
            body,
            content_type,
            inserted_at: Instant::now(),
        };
        let size = entry.size();
        if size > self.max_bytes {
            tracing::debug!(size, max_bytes = self.max_bytes, "response too large to cache");
            return;
        }

        let mut entries = self.entries.write().await;

        if let Some(old) = entries.pop(&key) {
            self.release(old.size(), 1);
        }

        let mut evicted = 0u64;
        while self.stats.size_bytes.load(Ordering::Relaxed) + size > self.max_bytes {
            match entries.pop_lru() {
                Some((_, removed)) => {
                    self.release(removed.size(), 1);
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            self.stats.evictions.fetch_add(evicted, Ordering::Relaxed);
            tracing::debug!(evicted, "response cache evicted entries");
        }

        if let Some((_, displaced)) = entries.push(key, entry) {
            // Entry limit reached; the least recently used entry went out
            self.release(displaced.size(), 1);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.size_bytes.fetch_add(size, Ordering::Relaxed);
        self.stats.entry_count.fetch_add(1, Ordering::Relaxed);
    }

    fn release(&self, bytes: u64, count: u64) {
        self.stats.size_bytes.fetch_sub(bytes, Ordering::Relaxed);
        self.stats.entry_count.fetch_sub(count, Ordering::Relaxed);
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        self.stats.size_bytes.store(0, Ordering::Relaxed);
        self.stats.entry_count.store(0, Ordering::Relaxed);
        tracing::info!(count, "response cache cleared");
    }
}
