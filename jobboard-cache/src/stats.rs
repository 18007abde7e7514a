//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the read-through core.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Supplier invocations.
    pub loads: AtomicU64,
    /// Callers that joined another caller's flight instead of loading.
    pub coalesced: AtomicU64,
    /// Computed values not stored because a tag was invalidated meanwhile.
    pub discarded: AtomicU64,
    /// Entries removed by invalidation.
    pub invalidated: AtomicU64,
    /// Reads served without caching because the tag index was unreachable.
    pub bypassed: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    pub loads: u64,
    pub coalesced: u64,
    pub discarded: u64,
    pub invalidated_entries: u64,
    pub bypassed: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Keys with a computation in progress.
    pub in_flight: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl CacheMetrics {
    /// Counter part of a [`CacheStats`]; store figures are filled in by the
    /// caller.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            invalidated_entries: self.invalidated.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }
}
