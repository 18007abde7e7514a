//! Cache store trait and the in-memory implementation.
//!
//! The store only holds opaque serialized values plus the metadata the
//! read-through core needs to decide liveness. It knows nothing about
//! suppliers, tags' meaning, or stampede protection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use jobboard_core::JobBoardResult;
use tokio::time::Instant;

use crate::key::CacheKey;
use crate::tag::Tag;

/// One resident cache entry.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Serialized value.
    pub value: Arc<Vec<u8>>,
    /// Tags with the generation each had when the value was computed.
    pub tags: Vec<(Tag, u64)>,
    pub stored_at: Instant,
    pub expires_at: Instant,
}

impl StoredEntry {
    /// Expiry is inclusive: an entry is dead at exactly `expires_at`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// True if this entry was computed under a generation of `tag` older
    /// than `generation`.
    pub fn predates(&self, tag: &Tag, generation: u64) -> bool {
        self.tags
            .iter()
            .any(|(own, recorded)| own == tag && *recorded < generation)
    }
}

/// An entry the store let go of on its own, through expiry or eviction.
pub type Released = (CacheKey, StoredEntry);

/// Snapshot of store occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreUsage {
    pub entries: u64,
    pub evictions: u64,
}

/// Pluggable storage medium for cache entries.
///
/// Implementations must make each call atomic per key; `get` in particular
/// returns one consistent snapshot of an entry (value and expiry together).
///
/// Entries the store drops by itself are handed back to the caller, which
/// owns cleaning up their tag registrations.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> JobBoardResult<Option<StoredEntry>>;

    /// Insert or replace the entry for `key`. Returns the entries dropped to
    /// make room for it.
    async fn put(&self, key: &CacheKey, entry: StoredEntry) -> JobBoardResult<Vec<Released>>;

    /// Drop the entry for `key` only if it predates `generation` of `tag`,
    /// and return it.
    ///
    /// A value recomputed after the invalidation started must survive it.
    async fn remove_stale(
        &self,
        key: &CacheKey,
        tag: &Tag,
        generation: u64,
    ) -> JobBoardResult<Option<StoredEntry>>;

    /// Drop and return every entry expired at `now`.
    async fn purge_expired(&self, now: Instant) -> JobBoardResult<Vec<Released>>;

    async fn usage(&self) -> JobBoardResult<StoreUsage>;
}

/// Share of the bound evicted at once when the store is full.
const EVICTION_BATCH_DIVISOR: usize = 16;

/// In-process store backed by a sharded concurrent map.
///
/// With `max_entries` set, inserting a new key into a full store first
/// purges expired entries. If that frees nothing, it evicts the
/// `max_entries / 16` entries (at least one) closest to expiry in one pass,
/// so a full scan is paid once per batch rather than once per insert.
/// Concurrent inserts may overshoot the bound by the number of racing
/// writers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<CacheKey, StoredEntry>,
    max_entries: Option<usize>,
    evictions: AtomicU64,
}

impl MemoryStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding at most `max_entries` entries. A bound of zero is
    /// raised to one; [`crate::CacheConfig::validate`] rejects it upstream.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: Some(max_entries.max(1)),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    fn purge_expired_now(&self, now: Instant) -> Vec<Released> {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|key| {
                self.entries
                    .remove_if(&key, |_, entry| entry.is_expired_at(now))
            })
            .collect()
    }

    fn make_room(&self, now: Instant) -> Vec<Released> {
        let Some(max) = self.max_entries else {
            return Vec::new();
        };
        if self.entries.len() < max {
            return Vec::new();
        }
        let mut released = self.purge_expired_now(now);
        if self.entries.len() < max {
            return released;
        }

        // Candidates are cloned out first; no shard guard is held while
        // removing.
        let batch = (max / EVICTION_BATCH_DIVISOR).max(1);
        let mut candidates: Vec<(Instant, CacheKey)> = self
            .entries
            .iter()
            .map(|entry| (entry.expires_at, entry.key().clone()))
            .collect();
        if candidates.len() > batch {
            candidates.select_nth_unstable_by_key(batch - 1, |(expires_at, _)| *expires_at);
            candidates.truncate(batch);
        }

        let mut evicted = 0u64;
        for (_, victim) in candidates {
            if let Some(removed) = self.entries.remove(&victim) {
                evicted += 1;
                released.push(removed);
            }
        }
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        tracing::debug!(evicted, "Evicted cache entries at capacity");
        released
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> JobBoardResult<Option<StoredEntry>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &CacheKey, entry: StoredEntry) -> JobBoardResult<Vec<Released>> {
        let released = if self.entries.contains_key(key) {
            Vec::new()
        } else {
            self.make_room(entry.stored_at)
        };
        self.entries.insert(key.clone(), entry);
        Ok(released)
    }

    async fn remove_stale(
        &self,
        key: &CacheKey,
        tag: &Tag,
        generation: u64,
    ) -> JobBoardResult<Option<StoredEntry>> {
        Ok(self
            .entries
            .remove_if(key, |_, entry| entry.predates(tag, generation))
            .map(|(_, entry)| entry))
    }

    async fn purge_expired(&self, now: Instant) -> JobBoardResult<Vec<Released>> {
        Ok(self.purge_expired_now(now))
    }

    async fn usage(&self) -> JobBoardResult<StoreUsage> {
        Ok(StoreUsage {
            entries: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}
