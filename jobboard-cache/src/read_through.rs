//! Read-through cache with stampede protection and tag-based invalidation.
//!
//! [`ReadThroughCache::get_or_set`] serves a live entry or runs the supplier,
//! at most once per key at a time, and stores the result tagged. Mutations
//! call [`ReadThroughCache::invalidate`] after their write commits.
//!
//! # Coherence
//!
//! Before looking anything up, a call snapshots the current generation of
//! each of its tags. An entry is live only if it was computed under exactly
//! those generations. A computation whose tags are cleared while the
//! supplier runs notices it before storing and drops the value. A caller
//! that finds a flight started under older generations does not adopt its
//! result: it waits for that flight to settle and tries again.
//!
//! When the tag index cannot be read, calls still share one flight per key
//! but nothing they compute is stored.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};
use jobboard_core::{CacheError, ConfigError, JobBoardError, JobBoardResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{CacheConfig, TtlClass};
use crate::invalidator::{InvalidationReport, Invalidator};
use crate::key::{CacheKey, KeySpec};
use crate::policy::{self, Mutation};
use crate::stats::{CacheMetrics, CacheStats};
use crate::store::{CacheStore, MemoryStore, StoredEntry};
use crate::sweeper::{self, SweeperMetrics};
use crate::tag::Tag;
use crate::tag_index::{unregister_entry, InMemoryTagIndex, TagIndex};

/// Upper bound used when `now + ttl` does not fit in an `Instant`.
const MAX_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365);

type FlightOutput = Result<Arc<Vec<u8>>, JobBoardError>;
type FlightFuture = BoxFuture<'static, FlightOutput>;

/// One in-progress computation. The table only holds a weak handle: once
/// every waiter has gone, the computation is dropped.
struct Flight {
    id: u64,
    /// `None` for a read-through started while the tag index was down.
    generations: Option<Vec<(Tag, u64)>>,
    handle: WeakShared<FlightFuture>,
}

type FlightTable = DashMap<CacheKey, Flight>;

/// Removes a flight from the table when its computation finishes or is
/// dropped. A newer flight for the same key is left alone.
struct FlightGuard {
    flights: Arc<FlightTable>,
    key: CacheKey,
    id: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flights.remove_if(&self.key, |_, flight| flight.id == self.id);
    }
}

enum Claim<F> {
    /// Started a new flight.
    Led(Shared<FlightFuture>),
    /// Joined a flight at least as fresh as this caller.
    Joined(Shared<FlightFuture>),
    /// Found a flight this caller may not adopt: one started before an
    /// invalidation the caller has seen, or one on the other side of an
    /// index outage. The supplier is handed back for the retry.
    Stale(Shared<FlightFuture>, F),
}

/// Read-through cache over a pluggable store and tag index.
///
/// Shared between services through an `Arc`; every method takes `&self`.
pub struct ReadThroughCache<S = MemoryStore, I = InMemoryTagIndex>
where
    S: CacheStore,
    I: TagIndex,
{
    store: Arc<S>,
    index: Arc<I>,
    invalidator: Invalidator<S, I>,
    flights: Arc<FlightTable>,
    next_flight: AtomicU64,
    metrics: Arc<CacheMetrics>,
    config: CacheConfig,
}

impl ReadThroughCache<MemoryStore, InMemoryTagIndex> {
    /// Cache over an in-process store bounded by `config.max_entries`.
    ///
    /// Fails if `config` does not pass [`CacheConfig::validate`].
    pub fn in_memory(config: CacheConfig) -> Result<Self, ConfigError> {
        let store = match config.max_entries {
            Some(max) => MemoryStore::with_capacity(max),
            None => MemoryStore::new(),
        };
        Self::new(Arc::new(store), Arc::new(InMemoryTagIndex::new()), config)
    }
}

impl<S, I> ReadThroughCache<S, I>
where
    S: CacheStore + 'static,
    I: TagIndex + 'static,
{
    /// Fails if `config` does not pass [`CacheConfig::validate`].
    pub fn new(store: Arc<S>, index: Arc<I>, config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            invalidator: Invalidator::new(Arc::clone(&store), Arc::clone(&index)),
            store,
            index,
            flights: Arc::new(DashMap::new()),
            next_flight: AtomicU64::new(0),
            metrics: Arc::new(CacheMetrics::new()),
            config,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Keys with a computation in progress.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Serve `key` from the cache or compute it with `supplier`.
    ///
    /// Concurrent calls for the same key share one supplier invocation. A
    /// supplier failure is returned to every caller sharing it and is not
    /// cached. Apart from that, the only error is a value that cannot be
    /// serialized. Store failures degrade to a miss; index failures to a
    /// shared read-through that is not stored.
    ///
    /// `tags` must be the same, in any order, for every call on `key`;
    /// [`ReadThroughCache::get_or_load`] derives both from one [`KeySpec`].
    pub async fn get_or_set<V, F, Fut>(
        &self,
        key: &CacheKey,
        tags: &[Tag],
        ttl: Duration,
        supplier: F,
    ) -> JobBoardResult<V>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = JobBoardResult<V>> + Send + 'static,
    {
        let mut supplier = supplier;
        let mut counted = false;

        loop {
            let generations = match self.index.generations(tags).await {
                Ok(generations) => Some(generations),
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        error = %e,
                        "Tag index unavailable, reading through without caching"
                    );
                    if !counted {
                        CacheMetrics::incr(&self.metrics.bypassed);
                        counted = true;
                    }
                    None
                }
            };

            if let Some(generations) = &generations {
                if let Some(value) = self.lookup::<V>(key, generations).await {
                    if !counted {
                        CacheMetrics::incr(&self.metrics.hits);
                    }
                    tracing::debug!(key = %key, "Cache hit");
                    return Ok(value);
                }
                if !counted {
                    CacheMetrics::incr(&self.metrics.misses);
                    counted = true;
                }
            }

            match self.claim(key, generations, ttl, supplier) {
                Claim::Led(flight) => {
                    tracing::debug!(key = %key, "Cache miss, loading");
                    return decode(key, flight.await);
                }
                Claim::Joined(flight) => {
                    CacheMetrics::incr(&self.metrics.coalesced);
                    tracing::debug!(key = %key, "Cache miss, joined in-flight load");
                    return decode(key, flight.await);
                }
                Claim::Stale(flight, returned) => {
                    tracing::debug!(
                        key = %key,
                        "In-flight load cannot serve this caller, waiting to retry"
                    );
                    supplier = returned;
                    let _ = flight.await;
                }
            }
        }
    }

    /// [`ReadThroughCache::get_or_set`] with key, tags and TTL taken from a
    /// key spec and the configured TTL class.
    pub async fn get_or_load<V, F, Fut>(
        &self,
        spec: &KeySpec,
        class: TtlClass,
        supplier: F,
    ) -> JobBoardResult<V>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = JobBoardResult<V>> + Send + 'static,
    {
        let key = spec.key();
        let tags = spec.tags();
        self.get_or_set(&key, &tags, self.config.ttl_for(class), supplier)
            .await
    }

    /// Drop every entry registered under `tags`.
    pub async fn invalidate_tags(&self, tags: &[Tag]) -> InvalidationReport {
        self.apply(tags, "explicit").await
    }

    /// Drop every view made stale by a committed mutation.
    pub async fn invalidate(&self, mutation: &Mutation) -> InvalidationReport {
        let tags = policy::tags_for(mutation);
        self.apply(&tags, &mutation.to_string()).await
    }

    async fn apply(&self, tags: &[Tag], context: &str) -> InvalidationReport {
        let report = self.invalidator.invalidate(tags, context).await;
        CacheMetrics::add(&self.metrics.invalidated, report.removed_entries);
        if !report.is_complete() {
            tracing::warn!(
                mutation = context,
                failed = report.failed.len(),
                cleared = report.cleared.len(),
                "Invalidation incomplete"
            );
        }
        report
    }

    /// Current counters plus store occupancy.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.metrics.snapshot();
        match self.store.usage().await {
            Ok(usage) => {
                stats.entry_count = usage.entries;
                stats.evictions = usage.evictions;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to read cache store usage"),
        }
        stats.in_flight = self.flights.len() as u64;
        stats
    }

    /// Start the expired-entry sweeper on the current runtime.
    pub fn spawn_sweeper(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<Arc<SweeperMetrics>> {
        let store = Arc::clone(&self.store);
        let index = Arc::clone(&self.index);
        let interval = self.config.sweep_interval;
        tokio::spawn(sweeper::sweep_expired_task(store, index, interval, shutdown_rx))
    }

    async fn lookup<V: DeserializeOwned>(
        &self,
        key: &CacheKey,
        generations: &[(Tag, u64)],
    ) -> Option<V> {
        let entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache store read failed, treating as miss");
                return None;
            }
        };

        if entry.is_expired_at(Instant::now()) {
            tracing::trace!(key = %key, "Entry expired");
            return None;
        }
        if !same_generations(&entry.tags, generations) {
            tracing::trace!(key = %key, "Entry predates an invalidation");
            return None;
        }

        match serde_json::from_slice(&entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cached value unreadable, treating as miss");
                None
            }
        }
    }

    /// Join or start the flight for `key`. Never awaits: the map entry is
    /// released before this returns.
    fn claim<V, F, Fut>(
        &self,
        key: &CacheKey,
        generations: Option<Vec<(Tag, u64)>>,
        ttl: Duration,
        supplier: F,
    ) -> Claim<F>
    where
        V: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = JobBoardResult<V>> + Send + 'static,
    {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if let Some(flight) = occupied.get().handle.upgrade() {
                    let running = occupied.get().generations.as_deref();
                    return if joinable(running, generations.as_deref()) {
                        Claim::Joined(flight)
                    } else {
                        Claim::Stale(flight, supplier)
                    };
                }
                // Every waiter of the previous flight has gone.
                let (flight, slot) = self.launch(key, generations, ttl, supplier);
                if let Some(slot) = slot {
                    occupied.insert(slot);
                }
                Claim::Led(flight)
            }
            Entry::Vacant(vacant) => {
                let (flight, slot) = self.launch(key, generations, ttl, supplier);
                if let Some(slot) = slot {
                    vacant.insert(slot);
                }
                Claim::Led(flight)
            }
        }
    }

    fn launch<V, F, Fut>(
        &self,
        key: &CacheKey,
        generations: Option<Vec<(Tag, u64)>>,
        ttl: Duration,
        supplier: F,
    ) -> (Shared<FlightFuture>, Option<Flight>)
    where
        V: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = JobBoardResult<V>> + Send + 'static,
    {
        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let guard = FlightGuard {
            flights: Arc::clone(&self.flights),
            key: key.clone(),
            id,
        };
        let store = Arc::clone(&self.store);
        let index = Arc::clone(&self.index);
        let metrics = Arc::clone(&self.metrics);
        let flight_key = key.clone();
        let flight_generations = generations.clone();

        let future: FlightFuture = async move {
            let _guard = guard;
            CacheMetrics::incr(&metrics.loads);
            let value = supplier().await?;
            let bytes = serde_json::to_vec(&value).map_err(|e| CacheError::Serialization {
                key: flight_key.to_string(),
                reason: e.to_string(),
            })?;
            drop(value);
            let bytes = Arc::new(bytes);
            if let Some(generations) = flight_generations {
                commit(
                    store.as_ref(),
                    index.as_ref(),
                    &metrics,
                    &flight_key,
                    generations,
                    ttl,
                    Arc::clone(&bytes),
                )
                .await;
            }
            Ok::<_, JobBoardError>(bytes)
        }
        .boxed();

        let flight = future.shared();
        let slot = flight.downgrade().map(|handle| Flight {
            id,
            generations,
            handle,
        });
        (flight, slot)
    }
}

/// Store a computed value unless one of its tags was cleared while it was
/// being computed.
async fn commit<S, I>(
    store: &S,
    index: &I,
    metrics: &CacheMetrics,
    key: &CacheKey,
    generations: Vec<(Tag, u64)>,
    ttl: Duration,
    value: Arc<Vec<u8>>,
) where
    S: CacheStore + ?Sized,
    I: TagIndex + ?Sized,
{
    let tags: Vec<Tag> = generations.iter().map(|(tag, _)| tag.clone()).collect();
    match index.generations(&tags).await {
        Ok(current) if current == generations => {}
        Ok(_) => {
            CacheMetrics::incr(&metrics.discarded);
            tracing::debug!(key = %key, "Tag cleared during load, value not cached");
            return;
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Tag index unavailable, value not cached");
            return;
        }
    }

    // A clear that lands between the check above and the writes below still
    // wins: the entry records the old generations and reads as dead.
    let now = Instant::now();
    let entry = StoredEntry {
        value,
        tags: generations,
        stored_at: now,
        expires_at: now.checked_add(ttl).unwrap_or(now + MAX_TTL),
    };
    let released = match store.put(key, entry).await {
        Ok(released) => released,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Cache store write failed");
            return;
        }
    };
    for tag in &tags {
        // An unregistered entry is still dead after a clear of `tag` since
        // its generation no longer matches; it just lingers until expiry.
        if let Err(e) = index.register(tag, key).await {
            tracing::warn!(key = %key, tag = %tag, error = %e, "Failed to register cache key under tag");
        }
    }
    for (evicted, entry) in &released {
        unregister_entry(index, evicted, &entry.tags).await;
    }
}

fn decode<V: DeserializeOwned>(key: &CacheKey, output: FlightOutput) -> JobBoardResult<V> {
    let bytes = output?;
    serde_json::from_slice(&bytes).map_err(|e| {
        CacheError::Deserialization {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Same tags, same generations, in any order.
fn same_generations(recorded: &[(Tag, u64)], current: &[(Tag, u64)]) -> bool {
    recorded.len() == current.len() && current.iter().all(|pair| recorded.contains(pair))
}

/// True if a caller that observed `caller` may take the result of a flight
/// started under `flight`. Read-throughs only share with each other.
fn joinable(flight: Option<&[(Tag, u64)]>, caller: Option<&[(Tag, u64)]>) -> bool {
    match (flight, caller) {
        (Some(flight), Some(caller)) => covers(flight, caller),
        (None, None) => true,
        _ => false,
    }
}

/// True if a flight started under `flight` generations is at least as fresh
/// as a caller that observed `caller`.
fn covers(flight: &[(Tag, u64)], caller: &[(Tag, u64)]) -> bool {
    caller.iter().all(|(tag, generation)| {
        flight
            .iter()
            .any(|(own, started)| own == tag && started >= generation)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Released, StoreUsage};
    use crate::tag_index::ClearedTag;
    use async_trait::async_trait;
    use futures_util::future::join_all;
    use jobboard_core::{Category, EntityKind, EntityRef, StorageError, Vacancy, VacancyFilter};
    use jobboard_test_utils::CallCounter;
    use std::collections::HashSet;

    const TTL: Duration = Duration::from_secs(60);

    fn cache() -> ReadThroughCache {
        ReadThroughCache::in_memory(CacheConfig::default()).unwrap()
    }

    fn category_key() -> (CacheKey, Vec<Tag>) {
        let spec = KeySpec::entity(EntityKind::Category, 7);
        (spec.key(), spec.tags())
    }

    fn backend() -> Category {
        Category {
            category_id: 7,
            name: "Backend".to_string(),
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit_within_ttl() {
        let cache = cache();
        let counter = CallCounter::new();
        let (key, tags) = category_key();

        let first: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(backend()))
            .await
            .unwrap();
        let second: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(backend()))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(counter.calls(), 1);
        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.loads), (1, 1, 1));
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_load() {
        let cache = cache();
        let counter = CallCounter::new();
        let (key, tags) = category_key();

        let calls = (0..10).map(|_| {
            cache.get_or_set::<Category, _, _>(
                &key,
                &tags,
                TTL,
                counter.delayed(Ok(backend()), Duration::from_millis(50)),
            )
        });
        let results = join_all(calls).await;

        assert_eq!(counter.calls(), 1);
        for result in results {
            assert_eq!(result.unwrap(), backend());
        }
        let stats = cache.stats().await;
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.coalesced, 9);
        assert_eq!(stats.misses, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_not_cached() {
        let cache = cache();
        let counter = CallCounter::new();
        let (key, tags) = category_key();
        let failure: JobBoardError = StorageError::Unavailable {
            reason: "connection refused".to_string(),
        }
        .into();

        let calls = (0..5).map(|_| {
            cache.get_or_set::<Category, _, _>(
                &key,
                &tags,
                TTL,
                counter.delayed(Err(failure.clone()), Duration::from_millis(20)),
            )
        });
        for result in join_all(calls).await {
            assert_eq!(result.unwrap_err(), failure);
        }
        assert_eq!(counter.calls(), 1);
        assert_eq!(cache.stats().await.entry_count, 0);

        let retried: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(backend()))
            .await
            .unwrap();
        assert_eq!(retried, backend());
        assert_eq!(counter.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl() {
        let cache = cache();
        let counter = CallCounter::new();
        let (key, tags) = category_key();

        let _: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(backend()))
            .await
            .unwrap();
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        let _: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(backend()))
            .await
            .unwrap();
        assert_eq!(counter.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let _: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(backend()))
            .await
            .unwrap();
        assert_eq!(counter.calls(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let cache = cache();
        let counter = CallCounter::new();
        let (key, tags) = category_key();

        for _ in 0..3 {
            let missing: Option<Category> = cache
                .get_or_set(&key, &tags, TTL, counter.returning(None))
                .await
                .unwrap();
            assert!(missing.is_none());
        }
        assert_eq!(counter.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidation_forces_recompute_before_ttl() {
        let cache = cache();
        let counter = CallCounter::new();
        let (key, tags) = category_key();

        let _: Category = cache
            .get_or_set(&key, &tags, Duration::from_secs(3600), counter.returning(backend()))
            .await
            .unwrap();
        let report = cache.invalidate_tags(&tags).await;
        assert!(report.is_complete());
        assert_eq!(report.removed_entries, 1);

        let renamed = Category {
            name: "Platform".to_string(),
            ..backend()
        };
        let fresh: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(renamed.clone()))
            .await
            .unwrap();
        assert_eq!(fresh, renamed);
        assert_eq!(counter.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidation_is_precise() {
        let cache = cache();
        let counter = CallCounter::new();
        let (key, tags) = category_key();
        let other = KeySpec::entity(EntityKind::Category, 8);

        let _: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(backend()))
            .await
            .unwrap();
        let _: Category = cache
            .get_or_set(&other.key(), &other.tags(), TTL, counter.returning(backend()))
            .await
            .unwrap();

        cache.invalidate_tags(&tags).await;

        let _: Category = cache
            .get_or_set(&other.key(), &other.tags(), TTL, counter.returning(backend()))
            .await
            .unwrap();
        assert_eq!(counter.calls(), 2);
    }

    #[tokio::test]
    async fn test_value_computed_across_invalidation_is_not_stored() {
        let cache = Arc::new(cache());
        let counter = CallCounter::new();
        let (key, tags) = category_key();
        let (gate, supplier) = counter.gated(backend());

        let leader = {
            let cache = Arc::clone(&cache);
            let (key, tags) = (key.clone(), tags.clone());
            tokio::spawn(async move { cache.get_or_set::<Category, _, _>(&key, &tags, TTL, supplier).await })
        };
        while cache.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        cache.invalidate_tags(&tags).await;
        gate.open();

        // The caller that started before the invalidation may see the old value.
        assert_eq!(leader.await.unwrap().unwrap(), backend());
        let stats = cache.stats().await;
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.entry_count, 0);

        let _: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(backend()))
            .await
            .unwrap();
        assert_eq!(counter.calls(), 2);
    }

    #[tokio::test]
    async fn test_caller_after_invalidation_skips_stale_flight() {
        let cache = Arc::new(cache());
        let counter = CallCounter::new();
        let (key, tags) = category_key();
        let (gate, stale_supplier) = counter.gated(backend());

        let stale = {
            let cache = Arc::clone(&cache);
            let (key, tags) = (key.clone(), tags.clone());
            tokio::spawn(async move { cache.get_or_set::<Category, _, _>(&key, &tags, TTL, stale_supplier).await })
        };
        while cache.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        cache.invalidate_tags(&tags).await;

        let renamed = Category {
            name: "Platform".to_string(),
            ..backend()
        };
        let fresh = {
            let cache = Arc::clone(&cache);
            let (key, tags) = (key.clone(), tags.clone());
            let supplier = counter.returning(renamed.clone());
            tokio::spawn(async move { cache.get_or_set::<Category, _, _>(&key, &tags, TTL, supplier).await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(counter.calls(), 1, "fresh caller must wait for the stale flight");

        gate.open();
        assert_eq!(stale.await.unwrap().unwrap(), backend());
        assert_eq!(fresh.await.unwrap().unwrap(), renamed);
        assert_eq!(counter.calls(), 2);
        assert_eq!(cache.stats().await.coalesced, 0);
    }

    #[tokio::test]
    async fn test_dropping_one_waiter_keeps_flight_alive() {
        let cache = Arc::new(cache());
        let counter = CallCounter::new();
        let (key, tags) = category_key();
        let (gate, supplier) = counter.gated(backend());

        let leader = {
            let cache = Arc::clone(&cache);
            let (key, tags) = (key.clone(), tags.clone());
            tokio::spawn(async move { cache.get_or_set::<Category, _, _>(&key, &tags, TTL, supplier).await })
        };
        while cache.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        let follower = {
            let cache = Arc::clone(&cache);
            let (key, tags) = (key.clone(), tags.clone());
            let supplier = counter.returning(backend());
            tokio::spawn(async move { cache.get_or_set::<Category, _, _>(&key, &tags, TTL, supplier).await })
        };
        while cache.stats().await.coalesced == 0 {
            tokio::task::yield_now().await;
        }

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());
        assert_eq!(cache.in_flight(), 1);

        gate.open();
        assert_eq!(follower.await.unwrap().unwrap(), backend());
        assert_eq!(counter.calls(), 1);
    }

    #[tokio::test]
    async fn test_last_waiter_leaving_releases_flight() {
        let cache = Arc::new(cache());
        let counter = CallCounter::new();
        let (key, tags) = category_key();
        let (_gate, supplier) = counter.gated(backend());

        let leader = {
            let cache = Arc::clone(&cache);
            let (key, tags) = (key.clone(), tags.clone());
            tokio::spawn(async move { cache.get_or_set::<Category, _, _>(&key, &tags, TTL, supplier).await })
        };
        while cache.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        leader.abort();
        let _ = leader.await;
        assert_eq!(cache.in_flight(), 0);

        let value: Category = cache
            .get_or_set(&key, &tags, TTL, counter.returning(backend()))
            .await
            .unwrap();
        assert_eq!(value, backend());
        assert_eq!(counter.calls(), 2);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_list_and_recommendations() {
        let cache = cache();
        let counter = CallCounter::new();
        let list = KeySpec::filtered(EntityKind::Vacancy, &VacancyFilter::new().with_page(1, 5));
        let recs = KeySpec::view(crate::key::DerivedView::Recommendations, 5);
        let unrelated = KeySpec::entity(EntityKind::Category, 1);

        for spec in [&list, &recs, &unrelated] {
            let _: Vec<i64> = cache
                .get_or_load(spec, TtlClass::List, counter.returning(vec![1]))
                .await
                .unwrap();
        }
        assert_eq!(counter.calls(), 3);

        let mutation = Mutation::created(EntityRef::vacancy(42)).with_related([EntityRef::recruiter(7)]);
        let report = cache.invalidate(&mutation).await;
        assert!(report.is_complete());
        assert_eq!(report.removed_entries, 2);

        for spec in [&list, &recs, &unrelated] {
            let _: Vec<i64> = cache
                .get_or_load(spec, TtlClass::List, counter.returning(vec![1, 42]))
                .await
                .unwrap();
        }
        assert_eq!(counter.calls(), 5);
        assert_eq!(cache.stats().await.invalidated_entries, 2);
    }

    #[tokio::test]
    async fn test_supplier_error_reaches_the_caller_unchanged() {
        let cache = cache();
        let counter = CallCounter::new();
        let (key, tags) = category_key();
        let missing: JobBoardError = StorageError::NotFound {
            kind: EntityKind::Category,
            id: 7,
        }
        .into();

        let err = cache
            .get_or_set::<Category, _, _>(&key, &tags, TTL, counter.failing(missing.clone()))
            .await
            .unwrap_err();
        assert_eq!(err, missing);

        let stats = cache.stats().await;
        assert_eq!((stats.misses, stats.loads, stats.entry_count), (1, 1, 0));
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_capped_cache_keeps_tag_index_bounded() {
        let config = CacheConfig::default().with_max_entries(Some(10));
        let cache = ReadThroughCache::in_memory(config).unwrap();
        let counter = CallCounter::new();

        for id in 0..1000 {
            let spec = KeySpec::entity(EntityKind::Vacancy, id);
            let _: Option<Vacancy> = cache
                .get_or_load(&spec, TtlClass::Entity, counter.returning(None))
                .await
                .unwrap();
        }

        assert_eq!(counter.calls(), 1000);
        assert!(cache.store().len() <= 10);
        assert!(cache.index().registration_count() <= 10);
        assert!(cache.index().tag_count() <= 10);
        assert_eq!(cache.index().registration_count(), cache.store().len());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let zero_ttl = CacheConfig::default().with_entity_ttl(Duration::ZERO);
        assert!(ReadThroughCache::in_memory(zero_ttl).is_err());

        let zero_bound = CacheConfig::default().with_max_entries(Some(0));
        assert!(matches!(
            ReadThroughCache::in_memory(zero_bound),
            Err(ConfigError::InvalidValue { field, .. }) if field == "max_entries"
        ));

        let unbounded = CacheConfig::default().with_max_entries(None);
        assert!(ReadThroughCache::in_memory(unbounded).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stampede_across_worker_threads() {
        let cache = Arc::new(cache());
        let (key, tags) = category_key();

        for round in 0..20 {
            cache.invalidate_tags(&tags).await;
            let counter = CallCounter::new();
            let barrier = Arc::new(tokio::sync::Barrier::new(32));

            let callers: Vec<_> = (0..32)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    let barrier = Arc::clone(&barrier);
                    let (key, tags) = (key.clone(), tags.clone());
                    let supplier = counter.delayed(Ok(backend()), Duration::from_millis(10));
                    tokio::spawn(async move {
                        barrier.wait().await;
                        cache.get_or_set::<Category, _, _>(&key, &tags, TTL, supplier).await
                    })
                })
                .collect();
            for caller in callers {
                assert_eq!(caller.await.unwrap().unwrap(), backend());
            }
            assert_eq!(counter.calls(), 1, "round {}", round);
        }
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reads_after_invalidation_see_the_write_under_contention() {
        let cache = Arc::new(cache());
        let (key, tags) = category_key();
        let version = Arc::new(AtomicU64::new(0));
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        fn read_version(
            version: &Arc<AtomicU64>,
        ) -> impl FnOnce() -> BoxFuture<'static, JobBoardResult<u64>> + Send + 'static {
            let version = Arc::clone(version);
            move || async move { Ok::<_, JobBoardError>(version.load(Ordering::SeqCst)) }.boxed()
        }

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let version = Arc::clone(&version);
                let done = Arc::clone(&done);
                let (key, tags) = (key.clone(), tags.clone());
                tokio::spawn(async move {
                    while !done.load(Ordering::SeqCst) {
                        let _: u64 = cache
                            .get_or_set(&key, &tags, TTL, read_version(&version))
                            .await
                            .unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for _ in 0..300 {
            let committed = version.fetch_add(1, Ordering::SeqCst) + 1;
            cache.invalidate_tags(&tags).await;
            let seen: u64 = cache
                .get_or_set(&key, &tags, TTL, read_version(&version))
                .await
                .unwrap();
            assert!(seen >= committed, "read {} after committing {}", seen, committed);
        }

        done.store(true, Ordering::SeqCst);
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(cache.in_flight(), 0);
    }

    /// Index whose reads always fail.
    struct DownIndex;

    #[async_trait]
    impl TagIndex for DownIndex {
        async fn register(&self, tag: &Tag, _key: &CacheKey) -> JobBoardResult<()> {
            Err(unavailable(tag))
        }

        async fn unregister(&self, tag: &Tag, _key: &CacheKey) -> JobBoardResult<()> {
            Err(unavailable(tag))
        }

        async fn keys_for(&self, tag: &Tag) -> JobBoardResult<HashSet<CacheKey>> {
            Err(unavailable(tag))
        }

        async fn clear(&self, tag: &Tag) -> JobBoardResult<ClearedTag> {
            Err(unavailable(tag))
        }

        async fn generation(&self, tag: &Tag) -> JobBoardResult<u64> {
            Err(unavailable(tag))
        }
    }

    fn unavailable(tag: &Tag) -> JobBoardError {
        CacheError::IndexUnavailable {
            tag: tag.to_string(),
            reason: "down".to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_index_outage_reads_through() {
        let cache = ReadThroughCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(DownIndex),
            CacheConfig::default(),
        )
        .unwrap();
        let counter = CallCounter::new();
        let (key, tags) = category_key();

        for _ in 0..2 {
            let value: Category = cache
                .get_or_set(&key, &tags, TTL, counter.returning(backend()))
                .await
                .unwrap();
            assert_eq!(value, backend());
        }
        assert_eq!(counter.calls(), 2);
        assert_eq!(cache.stats().await.bypassed, 2);

        let report = cache.invalidate_tags(&tags).await;
        assert!(!report.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_outage_still_shares_one_load() {
        let cache = ReadThroughCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(DownIndex),
            CacheConfig::default(),
        )
        .unwrap();
        let counter = CallCounter::new();
        let (key, tags) = category_key();

        let calls = (0..10).map(|_| {
            cache.get_or_set::<Category, _, _>(
                &key,
                &tags,
                TTL,
                counter.delayed(Ok(backend()), Duration::from_millis(50)),
            )
        });
        for result in join_all(calls).await {
            assert_eq!(result.unwrap(), backend());
        }

        assert_eq!(counter.calls(), 1);
        let stats = cache.stats().await;
        assert_eq!(stats.bypassed, 10);
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.coalesced, 9);
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.in_flight, 0);
    }

    /// Store whose every call fails.
    struct DownStore;

    #[async_trait]
    impl CacheStore for DownStore {
        async fn get(&self, _key: &CacheKey) -> JobBoardResult<Option<StoredEntry>> {
            Err(down())
        }

        async fn put(&self, _key: &CacheKey, _entry: StoredEntry) -> JobBoardResult<Vec<Released>> {
            Err(down())
        }

        async fn remove_stale(
            &self,
            _key: &CacheKey,
            _tag: &Tag,
            _generation: u64,
        ) -> JobBoardResult<Option<StoredEntry>> {
            Err(down())
        }

        async fn purge_expired(&self, _now: Instant) -> JobBoardResult<Vec<Released>> {
            Err(down())
        }

        async fn usage(&self) -> JobBoardResult<StoreUsage> {
            Err(down())
        }
    }

    fn down() -> JobBoardError {
        CacheError::StoreUnavailable {
            reason: "down".to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_store_outage_degrades_to_miss() {
        let cache = ReadThroughCache::new(
            Arc::new(DownStore),
            Arc::new(InMemoryTagIndex::new()),
            CacheConfig::default(),
        )
        .unwrap();
        let counter = CallCounter::new();
        let (key, tags) = category_key();

        for _ in 0..2 {
            let value: Category = cache
                .get_or_set(&key, &tags, TTL, counter.returning(backend()))
                .await
                .unwrap();
            assert_eq!(value, backend());
        }
        assert_eq!(counter.calls(), 2);
        assert_eq!(cache.stats().await.misses, 2);
    }

    #[test]
    fn test_covers() {
        let t = Tag::collection(EntityKind::Vacancy);
        assert!(covers(&[(t.clone(), 2)], &[(t.clone(), 1)]));
        assert!(covers(&[(t.clone(), 1)], &[(t.clone(), 1)]));
        assert!(!covers(&[(t.clone(), 0)], &[(t.clone(), 1)]));
        assert!(!covers(&[], &[(t, 0)]));
    }
}
