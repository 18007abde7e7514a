//! Expired Entry Sweeper
//!
//! Reads already ignore expired entries; this task only reclaims the memory
//! they hold, in the store and in the tag index. It runs until the shutdown
//! signal is received or the shutdown sender is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::store::CacheStore;
use crate::tag_index::{unregister_entry, TagIndex};

/// Counters for the sweeper's lifetime.
#[derive(Debug, Default)]
pub struct SweeperMetrics {
    /// Sweep cycles completed
    pub sweeps: AtomicU64,

    /// Entries purged since startup
    pub purged: AtomicU64,

    /// Empty tag slots released since startup
    pub released_tags: AtomicU64,

    /// Sweeps that failed at the store
    pub errors: AtomicU64,
}

impl SweeperMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SweeperSnapshot {
        SweeperSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
            released_tags: self.released_tags.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweeper metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperSnapshot {
    pub sweeps: u64,
    pub purged: u64,
    pub released_tags: u64,
    pub errors: u64,
}

/// Background task that periodically purges expired entries from `store`
/// and drops their registrations from `index`.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(sweep_expired_task(store, index, Duration::from_secs(30), shutdown_rx));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn sweep_expired_task<S, I>(
    store: Arc<S>,
    index: Arc<I>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SweeperMetrics>
where
    S: CacheStore + ?Sized,
    I: TagIndex + ?Sized,
{
    let metrics = Arc::new(SweeperMetrics::new());

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(interval_secs = every.as_secs(), "Cache sweeper started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache sweeper shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                sweep_once(store.as_ref(), index.as_ref(), &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweeps = snapshot.sweeps,
        purged = snapshot.purged,
        released_tags = snapshot.released_tags,
        errors = snapshot.errors,
        "Cache sweeper stopped"
    );

    metrics
}

async fn sweep_once<S, I>(store: &S, index: &I, metrics: &SweeperMetrics)
where
    S: CacheStore + ?Sized,
    I: TagIndex + ?Sized,
{
    match store.purge_expired(Instant::now()).await {
        Ok(purged) => {
            for (key, entry) in &purged {
                unregister_entry(index, key, &entry.tags).await;
            }
            let purged = purged.len() as u64;
            metrics.purged.fetch_add(purged, Ordering::Relaxed);
            if purged > 0 {
                tracing::debug!(purged, "Purged expired cache entries");
            }
        }
        Err(e) => {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "Cache sweep failed");
        }
    }
    match index.compact().await {
        Ok(released) => {
            metrics
                .released_tags
                .fetch_add(released as u64, Ordering::Relaxed);
        }
        Err(e) => {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "Tag index compaction failed");
        }
    }
    metrics.sweeps.fetch_add(1, Ordering::Relaxed);
}
