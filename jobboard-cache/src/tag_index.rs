//! Tag index: which cache keys were produced under which tag.
//!
//! Backing stores differ in whether they can drop entries by tag natively.
//! The read-through core and the invalidator only talk to [`TagIndex`], so
//! they are written once regardless of what sits behind it.
//!
//! Besides the key sets, every tag carries a generation counter that
//! [`TagIndex::clear`] advances. Entries remember the generations their
//! value was computed under; an entry whose recorded generation no longer
//! matches the index is dead even if it is still physically resident. This is what
//! keeps a computation that raced with an invalidation from resurrecting a
//! stale value.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jobboard_core::JobBoardResult;

use crate::key::CacheKey;
use crate::tag::Tag;

/// Generation of a tag that has never been cleared.
pub const INITIAL_GENERATION: u64 = 0;

/// Result of clearing one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearedTag {
    /// Generation the tag moved to.
    pub generation: u64,
    /// Keys that were registered under the tag before the clear.
    pub keys: HashSet<CacheKey>,
}

/// Tag → keys registry.
///
/// Every method is atomic with respect to other calls on the same tag.
/// A tag's generation never moves backwards, and a clear moves it past
/// every value it reported before.
#[async_trait]
pub trait TagIndex: Send + Sync {
    /// Register `key` under `tag`. Registering the same pair twice is a no-op.
    async fn register(&self, tag: &Tag, key: &CacheKey) -> JobBoardResult<()>;

    /// Forget that `key` is registered under `tag`, once its entry has left
    /// the store. Unknown pairs are ignored.
    async fn unregister(&self, tag: &Tag, key: &CacheKey) -> JobBoardResult<()>;

    /// Snapshot of the keys currently registered under `tag`.
    async fn keys_for(&self, tag: &Tag) -> JobBoardResult<HashSet<CacheKey>>;

    /// Drop the tag's registration set and advance its generation.
    ///
    /// The drained keys are returned from the same atomic step, so a key
    /// registered after the clear is never part of the result.
    async fn clear(&self, tag: &Tag) -> JobBoardResult<ClearedTag>;

    /// Current generation of `tag`.
    async fn generation(&self, tag: &Tag) -> JobBoardResult<u64>;

    /// Current generations of several tags, in order.
    async fn generations(&self, tags: &[Tag]) -> JobBoardResult<Vec<(Tag, u64)>> {
        let mut out = Vec::with_capacity(tags.len());
        for tag in tags {
            out.push((tag.clone(), self.generation(tag).await?));
        }
        Ok(out)
    }

    /// Release bookkeeping held for tags with no registered keys. Returns
    /// how many tags were released.
    async fn compact(&self) -> JobBoardResult<usize> {
        Ok(0)
    }
}

/// Drop `key` from every tag its entry was recorded under.
///
/// Called once the store has let go of the entry. A failure only leaves a
/// registration behind until the next clear of that tag.
pub(crate) async fn unregister_entry<I>(index: &I, key: &CacheKey, tags: &[(Tag, u64)])
where
    I: TagIndex + ?Sized,
{
    for (tag, _) in tags {
        if let Err(e) = index.unregister(tag, key).await {
            tracing::warn!(key = %key, tag = %tag, error = %e, "Failed to unregister cache key");
        }
    }
}

#[derive(Debug)]
struct TagSlot {
    generation: u64,
    keys: HashSet<CacheKey>,
}

impl TagSlot {
    fn at(generation: u64) -> Self {
        Self {
            generation,
            keys: HashSet::new(),
        }
    }
}

/// In-process tag index backed by a sharded concurrent map.
///
/// Locking is per shard, so operations on unrelated tags rarely contend.
///
/// Generations come from one counter shared by all tags. A tag without a
/// slot reports `floor`, which is never below the generation of a slot that
/// was dropped; that is what lets empty slots go without reviving entries a
/// clear already killed. Slots whose key set empties at or below the floor
/// are dropped on the spot. Cleared slots wait for [`TagIndex::compact`],
/// which lifts the floor to the newest generation first.
#[derive(Debug, Default)]
pub struct InMemoryTagIndex {
    tags: DashMap<Tag, TagSlot>,
    clock: AtomicU64,
    floor: AtomicU64,
}

impl InMemoryTagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tags holding a slot.
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Total number of (tag, key) registrations.
    pub fn registration_count(&self) -> usize {
        self.tags.iter().map(|slot| slot.keys.len()).sum()
    }

    fn floor(&self) -> u64 {
        self.floor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagIndex for InMemoryTagIndex {
    async fn register(&self, tag: &Tag, key: &CacheKey) -> JobBoardResult<()> {
        // The floor is read under the shard lock, after any compaction that
        // dropped this tag's previous slot.
        self.tags
            .entry(tag.clone())
            .or_insert_with(|| TagSlot::at(self.floor()))
            .keys
            .insert(key.clone());
        Ok(())
    }

    async fn unregister(&self, tag: &Tag, key: &CacheKey) -> JobBoardResult<()> {
        if let Entry::Occupied(mut slot) = self.tags.entry(tag.clone()) {
            slot.get_mut().keys.remove(key);
            if slot.get().keys.is_empty() && slot.get().generation <= self.floor() {
                slot.remove();
            }
        }
        Ok(())
    }

    async fn keys_for(&self, tag: &Tag) -> JobBoardResult<HashSet<CacheKey>> {
        Ok(self
            .tags
            .get(tag)
            .map(|slot| slot.keys.clone())
            .unwrap_or_default())
    }

    async fn clear(&self, tag: &Tag) -> JobBoardResult<ClearedTag> {
        // The slot is created even for an unknown tag: a computation may
        // already hold the floor generation for it.
        let mut slot = self
            .tags
            .entry(tag.clone())
            .or_insert_with(|| TagSlot::at(self.floor()));
        slot.generation = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ClearedTag {
            generation: slot.generation,
            keys: std::mem::take(&mut slot.keys),
        })
    }

    async fn generation(&self, tag: &Tag) -> JobBoardResult<u64> {
        Ok(match self.tags.get(tag) {
            Some(slot) => slot.generation,
            None => self.floor(),
        })
    }

    async fn compact(&self) -> JobBoardResult<usize> {
        let ceiling = self.clock.load(Ordering::SeqCst);
        self.floor.fetch_max(ceiling, Ordering::SeqCst);

        // A slot cleared after `ceiling` was read is newer than the floor
        // and has to stay.
        let mut released = 0;
        self.tags.retain(|_, slot| {
            let keep = !slot.keys.is_empty() || slot.generation > ceiling;
            if !keep {
                released += 1;
            }
            keep
        });
        if released > 0 {
            tracing::debug!(released, floor = ceiling, "Released empty tag slots");
        }
        Ok(released)
    }
}
