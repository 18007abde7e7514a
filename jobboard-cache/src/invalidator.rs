//! Tag-driven invalidation.
//!
//! Invalidation never fails the mutation that triggered it. Each tag is
//! handled on its own: a tag the index cannot clear is logged and reported,
//! and the remaining tags are still processed. Staleness left behind by a
//! failed tag is bounded by the entry TTL.

use std::sync::Arc;

use jobboard_core::JobBoardError;

use crate::store::CacheStore;
use crate::tag::Tag;
use crate::tag_index::{unregister_entry, TagIndex};

/// Outcome of one invalidation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvalidationReport {
    /// Tags whose generation was advanced.
    pub cleared: Vec<Tag>,
    /// Tags the index could not clear, with the reason.
    pub failed: Vec<(Tag, JobBoardError)>,
    /// Entries physically removed from the store.
    pub removed_entries: u64,
}

impl InvalidationReport {
    /// True if every requested tag was cleared.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drops every entry registered under a set of tags.
pub struct Invalidator<S, I> {
    store: Arc<S>,
    index: Arc<I>,
}

impl<S, I> Invalidator<S, I>
where
    S: CacheStore,
    I: TagIndex,
{
    pub fn new(store: Arc<S>, index: Arc<I>) -> Self {
        Self { store, index }
    }

    /// Clear `tags` in order. `context` names the triggering mutation in
    /// logs.
    ///
    /// Clearing a tag advances its generation before any entry is removed,
    /// so entries left behind by a failed removal are already dead for
    /// readers.
    pub async fn invalidate(&self, tags: &[Tag], context: &str) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        for tag in tags {
            let cleared = match self.index.clear(tag).await {
                Ok(cleared) => cleared,
                Err(e) => {
                    tracing::warn!(
                        tag = %tag,
                        mutation = context,
                        error = %e,
                        "Failed to clear cache tag; affected entries stay until TTL expiry"
                    );
                    report.failed.push((tag.clone(), e));
                    continue;
                }
            };

            for key in &cleared.keys {
                match self.store.remove_stale(key, tag, cleared.generation).await {
                    Ok(Some(removed)) => {
                        report.removed_entries += 1;
                        unregister_entry(self.index.as_ref(), key, &removed.tags).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            tag = %tag,
                            key = %key,
                            mutation = context,
                            error = %e,
                            "Failed to remove invalidated entry"
                        );
                    }
                }
            }

            tracing::debug!(
                tag = %tag,
                generation = cleared.generation,
                keys = cleared.keys.len(),
                mutation = context,
                "Cleared cache tag"
            );
            report.cleared.push(tag.clone());
        }

        report
    }
}
