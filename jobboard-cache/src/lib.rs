//! Jobboard Cache - Read-through caching for job board views
//!
//! Every list, filtered view and single-entity lookup of the job board is
//! served through [`ReadThroughCache`]. Mutations invalidate exactly the
//! views they affect through tags.
//!
//! # Modules
//!
//! - [`key`]: canonical cache keys and the tags each key belongs to
//! - [`tag`]: typed tag builders
//! - [`tag_index`]: tag → key registry with per-tag generations
//! - [`store`]: storage medium for serialized entries
//! - [`read_through`]: `get_or_set` with single-flight loading
//! - [`invalidator`]: per-tag invalidation with a report
//! - [`policy`]: which tags a mutation must invalidate
//! - [`sweeper`]: background purge of expired entries and idle tags
//!
//! # Example
//!
//! ```ignore
//! let cache = Arc::new(ReadThroughCache::in_memory(CacheConfig::from_env())?);
//!
//! let spec = KeySpec::entity(EntityKind::Category, 7);
//! let category: Option<Category> = cache
//!     .get_or_load(&spec, TtlClass::Entity, move || async move { store.category_get(7).await })
//!     .await?;
//!
//! // After a committed write:
//! cache.invalidate(&Mutation::updated(EntityRef::category(7))).await;
//! ```

pub mod config;
pub mod invalidator;
pub mod key;
pub mod policy;
pub mod read_through;
pub mod stats;
pub mod store;
pub mod sweeper;
pub mod tag;
pub mod tag_index;

pub use config::{CacheConfig, TtlClass};
pub use invalidator::{InvalidationReport, Invalidator};
pub use key::{CacheKey, DerivedView, KeySpec};
pub use policy::{tags_for, FeedScope, KindRule, Mutation, MutationKind, RULES};
pub use read_through::ReadThroughCache;
pub use stats::{CacheMetrics, CacheStats};
pub use store::{CacheStore, MemoryStore, Released, StoreUsage, StoredEntry};
pub use sweeper::{sweep_expired_task, SweeperMetrics, SweeperSnapshot};
pub use tag::Tag;
pub use tag_index::{ClearedTag, InMemoryTagIndex, TagIndex, INITIAL_GENERATION};
