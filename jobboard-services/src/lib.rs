//! Jobboard Services - Cached domain services
//!
//! Each service reads through the shared [`ReadThroughCache`] and writes to
//! an [`EntityStore`], describing every committed write as a
//! [`jobboard_cache::Mutation`] so the cache can drop what it made stale.
//!
//! ```ignore
//! let cache = Arc::new(CacheImpl::in_memory(config.cache.clone())?);
//! let store: Arc<dyn EntityStore> = Arc::new(InMemoryEntityStore::new());
//! let vacancies = VacancyService::new(Arc::clone(&cache), Arc::clone(&store));
//! let page = vacancies.by_recruiter(7, 1, 20).await?;
//! ```

pub mod categories;
pub mod config;
pub mod entity_store;
pub mod memory;
pub mod profiles;
pub mod recommender;
pub mod skills;
pub mod telemetry;
pub mod vacancies;

use std::sync::Arc;

use jobboard_cache::{InMemoryTagIndex, MemoryStore, ReadThroughCache};
use jobboard_core::JobBoardResult;

pub use categories::CategoryService;
pub use config::ServiceConfig;
pub use entity_store::EntityStore;
pub use memory::InMemoryEntityStore;
pub use profiles::{ProfileService, RecommendationService};
pub use recommender::{Recommender, SkillOverlapRecommender, DEFAULT_RECOMMENDATION_LIMIT};
pub use skills::SkillService;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
pub use vacancies::VacancyService;

/// Concrete cache shared by the services.
pub type CacheImpl = ReadThroughCache<MemoryStore, InMemoryTagIndex>;

/// Every service over one cache and one entity store.
pub struct JobBoard {
    pub cache: Arc<CacheImpl>,
    pub vacancies: VacancyService,
    pub categories: CategoryService,
    pub skills: SkillService,
    pub profiles: ProfileService,
    pub recommendations: RecommendationService,
}

impl JobBoard {
    /// Wire the services over `store` with an in-memory cache.
    ///
    /// Fails if `config` does not pass [`ServiceConfig::validate`].
    pub fn in_memory(config: &ServiceConfig, store: Arc<dyn EntityStore>) -> JobBoardResult<Self> {
        config.validate()?;
        let cache = Arc::new(CacheImpl::in_memory(config.cache.clone())?);
        let recommender = Arc::new(SkillOverlapRecommender::new(
            Arc::clone(&store),
            config.recommendation_limit,
        ));
        Ok(Self {
            vacancies: VacancyService::new(Arc::clone(&cache), Arc::clone(&store)),
            categories: CategoryService::new(Arc::clone(&cache), Arc::clone(&store)),
            skills: SkillService::new(Arc::clone(&cache), Arc::clone(&store)),
            profiles: ProfileService::new(Arc::clone(&cache), Arc::clone(&store)),
            recommendations: RecommendationService::new(Arc::clone(&cache), store, recommender),
            cache,
        })
    }
}
