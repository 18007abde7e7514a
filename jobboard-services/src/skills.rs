//! Skill service.

use std::sync::Arc;

use jobboard_cache::{KeySpec, Mutation, TtlClass};
use jobboard_core::{EntityId, EntityKind, EntityRef, JobBoardResult, ListFilter, Skill, ValidationError};

use crate::entity_store::EntityStore;
use crate::CacheImpl;

/// Cached access to the skill catalog.
pub struct SkillService {
    cache: Arc<CacheImpl>,
    store: Arc<dyn EntityStore>,
}

impl SkillService {
    pub fn new(cache: Arc<CacheImpl>, store: Arc<dyn EntityStore>) -> Self {
        Self { cache, store }
    }

    pub async fn get(&self, id: EntityId) -> JobBoardResult<Option<Skill>> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_load(
                &KeySpec::entity(EntityKind::Skill, id),
                TtlClass::Entity,
                move || async move { store.skill_get(id).await },
            )
            .await
    }

    pub async fn list(&self, filter: ListFilter) -> JobBoardResult<Vec<Skill>> {
        let spec = KeySpec::filtered(EntityKind::Skill, &filter);
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_load(&spec, TtlClass::List, move || async move {
                store.skill_list(&filter).await
            })
            .await
    }

    /// Add a skill. New skills can change every recommendation.
    pub async fn create(&self, name: &str) -> JobBoardResult<Skill> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            }
            .into());
        }
        let skill = self.store.skill_insert(name).await?;
        self.cache
            .invalidate(&Mutation::created(EntityRef::skill(skill.skill_id)))
            .await;
        Ok(skill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEntityStore;
    use jobboard_cache::CacheConfig;
    use jobboard_test_utils::{assertions, fixtures};

    #[tokio::test]
    async fn test_create_drops_skill_lists() {
        let store = Arc::new(InMemoryEntityStore::new());
        store.seed_skill(fixtures::skill(1, "Rust")).unwrap();
        let cache = Arc::new(CacheImpl::in_memory(CacheConfig::default()).unwrap());
        let service = SkillService::new(cache, store.clone());

        let page = ListFilter::new().with_page(1, 10);
        assert_eq!(service.list(page.clone()).await.unwrap().len(), 1);
        assert_eq!(service.get(1).await.unwrap().unwrap().name, "Rust");

        let created = service.create("Go").await.unwrap();
        assert_eq!(created.skill_id, 2);

        let names: Vec<_> = service
            .list(page)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Rust", "Go"]);
        // The entity entry for skill 1 is untouched.
        service.get(1).await.unwrap();
        assert_eq!(store.read_count(), 3);

        assertions::assert_validation_error(&service.create("").await);
        assert!(service.create("rust").await.is_err());
    }
}
