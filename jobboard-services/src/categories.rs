//! Category service.

use std::sync::Arc;

use jobboard_cache::{KeySpec, Mutation, TtlClass};
use jobboard_core::{
    Category, EntityId, EntityKind, EntityRef, JobBoardResult, ListFilter, ValidationError,
};

use crate::entity_store::EntityStore;
use crate::CacheImpl;

/// Cached access to vacancy categories.
pub struct CategoryService {
    cache: Arc<CacheImpl>,
    store: Arc<dyn EntityStore>,
}

impl CategoryService {
    pub fn new(cache: Arc<CacheImpl>, store: Arc<dyn EntityStore>) -> Self {
        Self { cache, store }
    }

    pub async fn get(&self, id: EntityId) -> JobBoardResult<Option<Category>> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_load(
                &KeySpec::entity(EntityKind::Category, id),
                TtlClass::Entity,
                move || async move { store.category_get(id).await },
            )
            .await
    }

    pub async fn list(&self, filter: ListFilter) -> JobBoardResult<Vec<Category>> {
        let spec = KeySpec::filtered(EntityKind::Category, &filter);
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_load(&spec, TtlClass::List, move || async move {
                store.category_list(&filter).await
            })
            .await
    }

    pub async fn all(&self) -> JobBoardResult<Vec<Category>> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_load(
                &KeySpec::collection(EntityKind::Category),
                TtlClass::List,
                move || async move { store.category_list(&ListFilter::new()).await },
            )
            .await
    }

    pub async fn create(&self, name: &str) -> JobBoardResult<Category> {
        let name = validate_name(name)?;
        let category = self.store.category_insert(name).await?;
        self.cache
            .invalidate(&Mutation::created(EntityRef::category(category.category_id)))
            .await;
        Ok(category)
    }

    pub async fn rename(&self, id: EntityId, name: &str) -> JobBoardResult<Category> {
        let name = validate_name(name)?;
        let category = self.store.category_rename(id, name).await?;
        self.cache
            .invalidate(&Mutation::updated(EntityRef::category(id)))
            .await;
        Ok(category)
    }
}

fn validate_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEntityStore;
    use jobboard_cache::CacheConfig;
    use jobboard_test_utils::{assertions, fixtures};

    fn setup() -> (CategoryService, Arc<InMemoryEntityStore>) {
        let store = Arc::new(InMemoryEntityStore::new());
        store.seed_category(fixtures::category(7, "Backend")).unwrap();
        store.seed_category(fixtures::category(8, "Design")).unwrap();
        let cache = Arc::new(CacheImpl::in_memory(CacheConfig::default()).unwrap());
        (CategoryService::new(cache, store.clone()), store)
    }

    #[tokio::test]
    async fn test_rename_refreshes_entity_and_lists() {
        let (service, store) = setup();
        assert_eq!(service.get(7).await.unwrap().unwrap().name, "Backend");
        assert_eq!(service.all().await.unwrap().len(), 2);
        let search = ListFilter::new().with_search("back");
        assert_eq!(service.list(search.clone()).await.unwrap().len(), 1);
        assert_eq!(store.read_count(), 3);

        service.rename(7, " Platform ").await.unwrap();

        assert_eq!(service.get(7).await.unwrap().unwrap().name, "Platform");
        assert!(service.list(search).await.unwrap().is_empty());
        assert_eq!(store.read_count(), 5);
    }

    #[tokio::test]
    async fn test_create_adds_to_collection() {
        let (service, _) = setup();
        assert_eq!(service.all().await.unwrap().len(), 2);
        let created = service.create("Data").await.unwrap();
        assert_eq!(created.category_id, 9);
        assert_eq!(service.all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rejects_blank_and_duplicate_names() {
        let (service, _) = setup();
        assertions::assert_validation_error(&service.create("   ").await);
        assert!(service.create("Design").await.is_err());
        assert!(service.rename(8, "Backend").await.is_err());
        assertions::assert_not_found(&service.rename(99, "Ops").await, EntityKind::Category);
    }
}
