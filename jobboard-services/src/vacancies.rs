//! Vacancy service.
//!
//! Reads go through the shared cache; writes go to the entity store first
//! and then invalidate what they changed. Related references are collected
//! from the record before and after the write so that moving a vacancy
//! between categories drops both category lists.

use std::sync::Arc;

use jobboard_cache::{KeySpec, Mutation, TtlClass};
use jobboard_core::{
    EntityId, EntityKind, EntityRef, JobBoardResult, StorageError, ValidationError, Vacancy,
    VacancyDraft, VacancyFilter, VacancyUpdate,
};

use crate::entity_store::EntityStore;
use crate::CacheImpl;

/// Cached access to vacancies.
pub struct VacancyService {
    cache: Arc<CacheImpl>,
    store: Arc<dyn EntityStore>,
}

impl VacancyService {
    pub fn new(cache: Arc<CacheImpl>, store: Arc<dyn EntityStore>) -> Self {
        Self { cache, store }
    }

    /// One vacancy by id. Absence is cached like any other value.
    pub async fn get(&self, id: EntityId) -> JobBoardResult<Option<Vacancy>> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_load(
                &KeySpec::entity(EntityKind::Vacancy, id),
                TtlClass::Entity,
                move || async move { store.vacancy_get(id).await },
            )
            .await
    }

    /// Filtered, paginated vacancies.
    pub async fn list(&self, filter: VacancyFilter) -> JobBoardResult<Vec<Vacancy>> {
        let spec = KeySpec::filtered(EntityKind::Vacancy, &filter);
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_load(&spec, TtlClass::List, move || async move {
                store.vacancy_list(&filter).await
            })
            .await
    }

    /// Every vacancy, newest first.
    pub async fn all(&self) -> JobBoardResult<Vec<Vacancy>> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_load(
                &KeySpec::collection(EntityKind::Vacancy),
                TtlClass::List,
                move || async move { store.vacancy_list(&VacancyFilter::new()).await },
            )
            .await
    }

    /// A recruiter's vacancies, one page at a time.
    pub async fn by_recruiter(
        &self,
        recruiter_id: EntityId,
        page: u32,
        page_size: u32,
    ) -> JobBoardResult<Vec<Vacancy>> {
        self.list(
            VacancyFilter::new()
                .with_recruiter(recruiter_id)
                .with_page(page, page_size),
        )
        .await
    }

    pub async fn create(&self, draft: VacancyDraft) -> JobBoardResult<Vacancy> {
        validate_title(&draft.title)?;
        validate_salary(draft.salary_from, draft.salary_to)?;

        let vacancy = self.store.vacancy_insert(draft).await?;
        let report = self
            .cache
            .invalidate(
                &Mutation::created(EntityRef::vacancy(vacancy.vacancy_id))
                    .with_related(related_refs(&vacancy)),
            )
            .await;

        tracing::debug!(
            vacancy_id = vacancy.vacancy_id,
            removed = report.removed_entries,
            "Vacancy created"
        );
        Ok(vacancy)
    }

    pub async fn update(&self, id: EntityId, update: VacancyUpdate) -> JobBoardResult<Vacancy> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        let before = self.store.vacancy_get(id).await?.ok_or(StorageError::NotFound {
            kind: EntityKind::Vacancy,
            id,
        })?;
        validate_salary(
            update.salary_from.or(before.salary_from),
            update.salary_to.or(before.salary_to),
        )?;

        let after = self.store.vacancy_update(id, update).await?;
        self.cache
            .invalidate(
                &Mutation::updated(EntityRef::vacancy(id))
                    .with_related(related_refs(&before))
                    .with_related(related_refs(&after)),
            )
            .await;
        Ok(after)
    }

    /// Delete a vacancy. Returns false if it did not exist.
    pub async fn delete(&self, id: EntityId) -> JobBoardResult<bool> {
        let Some(removed) = self.store.vacancy_delete(id).await? else {
            return Ok(false);
        };
        self.cache
            .invalidate(&Mutation::deleted(EntityRef::vacancy(id)).with_related(related_refs(&removed)))
            .await;
        Ok(true)
    }

    /// Attach a skill. Returns false if it was already attached.
    pub async fn attach_skill(&self, vacancy_id: EntityId, skill_id: EntityId) -> JobBoardResult<bool> {
        let linked = self.store.vacancy_link_skill(vacancy_id, skill_id).await?;
        if linked {
            self.cache
                .invalidate(&Mutation::linked(
                    EntityRef::vacancy(vacancy_id),
                    EntityRef::skill(skill_id),
                ))
                .await;
        }
        Ok(linked)
    }

    /// Detach a skill. Returns false if it was not attached.
    pub async fn detach_skill(&self, vacancy_id: EntityId, skill_id: EntityId) -> JobBoardResult<bool> {
        let unlinked = self.store.vacancy_unlink_skill(vacancy_id, skill_id).await?;
        if unlinked {
            self.cache
                .invalidate(&Mutation::unlinked(
                    EntityRef::vacancy(vacancy_id),
                    EntityRef::skill(skill_id),
                ))
                .await;
        }
        Ok(unlinked)
    }
}

/// Entities a vacancy points at.
fn related_refs(vacancy: &Vacancy) -> Vec<EntityRef> {
    let mut refs = vec![EntityRef::recruiter(vacancy.recruiter_id)];
    refs.extend(vacancy.company_id.map(|id| EntityRef::new(EntityKind::Company, id)));
    refs.extend(vacancy.category_id.map(EntityRef::category));
    refs.extend(vacancy.location_id.map(|id| EntityRef::new(EntityKind::Location, id)));
    refs.extend(vacancy.skill_ids.iter().copied().map(EntityRef::skill));
    refs
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        });
    }
    Ok(())
}

fn validate_salary(from: Option<i64>, to: Option<i64>) -> Result<(), ValidationError> {
    for (field, value) in [("salary_from", from), ("salary_to", to)] {
        if let Some(value) = value.filter(|v| *v < 0) {
            return Err(ValidationError::InvalidFieldValue {
                field: field.to_string(),
                value: value.to_string(),
                reason: "must not be negative".to_string(),
            });
        }
    }
    if let (Some(from), Some(to)) = (from, to) {
        if to < from {
            return Err(ValidationError::InvalidFieldValue {
                field: "salary_to".to_string(),
                value: to.to_string(),
                reason: format!("must not be below salary_from ({})", from),
            });
        }
    }
    Ok(())
}
