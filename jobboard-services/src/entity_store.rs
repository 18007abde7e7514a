//! Entity store interface.
//!
//! The transactional data source behind the cache. Services read through
//! the cache and write here directly; lookups return `None` for "not found"
//! so the cache can memoize absence.

use async_trait::async_trait;
use jobboard_core::{
    Category, EntityId, JobBoardResult, ListFilter, Profile, Skill, Vacancy, VacancyDraft,
    VacancyFilter, VacancyUpdate,
};

/// Repository-style access to job board records.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // === Vacancy Operations ===

    /// Get a vacancy by ID.
    async fn vacancy_get(&self, id: EntityId) -> JobBoardResult<Option<Vacancy>>;

    /// List vacancies matching a filter, newest first, paginated if the
    /// filter asks for it.
    async fn vacancy_list(&self, filter: &VacancyFilter) -> JobBoardResult<Vec<Vacancy>>;

    /// Insert a new vacancy. The store assigns id and timestamps.
    async fn vacancy_insert(&self, draft: VacancyDraft) -> JobBoardResult<Vacancy>;

    /// Apply an update and return the record as it now is.
    async fn vacancy_update(&self, id: EntityId, update: VacancyUpdate) -> JobBoardResult<Vacancy>;

    /// Delete a vacancy, returning it if it existed.
    async fn vacancy_delete(&self, id: EntityId) -> JobBoardResult<Option<Vacancy>>;

    /// Attach a skill to a vacancy. Returns false if it was already attached.
    async fn vacancy_link_skill(&self, vacancy_id: EntityId, skill_id: EntityId) -> JobBoardResult<bool>;

    /// Detach a skill from a vacancy. Returns false if it was not attached.
    async fn vacancy_unlink_skill(&self, vacancy_id: EntityId, skill_id: EntityId)
        -> JobBoardResult<bool>;

    // === Category Operations ===

    async fn category_get(&self, id: EntityId) -> JobBoardResult<Option<Category>>;

    async fn category_list(&self, filter: &ListFilter) -> JobBoardResult<Vec<Category>>;

    async fn category_insert(&self, name: &str) -> JobBoardResult<Category>;

    async fn category_rename(&self, id: EntityId, name: &str) -> JobBoardResult<Category>;

    // === Skill Operations ===

    async fn skill_get(&self, id: EntityId) -> JobBoardResult<Option<Skill>>;

    async fn skill_list(&self, filter: &ListFilter) -> JobBoardResult<Vec<Skill>>;

    async fn skill_insert(&self, name: &str) -> JobBoardResult<Skill>;

    // === Profile Operations ===

    async fn profile_get(&self, id: EntityId) -> JobBoardResult<Option<Profile>>;

    /// Insert or replace a profile.
    async fn profile_upsert(&self, profile: Profile) -> JobBoardResult<Profile>;
}
