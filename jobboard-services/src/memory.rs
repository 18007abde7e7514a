//! In-memory entity store for tests, demos and local development.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jobboard_core::{
    Category, EntityId, EntityKind, JobBoardResult, ListFilter, Profile, Skill, StorageError,
    Vacancy, VacancyDraft, VacancyFilter, VacancyStatus, VacancyUpdate,
};

use crate::entity_store::EntityStore;

/// Page size used when a filter asks for a page without a size.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Default)]
struct Tables {
    vacancies: BTreeMap<EntityId, Vacancy>,
    categories: BTreeMap<EntityId, Category>,
    skills: BTreeMap<EntityId, Skill>,
    profiles: BTreeMap<EntityId, Profile>,
    last_id: EntityId,
}

impl Tables {
    fn next_id(&mut self) -> EntityId {
        self.last_id += 1;
        self.last_id
    }

    fn observe_id(&mut self, id: EntityId) {
        self.last_id = self.last_id.max(id);
    }
}

/// Entity store backed by process memory.
///
/// Counts reads so tests can tell how often the cache reached the store,
/// and can simulate latency or an outage.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    tables: RwLock<Tables>,
    reads: AtomicU64,
    latency: Option<Duration>,
    unavailable: AtomicBool,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every read by `latency` of tokio time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of read operations served so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn seed_vacancy(&self, vacancy: Vacancy) -> JobBoardResult<()> {
        let mut tables = self.write()?;
        tables.observe_id(vacancy.vacancy_id);
        tables.vacancies.insert(vacancy.vacancy_id, vacancy);
        Ok(())
    }

    pub fn seed_category(&self, category: Category) -> JobBoardResult<()> {
        let mut tables = self.write()?;
        tables.observe_id(category.category_id);
        tables.categories.insert(category.category_id, category);
        Ok(())
    }

    pub fn seed_skill(&self, skill: Skill) -> JobBoardResult<()> {
        let mut tables = self.write()?;
        tables.observe_id(skill.skill_id);
        tables.skills.insert(skill.skill_id, skill);
        Ok(())
    }

    pub fn seed_profile(&self, profile: Profile) -> JobBoardResult<()> {
        let mut tables = self.write()?;
        tables.observe_id(profile.profile_id);
        tables.profiles.insert(profile.profile_id, profile);
        Ok(())
    }

    fn check_available(&self) -> JobBoardResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "entity store marked unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn begin_read(&self) -> JobBoardResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self) -> JobBoardResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    fn write(&self) -> JobBoardResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StorageError::LockPoisoned.into())
    }
}

fn not_found(kind: EntityKind, id: EntityId) -> StorageError {
    StorageError::NotFound { kind, id }
}

/// Case-insensitive substring match; blank search matches everything.
fn matches_search(search: Option<&str>, haystacks: &[&str]) -> bool {
    match search.map(str::trim) {
        Some(needle) if !needle.is_empty() => {
            let needle = needle.to_lowercase();
            haystacks
                .iter()
                .any(|text| text.to_lowercase().contains(&needle))
        }
        _ => true,
    }
}

fn matches_vacancy(vacancy: &Vacancy, filter: &VacancyFilter) -> bool {
    fn eq<T: PartialEq>(wanted: Option<T>, actual: T) -> bool {
        wanted.map_or(true, |w| w == actual)
    }

    matches_search(
        filter.search.as_deref(),
        &[vacancy.title.as_str(), vacancy.description.as_str()],
    ) && eq(filter.status, vacancy.status)
        && eq(filter.employment, vacancy.employment)
        && eq(filter.experience, vacancy.experience)
        && eq(filter.recruiter_id, vacancy.recruiter_id)
        && filter.company_id.map_or(true, |id| vacancy.company_id == Some(id))
        && filter.category_id.map_or(true, |id| vacancy.category_id == Some(id))
        && filter.location_id.map_or(true, |id| vacancy.location_id == Some(id))
        && filter.skill_id.map_or(true, |id| vacancy.skill_ids.contains(&id))
}

/// Apply 1-based pagination. Without page and size, everything is returned.
fn paginate<T>(items: Vec<T>, page: Option<u32>, page_size: Option<u32>) -> Vec<T> {
    if page.is_none() && page_size.is_none() {
        return items;
    }
    let size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1) as usize;
    let page = page.unwrap_or(1).max(1) as usize;
    items
        .into_iter()
        .skip((page - 1).saturating_mul(size))
        .take(size)
        .collect()
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn vacancy_get(&self, id: EntityId) -> JobBoardResult<Option<Vacancy>> {
        self.begin_read().await?;
        Ok(self.read()?.vacancies.get(&id).cloned())
    }

    async fn vacancy_list(&self, filter: &VacancyFilter) -> JobBoardResult<Vec<Vacancy>> {
        self.begin_read().await?;
        let matching: Vec<Vacancy> = self
            .read()?
            .vacancies
            .values()
            .rev()
            .filter(|v| matches_vacancy(v, filter))
            .cloned()
            .collect();
        Ok(paginate(matching, filter.page, filter.page_size))
    }

    async fn vacancy_insert(&self, draft: VacancyDraft) -> JobBoardResult<Vacancy> {
        self.check_available()?;
        let mut tables = self.write()?;
        let now = Utc::now();
        let vacancy = Vacancy {
            vacancy_id: tables.next_id(),
            title: draft.title,
            description: draft.description,
            recruiter_id: draft.recruiter_id,
            company_id: draft.company_id,
            category_id: draft.category_id,
            location_id: draft.location_id,
            status: VacancyStatus::Published,
            employment: draft.employment,
            experience: draft.experience,
            salary_from: draft.salary_from,
            salary_to: draft.salary_to,
            skill_ids: draft.skill_ids,
            created_at: now,
            updated_at: now,
        };
        tables.vacancies.insert(vacancy.vacancy_id, vacancy.clone());
        Ok(vacancy)
    }

    async fn vacancy_update(&self, id: EntityId, update: VacancyUpdate) -> JobBoardResult<Vacancy> {
        self.check_available()?;
        let mut tables = self.write()?;
        let vacancy = tables
            .vacancies
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Vacancy, id))?;

        if let Some(title) = update.title {
            vacancy.title = title;
        }
        if let Some(description) = update.description {
            vacancy.description = description;
        }
        if let Some(status) = update.status {
            vacancy.status = status;
        }
        if let Some(category_id) = update.category_id {
            vacancy.category_id = Some(category_id);
        }
        if let Some(location_id) = update.location_id {
            vacancy.location_id = Some(location_id);
        }
        if let Some(salary_from) = update.salary_from {
            vacancy.salary_from = Some(salary_from);
        }
        if let Some(salary_to) = update.salary_to {
            vacancy.salary_to = Some(salary_to);
        }
        vacancy.updated_at = Utc::now();

        Ok(vacancy.clone())
    }

    async fn vacancy_delete(&self, id: EntityId) -> JobBoardResult<Option<Vacancy>> {
        self.check_available()?;
        Ok(self.write()?.vacancies.remove(&id))
    }

    async fn vacancy_link_skill(&self, vacancy_id: EntityId, skill_id: EntityId) -> JobBoardResult<bool> {
        self.check_available()?;
        let mut tables = self.write()?;
        if !tables.skills.contains_key(&skill_id) {
            return Err(not_found(EntityKind::Skill, skill_id).into());
        }
        let vacancy = tables
            .vacancies
            .get_mut(&vacancy_id)
            .ok_or_else(|| not_found(EntityKind::Vacancy, vacancy_id))?;
        if vacancy.skill_ids.contains(&skill_id) {
            return Ok(false);
        }
        vacancy.skill_ids.push(skill_id);
        vacancy.updated_at = Utc::now();
        Ok(true)
    }

    async fn vacancy_unlink_skill(
        &self,
        vacancy_id: EntityId,
        skill_id: EntityId,
    ) -> JobBoardResult<bool> {
        self.check_available()?;
        let mut tables = self.write()?;
        let vacancy = tables
            .vacancies
            .get_mut(&vacancy_id)
            .ok_or_else(|| not_found(EntityKind::Vacancy, vacancy_id))?;
        let before = vacancy.skill_ids.len();
        vacancy.skill_ids.retain(|id| *id != skill_id);
        let removed = vacancy.skill_ids.len() != before;
        if removed {
            vacancy.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn category_get(&self, id: EntityId) -> JobBoardResult<Option<Category>> {
        self.begin_read().await?;
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn category_list(&self, filter: &ListFilter) -> JobBoardResult<Vec<Category>> {
        self.begin_read().await?;
        let matching: Vec<Category> = self
            .read()?
            .categories
            .values()
            .filter(|c| matches_search(filter.search.as_deref(), &[c.name.as_str()]))
            .cloned()
            .collect();
        Ok(paginate(matching, filter.page, filter.page_size))
    }

    async fn category_insert(&self, name: &str) -> JobBoardResult<Category> {
        self.check_available()?;
        let mut tables = self.write()?;
        if tables.categories.values().any(|c| c.name == name) {
            return Err(StorageError::InsertFailed {
                kind: EntityKind::Category,
                reason: format!("category '{}' already exists", name),
            }
            .into());
        }
        let category = Category {
            category_id: tables.next_id(),
            name: name.to_string(),
        };
        tables.categories.insert(category.category_id, category.clone());
        Ok(category)
    }

    async fn category_rename(&self, id: EntityId, name: &str) -> JobBoardResult<Category> {
        self.check_available()?;
        let mut tables = self.write()?;
        if tables
            .categories
            .values()
            .any(|c| c.category_id != id && c.name == name)
        {
            return Err(StorageError::UpdateFailed {
                kind: EntityKind::Category,
                id,
                reason: format!("category '{}' already exists", name),
            }
            .into());
        }
        let category = tables
            .categories
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Category, id))?;
        category.name = name.to_string();
        Ok(category.clone())
    }

    async fn skill_get(&self, id: EntityId) -> JobBoardResult<Option<Skill>> {
        self.begin_read().await?;
        Ok(self.read()?.skills.get(&id).cloned())
    }

    async fn skill_list(&self, filter: &ListFilter) -> JobBoardResult<Vec<Skill>> {
        self.begin_read().await?;
        let matching: Vec<Skill> = self
            .read()?
            .skills
            .values()
            .filter(|s| matches_search(filter.search.as_deref(), &[s.name.as_str()]))
            .cloned()
            .collect();
        Ok(paginate(matching, filter.page, filter.page_size))
    }

    async fn skill_insert(&self, name: &str) -> JobBoardResult<Skill> {
        self.check_available()?;
        let mut tables = self.write()?;
        if tables.skills.values().any(|s| s.name.eq_ignore_ascii_case(name)) {
            return Err(StorageError::InsertFailed {
                kind: EntityKind::Skill,
                reason: format!("skill '{}' already exists", name),
            }
            .into());
        }
        let skill = Skill {
            skill_id: tables.next_id(),
            name: name.to_string(),
        };
        tables.skills.insert(skill.skill_id, skill.clone());
        Ok(skill)
    }

    async fn profile_get(&self, id: EntityId) -> JobBoardResult<Option<Profile>> {
        self.begin_read().await?;
        Ok(self.read()?.profiles.get(&id).cloned())
    }

    async fn profile_upsert(&self, profile: Profile) -> JobBoardResult<Profile> {
        self.check_available()?;
        let mut tables = self.write()?;
        tables.observe_id(profile.profile_id);
        tables.profiles.insert(profile.profile_id, profile.clone());
        Ok(profile)
    }
}
