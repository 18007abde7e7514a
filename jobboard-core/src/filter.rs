//! Filter and pagination descriptors for list views.
//!
//! A descriptor lists every one of its fields in a fixed order, including
//! the ones the caller left unset. The cache key codec relies on that order
//! to give logically identical queries identical keys.

use serde::{Deserialize, Serialize};

use crate::{EmploymentType, EntityId, EntityKind, EntityRef, ExperienceLevel, VacancyStatus};

/// One field of a filter descriptor, as seen by the key codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// Field not set by the caller.
    Absent,
    /// Numeric value (ids, page numbers).
    Int(i64),
    /// Closed-set value such as an enum facet; never contains separators.
    Token(&'static str),
    /// Free text supplied by a user; escaped by the codec.
    Text(String),
}

impl FieldValue {
    fn from_id(id: Option<EntityId>) -> Self {
        id.map(FieldValue::Int).unwrap_or(FieldValue::Absent)
    }

    fn from_u32(value: Option<u32>) -> Self {
        value
            .map(|v| FieldValue::Int(i64::from(v)))
            .unwrap_or(FieldValue::Absent)
    }

    /// Blank or whitespace-only search text means "no search".
    fn from_search(search: Option<&str>) -> Self {
        match search.map(str::trim) {
            Some(text) if !text.is_empty() => FieldValue::Text(text.to_string()),
            _ => FieldValue::Absent,
        }
    }
}

/// A list query whose every field can be enumerated in a stable order.
pub trait FilterDescriptor {
    /// All fields, set or not, in the documented order.
    fn fields(&self) -> Vec<(&'static str, FieldValue)>;

    /// Related entities this filter pins (e.g. a recruiter or skill id).
    /// Lists built from such a filter must be invalidated when those
    /// relationships change.
    fn pinned(&self) -> Vec<EntityRef>;
}

/// Generic search + pagination filter for simple collections.
///
/// Field order: `page`, `size`, `q`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }
}

impl FilterDescriptor for ListFilter {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("page", FieldValue::from_u32(self.page)),
            ("size", FieldValue::from_u32(self.page_size)),
            ("q", FieldValue::from_search(self.search.as_deref())),
        ]
    }

    fn pinned(&self) -> Vec<EntityRef> {
        Vec::new()
    }
}

/// Vacancy search filter.
///
/// Field order: `page`, `size`, `skill`, `q`, `status`, `employment`,
/// `experience`, `company`, `recruiter`, `category`, `location`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancyFilter {
    pub search: Option<String>,
    pub status: Option<VacancyStatus>,
    pub employment: Option<EmploymentType>,
    pub experience: Option<ExperienceLevel>,
    pub company_id: Option<EntityId>,
    pub recruiter_id: Option<EntityId>,
    pub category_id: Option<EntityId>,
    pub location_id: Option<EntityId>,
    pub skill_id: Option<EntityId>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl VacancyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_status(mut self, status: VacancyStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_employment(mut self, employment: EmploymentType) -> Self {
        self.employment = Some(employment);
        self
    }

    pub fn with_experience(mut self, experience: ExperienceLevel) -> Self {
        self.experience = Some(experience);
        self
    }

    pub fn with_company(mut self, company_id: EntityId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_recruiter(mut self, recruiter_id: EntityId) -> Self {
        self.recruiter_id = Some(recruiter_id);
        self
    }

    pub fn with_category(mut self, category_id: EntityId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_location(mut self, location_id: EntityId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn with_skill(mut self, skill_id: EntityId) -> Self {
        self.skill_id = Some(skill_id);
        self
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }
}

impl FilterDescriptor for VacancyFilter {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        let token = |value: Option<&'static str>| value.map(FieldValue::Token).unwrap_or(FieldValue::Absent);
        vec![
            ("page", FieldValue::from_u32(self.page)),
            ("size", FieldValue::from_u32(self.page_size)),
            ("skill", FieldValue::from_id(self.skill_id)),
            ("q", FieldValue::from_search(self.search.as_deref())),
            ("status", token(self.status.map(|s| s.as_str()))),
            ("employment", token(self.employment.map(|e| e.as_str()))),
            ("experience", token(self.experience.map(|e| e.as_str()))),
            ("company", FieldValue::from_id(self.company_id)),
            ("recruiter", FieldValue::from_id(self.recruiter_id)),
            ("category", FieldValue::from_id(self.category_id)),
            ("location", FieldValue::from_id(self.location_id)),
        ]
    }

    fn pinned(&self) -> Vec<EntityRef> {
        [
            (EntityKind::Skill, self.skill_id),
            (EntityKind::Company, self.company_id),
            (EntityKind::Recruiter, self.recruiter_id),
            (EntityKind::Category, self.category_id),
            (EntityKind::Location, self.location_id),
        ]
        .into_iter()
        .filter_map(|(kind, id)| id.map(|id| EntityRef::new(kind, id)))
        .collect()
    }
}
