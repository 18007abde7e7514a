//! Domain records returned by the entity store and cached by the services.

use serde::{Deserialize, Serialize};

use crate::{EmploymentType, EntityId, ExperienceLevel, Timestamp, VacancyStatus};

/// A job vacancy published by a recruiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vacancy {
    pub vacancy_id: EntityId,
    pub title: String,
    pub description: String,
    pub recruiter_id: EntityId,
    pub company_id: Option<EntityId>,
    pub category_id: Option<EntityId>,
    pub location_id: Option<EntityId>,
    pub status: VacancyStatus,
    pub employment: EmploymentType,
    pub experience: ExperienceLevel,
    pub salary_from: Option<i64>,
    pub salary_to: Option<i64>,
    pub skill_ids: Vec<EntityId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Payload for creating a vacancy. The store assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacancyDraft {
    pub title: String,
    pub description: String,
    pub recruiter_id: EntityId,
    pub company_id: Option<EntityId>,
    pub category_id: Option<EntityId>,
    pub location_id: Option<EntityId>,
    pub employment: EmploymentType,
    pub experience: ExperienceLevel,
    pub salary_from: Option<i64>,
    pub salary_to: Option<i64>,
    pub skill_ids: Vec<EntityId>,
}

impl VacancyDraft {
    /// Minimal published-ready draft; remaining fields can be set directly.
    pub fn new(title: impl Into<String>, recruiter_id: EntityId) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            recruiter_id,
            company_id: None,
            category_id: None,
            location_id: None,
            employment: EmploymentType::FullTime,
            experience: ExperienceLevel::NoExperience,
            salary_from: None,
            salary_to: None,
            skill_ids: Vec::new(),
        }
    }
}

/// Update payload for vacancies. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VacancyUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<VacancyStatus>,
    /// Moving a vacancy between categories changes two category views.
    pub category_id: Option<EntityId>,
    pub location_id: Option<EntityId>,
    pub salary_from: Option<i64>,
    pub salary_to: Option<i64>,
}

/// Vacancy category (e.g. "Backend development").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: EntityId,
    pub name: String,
}

/// A skill that vacancies require and profiles advertise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub skill_id: EntityId,
    pub name: String,
}

/// Applicant profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub profile_id: EntityId,
    pub full_name: String,
    pub location_id: Option<EntityId>,
    pub skill_ids: Vec<EntityId>,
}

/// Ranked vacancies suggested for one profile.
///
/// Produced by the similarity subsystem; the cache treats it as an opaque
/// value living under the recommendations view tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub profile_id: EntityId,
    /// `(vacancy_id, score)` pairs, best match first.
    pub vacancies: Vec<(EntityId, f32)>,
}

impl Recommendation {
    pub fn vacancy_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.vacancies.iter().map(|(id, _)| *id)
    }
}
