//! Enum types for job board entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a persisted entity.
///
/// The lowercase singular and plural spellings returned by [`EntityKind::as_str`]
/// and [`EntityKind::plural`] are part of the cache key and tag space, so
/// they must never change for an existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Vacancy,
    Profile,
    Recruiter,
    Company,
    Skill,
    Category,
    Location,
    Chat,
    Message,
}

impl EntityKind {
    /// Every kind, in declaration order.
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Vacancy,
        EntityKind::Profile,
        EntityKind::Recruiter,
        EntityKind::Company,
        EntityKind::Skill,
        EntityKind::Category,
        EntityKind::Location,
        EntityKind::Chat,
        EntityKind::Message,
    ];

    /// Singular lowercase spelling, used for single-entity keys and tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Vacancy => "vacancy",
            EntityKind::Profile => "profile",
            EntityKind::Recruiter => "recruiter",
            EntityKind::Company => "company",
            EntityKind::Skill => "skill",
            EntityKind::Category => "category",
            EntityKind::Location => "location",
            EntityKind::Chat => "chat",
            EntityKind::Message => "message",
        }
    }

    /// Plural lowercase spelling, used for collection keys and tags.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Vacancy => "vacancies",
            EntityKind::Profile => "profiles",
            EntityKind::Recruiter => "recruiters",
            EntityKind::Company => "companies",
            EntityKind::Skill => "skills",
            EntityKind::Category => "categories",
            EntityKind::Location => "locations",
            EntityKind::Chat => "chats",
            EntityKind::Message => "messages",
        }
    }
}

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_token(s);
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized || kind.plural() == normalized)
            .ok_or_else(|| format!("Invalid EntityKind: {}", s))
    }
}

/// Publication state of a vacancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VacancyStatus {
    Draft,
    Published,
    Archived,
}

impl VacancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VacancyStatus::Draft => "draft",
            VacancyStatus::Published => "published",
            VacancyStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for VacancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VacancyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "draft" => Ok(VacancyStatus::Draft),
            "published" => Ok(VacancyStatus::Published),
            "archived" => Ok(VacancyStatus::Archived),
            _ => Err(format!("Invalid VacancyStatus: {}", s)),
        }
    }
}

/// Employment type offered by a vacancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full_time",
            EmploymentType::PartTime => "part_time",
            EmploymentType::Contract => "contract",
            EmploymentType::Internship => "internship",
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmploymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "fulltime" => Ok(EmploymentType::FullTime),
            "parttime" => Ok(EmploymentType::PartTime),
            "contract" => Ok(EmploymentType::Contract),
            "internship" => Ok(EmploymentType::Internship),
            _ => Err(format!("Invalid EmploymentType: {}", s)),
        }
    }
}

/// Required experience level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    NoExperience,
    Junior,
    Middle,
    Senior,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::NoExperience => "no_experience",
            ExperienceLevel::Junior => "junior",
            ExperienceLevel::Middle => "middle",
            ExperienceLevel::Senior => "senior",
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "noexperience" => Ok(ExperienceLevel::NoExperience),
            "junior" => Ok(ExperienceLevel::Junior),
            "middle" => Ok(ExperienceLevel::Middle),
            "senior" => Ok(ExperienceLevel::Senior),
            _ => Err(format!("Invalid ExperienceLevel: {}", s)),
        }
    }
}
