//! Jobboard Core - Entity Types
//!
//! Pure data structures shared by the cache and the domain services.
//! This crate contains ONLY data types - no caching or storage logic.

pub mod entities;
pub mod enums;
pub mod error;
pub mod filter;
pub mod identity;

pub use entities::{Category, Profile, Recommendation, Skill, Vacancy, VacancyDraft, VacancyUpdate};
pub use enums::{EmploymentType, EntityKind, ExperienceLevel, VacancyStatus};
pub use error::{
    CacheError, ConfigError, JobBoardError, JobBoardResult, StorageError, ValidationError,
};
pub use filter::{FieldValue, FilterDescriptor, ListFilter, VacancyFilter};
pub use identity::{EntityId, EntityRef, Timestamp};
