//! Identity types for job board entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EntityKind;

/// Primary key of a persisted entity.
/// Rows are keyed by database sequences, so identifiers are plain integers.
pub type EntityId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// A typed pointer to one entity: its kind plus its primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    pub fn vacancy(id: EntityId) -> Self {
        Self::new(EntityKind::Vacancy, id)
    }

    pub fn skill(id: EntityId) -> Self {
        Self::new(EntityKind::Skill, id)
    }

    pub fn category(id: EntityId) -> Self {
        Self::new(EntityKind::Category, id)
    }

    pub fn recruiter(id: EntityId) -> Self {
        Self::new(EntityKind::Recruiter, id)
    }

    pub fn profile(id: EntityId) -> Self {
        Self::new(EntityKind::Profile, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(EntityRef::vacancy(42).to_string(), "vacancy #42");
        assert_eq!(EntityRef::recruiter(7).to_string(), "recruiter #7");
    }

    #[test]
    fn test_entity_ref_ordering_groups_by_kind() {
        let mut refs = vec![EntityRef::skill(1), EntityRef::vacancy(9), EntityRef::vacancy(2)];
        refs.sort();
        assert_eq!(refs[0], EntityRef::vacancy(2));
        assert_eq!(refs[1], EntityRef::vacancy(9));
        assert_eq!(refs[2], EntityRef::skill(1));
    }
}
