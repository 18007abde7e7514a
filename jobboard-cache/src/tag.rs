//! Typed tag names.
//!
//! Tags are only ever spelled here. Domain services and the invalidation
//! policy build them through these constructors so a read and the mutation
//! that must invalidate it always agree on the string.

use std::fmt;

use jobboard_core::{EntityId, EntityKind, EntityRef};

use crate::key::DerivedView;

/// Invalidation group label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// One entity: `vacancy_42`.
    pub fn entity(kind: EntityKind, id: EntityId) -> Self {
        Self(format!("{}_{}", kind.as_str(), id))
    }

    /// Shorthand for [`Tag::entity`] from a reference.
    pub fn of(entity: EntityRef) -> Self {
        Self::entity(entity.kind, entity.id)
    }

    /// Every list of a kind: `vacancies`.
    pub fn collection(kind: EntityKind) -> Self {
        Self(kind.plural().to_string())
    }

    /// Lists of `kind` pinned to one related entity: `vacancies_recruiter_7`.
    pub fn related(kind: EntityKind, related: EntityRef) -> Self {
        Self(format!(
            "{}_{}_{}",
            kind.plural(),
            related.kind.as_str(),
            related.id
        ))
    }

    /// Every instance of a derived view: `recommendations`.
    pub fn view(view: DerivedView) -> Self {
        Self(view.as_str().to_string())
    }

    /// The instance of a derived view computed for one subject:
    /// `recommendations_profile_5`.
    pub fn view_subject(view: DerivedView, subject_id: EntityId) -> Self {
        Self(format!(
            "{}_{}_{}",
            view.as_str(),
            view.subject().as_str(),
            subject_id
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
