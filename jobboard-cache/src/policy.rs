//! Cross-aggregate invalidation policy.
//!
//! One table, keyed by entity kind, says which views a mutation of that kind
//! makes stale. Domain services describe what they changed as a
//! [`Mutation`]; [`tags_for`] turns it into the tag set the invalidator
//! clears. Services never spell tags themselves.

use std::fmt;

use jobboard_core::{EntityKind, EntityRef};

use crate::key::DerivedView;
use crate::tag::Tag;

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
    /// An association between two entities was added (vacancy ↔ skill).
    Linked,
    /// An association between two entities was removed.
    Unlinked,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Created => "created",
            MutationKind::Updated => "updated",
            MutationKind::Deleted => "deleted",
            MutationKind::Linked => "linked",
            MutationKind::Unlinked => "unlinked",
        }
    }

    fn is_association(&self) -> bool {
        matches!(self, MutationKind::Linked | MutationKind::Unlinked)
    }
}

/// A committed write, described in terms the policy understands.
///
/// `related` lists the entities the mutated record points at, before and
/// after the write. A vacancy moved from category 1 to category 2 carries
/// both categories. For [`MutationKind::Linked`] and
/// [`MutationKind::Unlinked`] it lists the other side of the association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub kind: MutationKind,
    pub entity: EntityRef,
    pub related: Vec<EntityRef>,
}

impl Mutation {
    pub fn created(entity: EntityRef) -> Self {
        Self::new(MutationKind::Created, entity)
    }

    pub fn updated(entity: EntityRef) -> Self {
        Self::new(MutationKind::Updated, entity)
    }

    pub fn deleted(entity: EntityRef) -> Self {
        Self::new(MutationKind::Deleted, entity)
    }

    pub fn linked(entity: EntityRef, other: EntityRef) -> Self {
        Self::new(MutationKind::Linked, entity).with_related([other])
    }

    pub fn unlinked(entity: EntityRef, other: EntityRef) -> Self {
        Self::new(MutationKind::Unlinked, entity).with_related([other])
    }

    fn new(kind: MutationKind, entity: EntityRef) -> Self {
        Self {
            kind,
            entity,
            related: Vec::new(),
        }
    }

    pub fn with_related<I>(mut self, related: I) -> Self
    where
        I: IntoIterator<Item = EntityRef>,
    {
        for r in related {
            if !self.related.contains(&r) {
                self.related.push(r);
            }
        }
        self
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.entity)?;
        if self.kind.is_association() {
            for other in &self.related {
                write!(f, " <-> {}", other)?;
            }
        }
        Ok(())
    }
}

/// Which instances of a derived view a kind feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    /// Every instance of the view may change.
    Whole,
    /// Only the instance computed for the mutated entity itself.
    Subject,
}

/// Invalidation rule for one entity kind.
#[derive(Debug)]
pub struct KindRule {
    pub kind: EntityKind,
    /// Related kinds whose filtered lists of `kind` must be dropped when a
    /// record of `kind` pointing at them changes.
    pub related_lists: &'static [EntityKind],
    /// Derived views fed by records of `kind`.
    pub feeds: &'static [(DerivedView, FeedScope)],
}

/// The invalidation table. Kinds not listed only invalidate their own
/// entity and collection tags.
pub static RULES: &[KindRule] = &[
    KindRule {
        kind: EntityKind::Vacancy,
        related_lists: &[
            EntityKind::Skill,
            EntityKind::Company,
            EntityKind::Recruiter,
            EntityKind::Category,
            EntityKind::Location,
        ],
        feeds: &[(DerivedView::Recommendations, FeedScope::Whole)],
    },
    KindRule {
        kind: EntityKind::Profile,
        related_lists: &[EntityKind::Skill, EntityKind::Location],
        feeds: &[(DerivedView::Recommendations, FeedScope::Subject)],
    },
    KindRule {
        kind: EntityKind::Skill,
        related_lists: &[],
        feeds: &[(DerivedView::Recommendations, FeedScope::Whole)],
    },
];

/// Rule for `kind`, if the table has one.
pub fn rule_for(kind: EntityKind) -> Option<&'static KindRule> {
    RULES.iter().find(|rule| rule.kind == kind)
}

/// Every tag a mutation must invalidate, deduplicated, in a stable order.
pub fn tags_for(mutation: &Mutation) -> Vec<Tag> {
    let mut tags = TagSet::default();
    let entity = mutation.entity;
    let rule = rule_for(entity.kind);

    tags.push(Tag::of(entity));
    tags.push(Tag::collection(entity.kind));

    for related in &mutation.related {
        if rule.is_some_and(|r| r.related_lists.contains(&related.kind)) {
            tags.push(Tag::related(entity.kind, *related));
        }
    }

    if mutation.kind.is_association() {
        for other in &mutation.related {
            tags.push(Tag::of(*other));
            tags.push(Tag::collection(other.kind));
            if rule_for(other.kind).is_some_and(|r| r.related_lists.contains(&entity.kind)) {
                tags.push(Tag::related(other.kind, entity));
            }
            push_feeds(&mut tags, *other);
        }
    }

    push_feeds(&mut tags, entity);
    tags.into_vec()
}

fn push_feeds(tags: &mut TagSet, entity: EntityRef) {
    let Some(rule) = rule_for(entity.kind) else {
        return;
    };
    for (view, scope) in rule.feeds {
        match scope {
            FeedScope::Whole => tags.push(Tag::view(*view)),
            FeedScope::Subject => tags.push(Tag::view_subject(*view, entity.id)),
        }
    }
}

#[derive(Default)]
struct TagSet(Vec<Tag>);

impl TagSet {
    fn push(&mut self, tag: Tag) {
        if !self.0.contains(&tag) {
            self.0.push(tag);
        }
    }

    fn into_vec(self) -> Vec<Tag> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(Tag::as_str).collect()
    }

    #[test]
    fn test_vacancy_created_by_recruiter() {
        let mutation = Mutation::created(EntityRef::vacancy(42)).with_related([
            EntityRef::recruiter(7),
            EntityRef::category(3),
        ]);
        assert_eq!(
            names(&tags_for(&mutation)),
            vec![
                "vacancy_42",
                "vacancies",
                "vacancies_recruiter_7",
                "vacancies_category_3",
                "recommendations",
            ]
        );
    }

    #[test]
    fn test_vacancy_skill_link_fans_out_to_both_sides() {
        let mutation = Mutation::linked(EntityRef::vacancy(42), EntityRef::skill(3));
        let tags = tags_for(&mutation);
        assert_eq!(
            names(&tags),
            vec![
                "vacancy_42",
                "vacancies",
                "vacancies_skill_3",
                "skill_3",
                "skills",
                "recommendations",
            ]
        );
    }

    #[test]
    fn test_profile_update_only_touches_own_recommendations() {
        let mutation = Mutation::updated(EntityRef::profile(5));
        let tags = tags_for(&mutation);
        assert!(tags.contains(&Tag::view_subject(DerivedView::Recommendations, 5)));
        assert!(!tags.contains(&Tag::view(DerivedView::Recommendations)));
    }

    #[test]
    fn test_category_rename_is_local() {
        let tags = tags_for(&Mutation::updated(EntityRef::category(7)));
        assert_eq!(names(&tags), vec!["category_7", "categories"]);
    }

    #[test]
    fn test_unlisted_related_kind_is_ignored() {
        // Categories have no related lists, so pointing at a skill adds nothing.
        let mutation = Mutation::updated(EntityRef::category(1)).with_related([EntityRef::skill(2)]);
        assert_eq!(names(&tags_for(&mutation)), vec!["category_1", "categories"]);
    }

    #[test]
    fn test_with_related_deduplicates() {
        let mutation = Mutation::updated(EntityRef::vacancy(1))
            .with_related([EntityRef::category(1), EntityRef::category(1)]);
        assert_eq!(mutation.related.len(), 1);
    }

    #[test]
    fn test_mutation_display() {
        assert_eq!(Mutation::created(EntityRef::vacancy(42)).to_string(), "created vacancy #42");
        assert_eq!(
            Mutation::linked(EntityRef::vacancy(1), EntityRef::skill(2)).to_string(),
            "linked vacancy #1 <-> skill #2"
        );
    }

    #[test]
    fn test_every_rule_kind_is_unique() {
        for (i, a) in RULES.iter().enumerate() {
            for b in &RULES[i + 1..] {
                assert_ne!(a.kind, b.kind);
            }
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use jobboard_test_utils::generators::arb_entity_ref;
    use proptest::prelude::*;

    fn arb_mutation_kind() -> impl Strategy<Value = MutationKind> {
        prop_oneof![
            Just(MutationKind::Created),
            Just(MutationKind::Updated),
            Just(MutationKind::Deleted),
            Just(MutationKind::Linked),
            Just(MutationKind::Unlinked),
        ]
    }

    fn arb_mutation() -> impl Strategy<Value = Mutation> {
        (
            arb_mutation_kind(),
            arb_entity_ref(),
            prop::collection::vec(arb_entity_ref(), 0..4),
        )
            .prop_map(|(kind, entity, related)| Mutation::new(kind, entity).with_related(related))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: every mutation starts with its own entity and collection
        /// tags, and no tag is listed twice.
        #[test]
        fn prop_own_tags_first_and_unique(mutation in arb_mutation()) {
            let tags = tags_for(&mutation);
            prop_assert_eq!(&tags[0], &Tag::of(mutation.entity));
            prop_assert_eq!(&tags[1], &Tag::collection(mutation.entity.kind));
            for (i, tag) in tags.iter().enumerate() {
                prop_assert!(!tags[i + 1..].contains(tag), "{} listed twice", tag);
            }
        }

        /// Property: an association drops the other side's views as well.
        #[test]
        fn prop_association_covers_both_sides(entity in arb_entity_ref(), other in arb_entity_ref()) {
            for mutation in [Mutation::linked(entity, other), Mutation::unlinked(entity, other)] {
                let tags = tags_for(&mutation);
                prop_assert!(tags.contains(&Tag::of(other)));
                prop_assert!(tags.contains(&Tag::collection(other.kind)));
            }
        }
    }
}
