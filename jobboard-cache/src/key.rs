//! Cache key codec.
//!
//! A [`CacheKey`] can only be produced from a [`KeySpec`], so every key in
//! the cache comes out of the same deterministic encoding.
//!
//! # Key format
//!
//! | Spec                          | Key                                        |
//! |-------------------------------|--------------------------------------------|
//! | single entity                 | `category_7`                               |
//! | whole collection              | `vacancies`                                |
//! | filtered / paginated list     | `vacancies:page=1:size=5:skill=:q=...`     |
//! | derived view for one subject  | `recommendations:profile=5`                |
//!
//! Filter fields are written in the order their [`FilterDescriptor`] lists
//! them. Unset fields are written with an empty value rather than omitted.
//! Inside free text, `:` and `\` are escaped with a leading `\`.

use std::fmt;

use jobboard_core::{EntityId, EntityKind, EntityRef, FieldValue, FilterDescriptor};

use crate::tag::Tag;

/// Separator between key segments.
const SEPARATOR: char = ':';
/// Separator between a field name and its value.
const ASSIGN: char = '=';
/// Escape character for free-text values.
const ESCAPE: char = '\\';

/// A computed view that is not a plain entity collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedView {
    /// Vacancies ranked for a profile by the similarity subsystem.
    Recommendations,
}

impl DerivedView {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedView::Recommendations => "recommendations",
        }
    }

    /// Kind of the entity a single view instance is computed for.
    pub fn subject(&self) -> EntityKind {
        match self {
            DerivedView::Recommendations => EntityKind::Profile,
        }
    }
}

impl fmt::Display for DerivedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What family of values a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeySpace {
    Entity(EntityKind),
    View(DerivedView),
}

/// Which slice of the key space is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Qualifier {
    Id(EntityId),
    Collection,
    Filter {
        fields: Vec<(&'static str, FieldValue)>,
        pinned: Vec<EntityRef>,
    },
}

/// Logical description of a cached value: enough to derive both its key and
/// the tags it has to be registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySpec {
    space: KeySpace,
    qualifier: Qualifier,
}

impl KeySpec {
    /// A single entity looked up by primary key.
    pub fn entity(kind: EntityKind, id: EntityId) -> Self {
        Self {
            space: KeySpace::Entity(kind),
            qualifier: Qualifier::Id(id),
        }
    }

    /// The unfiltered collection of an entity kind.
    pub fn collection(kind: EntityKind) -> Self {
        Self {
            space: KeySpace::Entity(kind),
            qualifier: Qualifier::Collection,
        }
    }

    /// A filtered or paginated list of an entity kind.
    pub fn filtered<F: FilterDescriptor>(kind: EntityKind, filter: &F) -> Self {
        Self {
            space: KeySpace::Entity(kind),
            qualifier: Qualifier::Filter {
                fields: filter.fields(),
                pinned: filter.pinned(),
            },
        }
    }

    /// A derived view computed for one subject (e.g. one profile's
    /// recommendations).
    pub fn view(view: DerivedView, subject_id: EntityId) -> Self {
        Self {
            space: KeySpace::View(view),
            qualifier: Qualifier::Id(subject_id),
        }
    }

    /// Encode the canonical key.
    pub fn key(&self) -> CacheKey {
        let mut out = String::new();
        match (&self.space, &self.qualifier) {
            (KeySpace::Entity(kind), Qualifier::Id(id)) => {
                out.push_str(kind.as_str());
                out.push('_');
                out.push_str(&id.to_string());
            }
            (KeySpace::Entity(kind), Qualifier::Collection) => out.push_str(kind.plural()),
            (KeySpace::Entity(kind), Qualifier::Filter { fields, .. }) => {
                out.push_str(kind.plural());
                encode_fields(&mut out, fields);
            }
            (KeySpace::View(view), Qualifier::Id(id)) => {
                out.push_str(view.as_str());
                out.push(SEPARATOR);
                out.push_str(view.subject().as_str());
                out.push(ASSIGN);
                out.push_str(&id.to_string());
            }
            (KeySpace::View(view), Qualifier::Collection) => out.push_str(view.as_str()),
            (KeySpace::View(view), Qualifier::Filter { fields, .. }) => {
                out.push_str(view.as_str());
                encode_fields(&mut out, fields);
            }
        }
        CacheKey(out)
    }

    /// Canonical tags an entry for this spec is registered under.
    ///
    /// - single entity: its own entity tag
    /// - collection: the collection tag
    /// - filtered list: the collection tag plus one related-list tag per
    ///   entity the filter pins
    /// - derived view: the view tag plus the subject-scoped view tag
    pub fn tags(&self) -> Vec<Tag> {
        match (&self.space, &self.qualifier) {
            (KeySpace::Entity(kind), Qualifier::Id(id)) => vec![Tag::entity(*kind, *id)],
            (KeySpace::Entity(kind), Qualifier::Collection) => vec![Tag::collection(*kind)],
            (KeySpace::Entity(kind), Qualifier::Filter { pinned, .. }) => {
                let mut tags = vec![Tag::collection(*kind)];
                tags.extend(pinned.iter().map(|related| Tag::related(*kind, *related)));
                tags
            }
            (KeySpace::View(view), Qualifier::Id(id)) => {
                vec![Tag::view(*view), Tag::view_subject(*view, *id)]
            }
            (KeySpace::View(view), _) => vec![Tag::view(*view)],
        }
    }
}

fn encode_fields(out: &mut String, fields: &[(&'static str, FieldValue)]) {
    for (name, value) in fields {
        out.push(SEPARATOR);
        out.push_str(name);
        out.push(ASSIGN);
        match value {
            FieldValue::Absent => {}
            FieldValue::Int(n) => out.push_str(&n.to_string()),
            FieldValue::Token(token) => out.push_str(token),
            FieldValue::Text(text) => escape_into(out, text),
        }
    }
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == SEPARATOR || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// Canonical string key of one cache entry.
///
/// The inner string is private: keys come from [`KeySpec::key`] or the
/// shorthand constructors below, never from ad-hoc formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn entity(kind: EntityKind, id: EntityId) -> Self {
        KeySpec::entity(kind, id).key()
    }

    pub fn collection(kind: EntityKind) -> Self {
        KeySpec::collection(kind).key()
    }

    pub fn filtered<F: FilterDescriptor>(kind: EntityKind, filter: &F) -> Self {
        KeySpec::filtered(kind, filter).key()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the key on unescaped separators and unescape each segment.
    ///
    /// Used for diagnostics and to check that the encoding is reversible.
    pub fn segments(&self) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = self.0.chars();
        while let Some(c) = chars.next() {
            match c {
                ESCAPE => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                }
                SEPARATOR => segments.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }
        segments.push(current);
        segments
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
