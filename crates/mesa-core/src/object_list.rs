//! Relation collections mixing loaded entities and placeholders.
//!
//! An [`ObjectList`] holds [`Reference`]s in order. [`reconcile`] fills the
//! gaps between what is already in a list and the ids a relation is known to
//! reference, appending placeholders for the missing ones.

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::ActiveBackend;
use crate::errors::{CoreError, Result};
use crate::identity::Identity;
use crate::placeholder::Placeholder;
use crate::saveable::{EntityClass, Saveable};

/// An entity that is either in memory or still only an address.
#[derive(Debug, Clone)]
pub enum Reference {
    Loaded(Arc<dyn Saveable>),
    Unresolved(Placeholder),
}

impl Reference {
    #[must_use]
    pub fn class(&self) -> &'static EntityClass {
        match self {
            Self::Loaded(entity) => entity.class(),
            Self::Unresolved(placeholder) => placeholder.class(),
        }
    }

    /// Full identity, absent for unsaved entities.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Self::Loaded(entity) => entity.identity().cloned(),
            Self::Unresolved(placeholder) => Some(placeholder.full_identity()),
        }
    }

    #[must_use]
    pub fn short_identity(&self, active: &ActiveBackend) -> Option<Identity> {
        match self {
            Self::Loaded(entity) => entity.short_identity(active),
            Self::Unresolved(placeholder) => Some(placeholder.short_identity(active)),
        }
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// The entity itself, loading it if needed. Does not change `self`.
    ///
    /// # Errors
    ///
    /// Propagates load failures of an unresolved reference.
    pub fn materialize(&self) -> Result<Arc<dyn Saveable>> {
        match self {
            Self::Loaded(entity) => Ok(Arc::clone(entity)),
            Self::Unresolved(placeholder) => placeholder.resolve(),
        }
    }
}

impl<T: Saveable + 'static> From<T> for Reference {
    fn from(entity: T) -> Self {
        Self::Loaded(Arc::new(entity))
    }
}

impl From<Placeholder> for Reference {
    fn from(placeholder: Placeholder) -> Self {
        Self::Unresolved(placeholder)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectList {
    items: Vec<Reference>,
}

impl ObjectList {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: impl Into<Reference>) {
        self.items.push(item.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Reference> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reference> {
        self.items.iter()
    }

    /// Number of elements not loaded yet.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_loaded()).count()
    }

    /// Row ids of every element, in order, for serializing relation `attr`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Schema` if an element has never been saved.
    pub fn ids(&self, attr: &str) -> Result<Vec<i64>> {
        self.items
            .iter()
            .map(|item| {
                item.identity().map(|identity| identity.id()).ok_or_else(|| {
                    CoreError::Schema(format!(
                        "`{attr}` holds an unsaved {}; save it before its owner",
                        item.class().name()
                    ))
                })
            })
            .collect()
    }

    /// Replace every placeholder with the entity it resolves to.
    ///
    /// # Errors
    ///
    /// Stops at the first failed load; elements before it stay replaced.
    pub fn materialize_all(&mut self) -> Result<()> {
        for item in &mut self.items {
            if let Reference::Unresolved(placeholder) = item {
                *item = Reference::Loaded(placeholder.resolve()?);
            }
        }
        Ok(())
    }
}

impl From<Vec<Reference>> for ObjectList {
    fn from(items: Vec<Reference>) -> Self {
        Self { items }
    }
}

impl FromIterator<Reference> for ObjectList {
    fn from_iter<I: IntoIterator<Item = Reference>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ObjectList {
    type Item = Reference;
    type IntoIter = std::vec::IntoIter<Reference>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ObjectList {
    type Item = &'a Reference;
    type IntoIter = std::slice::Iter<'a, Reference>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Append a placeholder for every id in `referenced_ids` that `existing`
/// does not already represent.
///
/// Ids are short ids under `active`; new placeholders are bound to it.
/// Existing elements keep their order, new ones are appended in the order
/// their ids appear, and each missing id is appended once. Nothing is
/// removed, reordered or loaded.
///
/// If any existing element has no identity the list cannot be compared
/// against ids and is returned unchanged; this is logged.
///
/// # Errors
///
/// - `CoreError::Ambiguity` if there are ids to add, `existing` is empty and
///   no `class` is given.
/// - `CoreError::DataBase` if `active` has no concrete backend.
pub fn reconcile(
    existing: Option<ObjectList>,
    referenced_ids: Option<&[i64]>,
    class: Option<&'static EntityClass>,
    active: &ActiveBackend,
) -> Result<ObjectList> {
    let mut list = existing.unwrap_or_default();
    let ids = match referenced_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Ok(list),
    };

    let class = class
        .or_else(|| list.get(0).map(Reference::class))
        .ok_or_else(|| {
            CoreError::Ambiguity(
                "can't infer the entity class of an empty list; pass it explicitly".into(),
            )
        })?;

    let represented: Option<HashSet<Identity>> = list
        .iter()
        .map(|item| item.short_identity(active))
        .collect();
    let Some(mut represented) = represented else {
        tracing::warn!(
            entity_type = class.name(),
            len = list.len(),
            "object list holds an element without identity; returning it unchanged"
        );
        return Ok(list);
    };

    for &id in ids {
        if represented.insert(Identity::Short(id)) {
            list.push(Placeholder::new(id, class, None, active)?);
        }
    }
    Ok(list)
}
