//! Deferred references to stored entities.
//!
//! A [`Placeholder`] stands in for an entity known only by
//! `(class, id, backend)`. It can be compared by identity without touching
//! storage and turns into the real entity with [`Placeholder::resolve`].

use std::sync::Arc;

use crate::backend::{ActiveBackend, BackendRef};
use crate::errors::{CoreError, Result};
use crate::identity::Identity;
use crate::saveable::{EntityClass, Saveable};

#[derive(Debug, Clone)]
pub struct Placeholder {
    id: i64,
    class: &'static EntityClass,
    backend: BackendRef,
}

impl Placeholder {
    /// Bind `identity` of `class` to a concrete backend.
    ///
    /// A short identity uses `backend` if given, else the active backend.
    /// A full identity uses `backend` if given, else its own, else the active
    /// one. The none-sentinel never counts as given.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DataBase` if no concrete backend is resolvable: a
    /// placeholder that can never load is a programming error.
    pub fn new(
        identity: impl Into<Identity>,
        class: &'static EntityClass,
        backend: Option<BackendRef>,
        active: &ActiveBackend,
    ) -> Result<Self> {
        let (id, carried) = match identity.into() {
            Identity::Short(id) => (id, None),
            Identity::Full(full) => (full.id, Some(full.backend)),
        };
        let explicit = backend.filter(|b| !b.is_none()).or(carried);
        let backend = active.resolve(explicit.as_ref()).map_err(|_| {
            CoreError::DataBase(format!(
                "can't make a placeholder for {} {id} without a backend",
                class.name()
            ))
        })?;

        tracing::debug!(
            entity_type = class.name(),
            id,
            backend = backend.key(),
            "created placeholder"
        );
        Ok(Self { id, class, backend })
    }

    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub const fn class(&self) -> &'static EntityClass {
        self.class
    }

    #[must_use]
    pub const fn backend(&self) -> &BackendRef {
        &self.backend
    }

    #[must_use]
    pub fn full_identity(&self) -> Identity {
        Identity::full(self.backend.clone(), self.id)
    }

    /// The bare id if bound to the active backend, else the full identity.
    #[must_use]
    pub fn short_identity(&self, active: &ActiveBackend) -> Identity {
        if active.is_active(&self.backend) {
            Identity::Short(self.id)
        } else {
            self.full_identity()
        }
    }

    /// Load the entity this placeholder stands in for.
    ///
    /// Every call goes to the backend; caching is the backend's business.
    ///
    /// # Errors
    ///
    /// Propagates `CoreError::Schema` / `CoreError::NotFound` from the load.
    pub fn resolve(&self) -> Result<Arc<dyn Saveable>> {
        self.backend.load(self.class, self.id)
    }
}

impl PartialEq for Placeholder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.backend == other.backend && self.class == other.class
    }
}
