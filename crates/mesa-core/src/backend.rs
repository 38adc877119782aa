//! Backend references and the active-backend context.
//!
//! A [`BackendRef`] names where an identity is stored: the in-memory registry,
//! a persistent store, or the explicit none-sentinel. [`BackendRef::load`] is
//! the single point where entities are fetched; everything else treats the
//! backend as an opaque capability.
//!
//! The process-wide "active backend" is modelled by [`ActiveBackend`], a
//! value passed to whoever needs it rather than a hidden global. It starts at
//! the none-sentinel.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::{CoreError, Result};
use crate::identity::Identity;
use crate::mapping::StorageMapping;
use crate::memory::MemoryBackend;
use crate::reserved;
use crate::saveable::{Dict, EntityClass, Saveable};

/// One main row plus its aux-table rows, ready to be written.
#[derive(Debug, Clone)]
pub struct NewRow<'a> {
    pub collection: &'a str,
    pub table: &'a str,
    pub entity_type: &'a str,
    pub row: Dict,
    pub aux: Vec<(&'a str, Dict)>,
}

/// A row as read back from a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub entity_type: String,
    pub collection: String,
    pub row: Dict,
    pub aux: BTreeMap<String, Dict>,
}

/// Storage capability behind a [`BackendRef`].
///
/// Implementations are synchronous; calls may block on I/O.
pub trait Backend: fmt::Debug + Send + Sync {
    /// Stable key distinguishing this backend from every other one in the
    /// process. Full identities compare by this key.
    fn key(&self) -> &str;

    /// Lookup from entity type name to table descriptor.
    fn mapping(&self) -> &dyn StorageMapping;

    /// Write one main row plus its aux rows and return the new row id.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if the underlying storage fails.
    fn insert(&self, row: NewRow<'_>) -> Result<i64>;

    /// Fetch the row `id` of `table`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if the underlying storage fails.
    fn fetch(&self, table: &str, id: i64) -> Result<Option<StoredRow>>;
}

/// Where an identity lives.
#[derive(Clone, Default)]
pub enum BackendRef {
    /// No backend. Nothing can be loaded from or bound to it.
    #[default]
    None,
    /// In-process registry.
    Memory(Arc<MemoryBackend>),
    /// Persistent store.
    Persistent(Arc<dyn Backend>),
}

impl BackendRef {
    #[must_use]
    pub fn memory(backend: MemoryBackend) -> Self {
        Self::Memory(Arc::new(backend))
    }

    pub fn persistent(backend: impl Backend + 'static) -> Self {
        Self::Persistent(Arc::new(backend))
    }

    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Memory(backend) => backend.key(),
            Self::Persistent(backend) => backend.key(),
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The concrete storage behind this reference.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DataBase` for the none-sentinel.
    pub fn store(&self) -> Result<&dyn Backend> {
        match self {
            Self::None => Err(CoreError::DataBase(
                "no backend: the none-sentinel has no storage".into(),
            )),
            Self::Memory(backend) => Ok(backend.as_ref()),
            Self::Persistent(backend) => Ok(backend.as_ref()),
        }
    }

    /// Fetch and fully construct the entity of `class` stored at `id`.
    ///
    /// The stored entity type decides which registered class builds the row,
    /// so a base-class reference can load a derived entity of the same table
    /// family, but never a sibling or a base of `class`. Relations of the
    /// loaded entity are bound to this backend.
    ///
    /// # Errors
    ///
    /// - `CoreError::DataBase` if this is the none-sentinel.
    /// - `CoreError::Schema` if `class` (or the stored type) has no mapping,
    ///   or the stored type is neither `class` nor derived from it.
    /// - `CoreError::NotFound` if no row `id` exists in the class's table.
    pub fn load(&self, class: &'static EntityClass, id: i64) -> Result<Arc<dyn Saveable>> {
        let store = self.store()?;
        let mapping = store.mapping();
        let descriptor = mapping.descriptor(class.name()).ok_or_else(|| {
            CoreError::Schema(format!(
                "{} has no registered storage mapping",
                class.name()
            ))
        })?;

        let stored = store
            .fetch(descriptor.table, id)?
            .ok_or_else(|| CoreError::not_found(class.name(), id))?;

        let concrete = if stored.entity_type == class.name() {
            class
        } else {
            mapping
                .descriptor(&stored.entity_type)
                .ok_or_else(|| {
                    CoreError::Schema(format!(
                        "stored type {} has no registered storage mapping",
                        stored.entity_type
                    ))
                })?
                .class
        };
        if !concrete.is_a(class) {
            return Err(CoreError::Schema(format!(
                "{} row {id} holds a {}, which is not a {}",
                descriptor.table,
                concrete.name(),
                class.name()
            )));
        }

        let mut dict = reserved::from_storage(stored.row);
        for (_, aux) in stored.aux {
            dict.extend(reserved::from_storage(aux));
        }

        tracing::debug!(
            backend = self.key(),
            entity_type = concrete.name(),
            id,
            "loading entity"
        );
        let scope = ActiveBackend::new(self.clone());
        let entity = concrete.build(Identity::full(self.clone(), id), dict, &scope)?;
        Ok(Arc::from(entity))
    }
}

impl PartialEq for BackendRef {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for BackendRef {}

impl Hash for BackendRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("BackendRef::None"),
            Self::Memory(_) => write!(f, "BackendRef::Memory({})", self.key()),
            Self::Persistent(_) => write!(f, "BackendRef::Persistent({})", self.key()),
        }
    }
}

/// The currently active backend, injected wherever short ids are resolved.
#[derive(Debug, Default)]
pub struct ActiveBackend {
    current: RwLock<BackendRef>,
}

impl ActiveBackend {
    #[must_use]
    pub fn new(backend: BackendRef) -> Self {
        Self {
            current: RwLock::new(backend),
        }
    }

    /// Switch the active backend and return the previous one.
    pub fn select(&self, backend: BackendRef) -> BackendRef {
        tracing::debug!(backend = backend.key(), "selecting active backend");
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, backend)
    }

    #[must_use]
    pub fn current(&self) -> BackendRef {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_active(&self, backend: &BackendRef) -> bool {
        *backend == self.current()
    }

    /// Resolve a usable backend: `explicit` if it is concrete, else the
    /// active one.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DataBase` if the result is the none-sentinel.
    pub fn resolve(&self, explicit: Option<&BackendRef>) -> Result<BackendRef> {
        let backend = match explicit {
            Some(backend) if !backend.is_none() => backend.clone(),
            _ => self.current(),
        };
        if backend.is_none() {
            return Err(CoreError::DataBase(
                "no backend is active and none was given".into(),
            ));
        }
        Ok(backend)
    }

    /// Resolve the backend and row id an identity refers to.
    ///
    /// Short identities resolve against the active backend; full identities
    /// carry their own, falling back to the active one only if theirs is the
    /// none-sentinel.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DataBase` if no concrete backend is resolvable.
    pub fn resolve_identity(&self, identity: &Identity) -> Result<(BackendRef, i64)> {
        match identity {
            Identity::Short(id) => Ok((self.resolve(None)?, *id)),
            Identity::Full(full) => Ok((self.resolve(Some(&full.backend))?, full.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingRegistry;

    fn memory() -> BackendRef {
        BackendRef::memory(MemoryBackend::new(Arc::new(MappingRegistry::new())))
    }

    #[test]
    fn active_backend_defaults_to_none() {
        let active = ActiveBackend::default();
        assert!(active.current().is_none());
        let err = active.resolve(None).unwrap_err();
        assert!(matches!(err, CoreError::DataBase(_)), "{err}");
    }

    #[test]
    fn explicit_backend_wins_over_active() {
        let a = memory();
        let b = memory();
        let active = ActiveBackend::new(a.clone());
        assert_eq!(active.resolve(Some(&b)).unwrap(), b);
        assert_eq!(active.resolve(None).unwrap(), a);
    }

    #[test]
    fn explicit_none_falls_back_to_active() {
        let a = memory();
        let active = ActiveBackend::new(a.clone());
        assert_eq!(active.resolve(Some(&BackendRef::None)).unwrap(), a);
    }

    #[test]
    fn select_returns_previous_backend() {
        let a = memory();
        let active = ActiveBackend::default();
        let previous = active.select(a.clone());
        assert!(previous.is_none());
        assert!(active.is_active(&a));
    }

    #[test]
    fn distinct_memory_backends_have_distinct_keys() {
        let a = memory();
        let b = memory();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn short_identity_resolves_against_active() {
        let a = memory();
        let active = ActiveBackend::new(a.clone());
        let (backend, id) = active.resolve_identity(&Identity::Short(7)).unwrap();
        assert_eq!(backend, a);
        assert_eq!(id, 7);
    }

    #[test]
    fn none_store_is_a_database_error() {
        assert!(matches!(
            BackendRef::None.store().unwrap_err(),
            CoreError::DataBase(_)
        ));
    }
}
