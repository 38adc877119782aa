//! Storage mapping: entity type name -> physical table.
//!
//! The core does not care what a table looks like inside a backend. It only
//! needs to find, by type name, which table family an entity is written to
//! and which class rebuilds rows of that type.

use std::collections::HashMap;
use std::fmt;

use crate::errors::Result;
use crate::saveable::{Dict, EntityClass};

#[derive(Debug, Clone, Copy)]
pub struct TableDescriptor {
    /// Physical table shared by a class and its derived classes.
    pub table: &'static str,
    /// Class that rebuilds rows stored under this type name.
    pub class: &'static EntityClass,
}

/// Lookup consumed by `save` and `load`.
pub trait StorageMapping: fmt::Debug + Send + Sync {
    fn descriptor(&self, type_name: &str) -> Option<&TableDescriptor>;

    /// Check a serialized row before it is written. Accepts everything by
    /// default.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Schema` if the row does not fit the registered
    /// schema of `type_name`.
    fn validate_row(&self, _type_name: &str, _row: &Dict) -> Result<()> {
        Ok(())
    }
}

/// Plain map-backed [`StorageMapping`].
#[derive(Debug, Default, Clone)]
pub struct MappingRegistry {
    entries: HashMap<&'static str, TableDescriptor>,
}

impl MappingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `class` to `table`. Re-registering a class replaces its entry.
    pub fn register(&mut self, class: &'static EntityClass, table: &'static str) -> &mut Self {
        self.entries
            .insert(class.name(), TableDescriptor { table, class });
        self
    }

    /// Registry of every built-in entity class.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for (class, table) in crate::entities::standard_classes() {
            registry.register(class, table);
        }
        registry
    }

    #[must_use]
    pub fn with(mut self, class: &'static EntityClass, table: &'static str) -> Self {
        self.register(class, table);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

impl StorageMapping for MappingRegistry {
    fn descriptor(&self, type_name: &str) -> Option<&TableDescriptor> {
        self.entries.get(type_name)
    }
}
