//! Storage registry: table mapping plus JSON Schema validation.
//!
//! Schemas are built from the entity structs at registration time using
//! [`schemars::schema_for!`]; rows are checked with `jsonschema` before they
//! reach a backend.

use std::collections::HashMap;

use mesa_core::entities::{
    Calibration, DATA_SERIES_TABLE, DataSeries, MEASUREMENT_TABLE, Measurement, standard_classes,
};
use mesa_core::{CoreError, Dict, EntityClass, MappingRegistry, StorageMapping, TableDescriptor};
use schemars::{JsonSchema, schema_for};
use serde_json::Value;

use crate::error::SchemaError;

/// [`StorageMapping`] that also validates rows against the JSON Schema of
/// their entity struct.
#[derive(Debug, Clone, Default)]
pub struct StorageRegistry {
    mapping: MappingRegistry,
    schemas: HashMap<&'static str, Value>,
}

impl StorageRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in entity class with its table family and schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Generation` if a schema cannot be serialized.
    pub fn standard() -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for (class, table) in standard_classes() {
            match table {
                MEASUREMENT_TABLE => registry.register::<Measurement>(class, table)?,
                DATA_SERIES_TABLE => registry.register::<DataSeries>(class, table)?,
                _ => registry.register::<Calibration>(class, table)?,
            };
        }
        Ok(registry)
    }

    /// Map `class` to `table` and validate its rows against the schema of
    /// `T`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Generation` if the schema cannot be serialized.
    pub fn register<T: JsonSchema>(
        &mut self,
        class: &'static EntityClass,
        table: &'static str,
    ) -> Result<&mut Self, SchemaError> {
        let schema = serde_json::to_value(schema_for!(T))
            .map_err(|e| SchemaError::Generation(format!("{}: {e}", class.name())))?;
        self.mapping.register(class, table);
        self.schemas.insert(class.name(), schema);
        Ok(self)
    }

    /// Map `class` to `table` without any row validation.
    pub fn register_unchecked(
        &mut self,
        class: &'static EntityClass,
        table: &'static str,
    ) -> &mut Self {
        self.mapping.register(class, table);
        self.schemas.remove(class.name());
        self
    }

    /// Get the schema registered for an entity type name.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&Value> {
        self.schemas.get(type_name)
    }

    /// Validate a JSON value against the schema of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::NotFound` if no schema is registered for the
    /// type, or `SchemaError::ValidationFailed` if validation produces errors.
    pub fn validate(&self, type_name: &str, instance: &Value) -> Result<(), SchemaError> {
        let schema = self
            .get(type_name)
            .ok_or_else(|| SchemaError::NotFound(type_name.to_string()))?;

        let validator = jsonschema::validator_for(schema)
            .map_err(|e| SchemaError::Generation(format!("{e}")))?;

        let errors: Vec<String> = validator
            .iter_errors(instance)
            .map(|e| format!("{e}"))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::ValidationFailed {
                type_name: type_name.to_string(),
                errors,
            })
        }
    }

    /// Registered type names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.mapping.type_names().collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }
}

impl StorageMapping for StorageRegistry {
    fn descriptor(&self, type_name: &str) -> Option<&TableDescriptor> {
        self.mapping.descriptor(type_name)
    }

    fn validate_row(&self, type_name: &str, row: &Dict) -> mesa_core::Result<()> {
        if self.get(type_name).is_none() {
            return Ok(());
        }
        self.validate(type_name, &Value::Object(row.clone()))
            .map_err(|err| {
                tracing::debug!(entity_type = type_name, %err, "row rejected by schema");
                CoreError::from(err)
            })
    }
}
