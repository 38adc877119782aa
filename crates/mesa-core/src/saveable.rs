//! The serialization contract every persisted entity implements.
//!
//! An entity type is described by a static [`EntityClass`]: its name, its
//! [`EntitySchema`], and the function that rebuilds it from a stored row.
//! Instances implement [`Saveable`], which turns them into dictionaries
//! (`get_main_dict`, `as_dict`) and writes them to a backend (`save`).

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::{ActiveBackend, BackendRef, NewRow};
use crate::counter::EphemeralCounter;
use crate::errors::{CoreError, Result};
use crate::identity::Identity;
use crate::object_list::Reference;
use crate::reserved;
use crate::schema::EntitySchema;

/// Attribute name -> value, the dictionary form of an entity.
pub type Dict = serde_json::Map<String, Value>;

/// Rebuilds an entity from its stored dictionary. Relations found in the
/// dictionary are bound to `active`.
pub type BuildFn = fn(Identity, Dict, &ActiveBackend) -> Result<Box<dyn Saveable>>;

pub struct EntityClass {
    name: &'static str,
    schema: EntitySchema,
    build: Option<BuildFn>,
    parents: Vec<&'static EntityClass>,
}

impl EntityClass {
    #[must_use]
    pub const fn new(name: &'static str, schema: EntitySchema, build: BuildFn) -> Self {
        Self {
            name,
            schema,
            build: Some(build),
            parents: Vec::new(),
        }
    }

    /// A class that describes a schema but cannot be instantiated from rows.
    #[must_use]
    pub const fn abstract_class(name: &'static str, schema: EntitySchema) -> Self {
        Self {
            name,
            schema,
            build: None,
            parents: Vec::new(),
        }
    }

    /// Declare `parent` as a class this one derives from.
    #[must_use]
    pub fn with_parent(mut self, parent: &'static Self) -> Self {
        self.parents.push(parent);
        self
    }

    /// Whether this class is `other` or derives from it.
    #[must_use]
    pub fn is_a(&self, other: &Self) -> bool {
        self == other || self.parents.iter().any(|parent| parent.is_a(other))
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Rebuild an entity of this class.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Schema` for abstract classes or rows that do not
    /// deserialize into the entity.
    pub fn build(
        &self,
        identity: Identity,
        dict: Dict,
        active: &ActiveBackend,
    ) -> Result<Box<dyn Saveable>> {
        let build = self.build.ok_or_else(|| {
            CoreError::Schema(format!("{} is abstract and cannot be loaded", self.name))
        })?;
        build(identity, dict, active)
    }
}

impl PartialEq for EntityClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EntityClass {}

impl fmt::Debug for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityClass")
            .field("name", &self.name)
            .field("table_name", &self.schema.table_name())
            .field(
                "parents",
                &self.parents.iter().map(|p| p.name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Contract implemented by every persisted entity.
///
/// Implementors supply the five required methods; serialization and saving
/// are provided. `as_dict` is the place to add relation ids and may be
/// overridden per entity type.
pub trait Saveable: fmt::Debug + Send + Sync {
    fn class(&self) -> &'static EntityClass;

    /// Every scalar attribute of the entity, keyed by name.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if the entity cannot be represented as a
    /// dictionary.
    fn attributes(&self) -> Result<Dict>;

    /// Identity assigned by a backend, absent for unsaved entities.
    fn identity(&self) -> Option<&Identity>;

    fn set_identity(&mut self, identity: Identity);

    fn counter(&self) -> &EphemeralCounter;

    fn schema(&self) -> &'static EntitySchema {
        self.class().schema()
    }

    /// Ephemeral in-memory handle. Advances on every call and is never a
    /// storage identity.
    fn next_available_id(&self) -> u64 {
        self.counter().next()
    }

    /// The bare id if this entity lives in the active backend, else its full
    /// identity.
    fn short_identity(&self, active: &ActiveBackend) -> Option<Identity> {
        self.identity().map(|identity| identity.short(active))
    }

    /// The primary-row attributes (minus `exclude`) merged with every
    /// attribute declared for an aux table.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Schema` if the class has no `column_attrs` or a
    /// declared attribute is missing from [`attributes`](Self::attributes).
    fn get_main_dict(&self, exclude: &[&str]) -> Result<Dict> {
        let class = self.class().name();
        let schema = self.schema();
        let columns = schema.column_attrs().ok_or_else(|| {
            CoreError::Schema(format!(
                "{class} can't be serialized because it hasn't defined column_attrs"
            ))
        })?;

        let mut attributes = self.attributes()?;
        let mut dict = Dict::new();
        let aux = schema.extra_column_attrs().values().flatten();
        for attr in columns.iter().filter(|attr| !exclude.contains(*attr)).chain(aux) {
            let value = attributes.remove(*attr).ok_or_else(|| {
                CoreError::Schema(format!("{class} declares `{attr}` but does not provide it"))
            })?;
            dict.insert((*attr).to_string(), value);
        }
        Ok(dict)
    }

    /// Every entity this one links to, paired with the attribute holding it.
    fn references(&self) -> Vec<(&'static str, &Reference)> {
        Vec::new()
    }

    /// Full dictionary form of the entity.
    ///
    /// # Errors
    ///
    /// Same as [`get_main_dict`](Self::get_main_dict).
    fn as_dict(&self) -> Result<Dict> {
        self.get_main_dict(&[])
    }

    /// Write this entity to `backend` under `collection` and assign it the
    /// resulting full identity.
    ///
    /// Serialization happens first, so a schema problem never reaches the
    /// backend.
    ///
    /// # Errors
    ///
    /// - `CoreError::Schema` if the entity cannot be serialized or the row
    ///   fails validation.
    /// - `CoreError::DataBase` for the none-sentinel, an unregistered class,
    ///   or a linked entity stored in a different backend. Relation ids are
    ///   bare row ids, so they only mean something inside `backend`.
    /// - Any storage failure reported by the backend.
    fn save(&mut self, backend: &BackendRef, collection: &str) -> Result<()> {
        let class = self.class();
        let dict = self.as_dict()?;

        let store = backend.store()?;
        let mapping = store.mapping();
        let descriptor = mapping.descriptor(class.name()).ok_or_else(|| {
            CoreError::DataBase(format!(
                "{} has no registered storage mapping",
                class.name()
            ))
        })?;
        for (attr, reference) in self.references() {
            let Some(linked) = reference.identity().and_then(|id| id.backend().cloned()) else {
                continue;
            };
            if linked != *backend {
                return Err(CoreError::DataBase(format!(
                    "{} `{attr}` links a {} stored in {}; it can't be saved to {}",
                    class.name(),
                    reference.class().name(),
                    linked.key(),
                    backend.key()
                )));
            }
        }
        mapping.validate_row(class.name(), &dict)?;

        let (row, aux) = split_aux_rows(class.schema(), dict);
        let id = store.insert(NewRow {
            collection,
            table: descriptor.table,
            entity_type: class.name(),
            row: reserved::to_storage(row),
            aux,
        })?;

        tracing::debug!(
            backend = backend.key(),
            entity_type = class.name(),
            table = descriptor.table,
            collection,
            id,
            "saved entity"
        );
        self.set_identity(Identity::full(backend.clone(), id));
        Ok(())
    }
}

/// Move aux-table attributes out of the main row, one dictionary per aux
/// table.
fn split_aux_rows(schema: &EntitySchema, mut row: Dict) -> (Dict, Vec<(&'static str, Dict)>) {
    let mut aux_rows = Vec::new();
    for (aux_table, columns) in schema.extra_column_attrs() {
        let mut aux = Dict::new();
        for column in columns {
            if let Some(value) = row.remove(*column) {
                aux.insert((*column).to_string(), value);
            }
        }
        aux_rows.push((*aux_table, reserved::to_storage(aux)));
    }
    (row, aux_rows)
}

/// Serialize an entity struct into its attribute dictionary.
///
/// # Errors
///
/// Returns `CoreError::Schema` if the value does not serialize to an object.
pub fn to_attributes<T: Serialize>(value: &T) -> Result<Dict> {
    match serde_json::to_value(value).map_err(|e| CoreError::Other(e.into()))? {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::Schema(format!(
            "entity serialized to a non-object value: {other}"
        ))),
    }
}

/// Deserialize an entity struct from a stored dictionary.
///
/// # Errors
///
/// Returns `CoreError::Schema` if the dictionary does not fit the struct.
pub fn from_attributes<T: DeserializeOwned>(class: &EntityClass, dict: Dict) -> Result<T> {
    serde_json::from_value(Value::Object(dict))
        .map_err(|e| CoreError::Schema(format!("{}: {e}", class.name())))
}

/// Remove a list of row ids from `dict`. Missing or null means no ids.
///
/// # Errors
///
/// Returns `CoreError::Schema` if the value is not a list of integers.
pub fn take_ids(dict: &mut Dict, key: &str) -> Result<Vec<i64>> {
    match dict.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_i64()
                    .ok_or_else(|| CoreError::Schema(format!("`{key}` holds a non-integer id: {item}")))
            })
            .collect(),
        Some(other) => Err(CoreError::Schema(format!(
            "`{key}` must be a list of ids, got {other}"
        ))),
    }
}

/// Remove a single optional row id from `dict`.
///
/// # Errors
///
/// Returns `CoreError::Schema` if the value is neither null nor an integer.
pub fn take_id(dict: &mut Dict, key: &str) -> Result<Option<i64>> {
    match dict.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| CoreError::Schema(format!("`{key}` must be an id, got {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn take_ids_handles_missing_and_null() {
        let mut dict = Dict::new();
        assert_eq!(take_ids(&mut dict, "s_ids").unwrap(), Vec::<i64>::new());
        dict.insert("s_ids".into(), Value::Null);
        assert_eq!(take_ids(&mut dict, "s_ids").unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn take_ids_removes_the_key() {
        let mut dict = Dict::new();
        dict.insert("s_ids".into(), json!([3, 1, 2]));
        assert_eq!(take_ids(&mut dict, "s_ids").unwrap(), vec![3, 1, 2]);
        assert!(!dict.contains_key("s_ids"));
    }

    #[test]
    fn take_ids_rejects_non_integers() {
        let mut dict = Dict::new();
        dict.insert("s_ids".into(), json!(["a"]));
        assert!(matches!(
            take_ids(&mut dict, "s_ids").unwrap_err(),
            CoreError::Schema(_)
        ));
    }

    #[test]
    fn take_id_reads_optional_integer() {
        let mut dict = Dict::new();
        dict.insert("t_id".into(), json!(4));
        assert_eq!(take_id(&mut dict, "t_id").unwrap(), Some(4));
        assert_eq!(take_id(&mut dict, "t_id").unwrap(), None);
    }

    #[test]
    fn split_moves_aux_columns_out_of_the_main_row() {
        let schema = EntitySchema::new("measurement")
            .with_columns(&["name"])
            .with_extra_columns("ec_measurements", &["ec_technique"]);
        let mut row = Dict::new();
        row.insert("name".into(), json!("cv"));
        row.insert("ec_technique".into(), json!("CA"));

        let (main, aux) = split_aux_rows(&schema, row);
        assert_eq!(main.keys().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(aux.len(), 1);
        assert_eq!(aux[0].0, "ec_measurements");
        assert_eq!(aux[0].1["ec_technique"], json!("CA"));
    }

    #[test]
    fn to_attributes_rejects_scalars() {
        assert!(to_attributes(&5).is_err());
    }
}
