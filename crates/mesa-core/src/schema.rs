//! Per-type storage schema declarations.
//!
//! An [`EntitySchema`] says which attributes form an entity's primary row,
//! which live in aux tables, and which are links to other entities. Derived
//! entity types build their schema with [`EntitySchema::compose`], which
//! unions the parents' declarations up front instead of letting one parent
//! shadow another.

use std::collections::BTreeMap;

use crate::errors::{CoreError, Result};

/// A link attribute and the key its ids are serialized under
/// (e.g. `series_list` / `s_ids`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub attr: &'static str,
    pub ids_key: &'static str,
}

impl Relation {
    #[must_use]
    pub const fn new(attr: &'static str, ids_key: &'static str) -> Self {
        Self { attr, ids_key }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    table_name: &'static str,
    column_attrs: Option<Vec<&'static str>>,
    extra_column_attrs: BTreeMap<&'static str, Vec<&'static str>>,
    extra_linkers: Vec<Relation>,
    child_attrs: Vec<Relation>,
}

impl EntitySchema {
    /// A schema with no columns declared. Entities using it cannot be
    /// serialized until [`with_columns`](Self::with_columns) is applied.
    #[must_use]
    pub const fn new(table_name: &'static str) -> Self {
        Self {
            table_name,
            column_attrs: None,
            extra_column_attrs: BTreeMap::new(),
            extra_linkers: Vec::new(),
            child_attrs: Vec::new(),
        }
    }

    /// Union the parents' declarations, in parent order, under a new table
    /// name.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Schema` if the same attribute ends up in two
    /// different tables (primary row vs aux table, or two aux tables).
    pub fn compose(table_name: &'static str, parents: &[&Self]) -> Result<Self> {
        let mut schema = Self::new(table_name);
        for parent in parents {
            if let Some(columns) = &parent.column_attrs {
                schema = schema.with_columns(columns);
            }
            for (aux_table, columns) in &parent.extra_column_attrs {
                schema = schema.with_extra_columns(*aux_table, columns);
            }
            for linker in &parent.extra_linkers {
                schema = schema.with_linker(*linker);
            }
            for child in &parent.child_attrs {
                schema = schema.with_child(*child);
            }
        }
        schema.validate()?;
        Ok(schema)
    }

    /// Add primary-row attributes, keeping first-seen order and skipping
    /// duplicates.
    #[must_use]
    pub fn with_columns(mut self, columns: &[&'static str]) -> Self {
        let existing = self.column_attrs.get_or_insert_with(Vec::new);
        push_unique(existing, columns);
        self
    }

    #[must_use]
    pub fn with_extra_columns(mut self, aux_table: &'static str, columns: &[&'static str]) -> Self {
        let existing = self.extra_column_attrs.entry(aux_table).or_default();
        push_unique(existing, columns);
        self
    }

    #[must_use]
    pub fn with_linker(mut self, linker: Relation) -> Self {
        if !self.extra_linkers.contains(&linker) {
            self.extra_linkers.push(linker);
        }
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Relation) -> Self {
        if !self.child_attrs.contains(&child) {
            self.child_attrs.push(child);
        }
        self
    }

    /// Check that every attribute is stored in exactly one table.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Schema` naming the first conflicting attribute.
    pub fn validate(&self) -> Result<()> {
        let mut placed: BTreeMap<&str, &str> = BTreeMap::new();
        let primary = self.column_attrs.iter().flatten().map(|c| (self.table_name, *c));
        let aux = self
            .extra_column_attrs
            .iter()
            .flat_map(|(table, columns)| columns.iter().map(move |c| (*table, *c)));

        for (table, column) in primary.chain(aux) {
            if let Some(other) = placed.insert(column, table) {
                if other != table {
                    return Err(CoreError::Schema(format!(
                        "{}: attribute `{column}` is declared in both `{other}` and `{table}`",
                        self.table_name
                    )));
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub const fn table_name(&self) -> &'static str {
        self.table_name
    }

    #[must_use]
    pub fn column_attrs(&self) -> Option<&[&'static str]> {
        self.column_attrs.as_deref()
    }

    #[must_use]
    pub const fn extra_column_attrs(&self) -> &BTreeMap<&'static str, Vec<&'static str>> {
        &self.extra_column_attrs
    }

    #[must_use]
    pub fn extra_linkers(&self) -> &[Relation] {
        &self.extra_linkers
    }

    #[must_use]
    pub fn child_attrs(&self) -> &[Relation] {
        &self.child_attrs
    }

    /// The aux table an attribute is stored in, if any.
    #[must_use]
    pub fn aux_table_of(&self, attr: &str) -> Option<&'static str> {
        self.extra_column_attrs
            .iter()
            .find(|(_, columns)| columns.iter().any(|c| *c == attr))
            .map(|(table, _)| *table)
    }
}

fn push_unique(into: &mut Vec<&'static str>, columns: &[&'static str]) {
    for column in columns {
        if !into.contains(column) {
            into.push(*column);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn base() -> EntitySchema {
        EntitySchema::new("measurement")
            .with_columns(&["name", "technique"])
            .with_child(Relation::new("series_list", "s_ids"))
    }

    #[test]
    fn new_schema_has_no_columns() {
        assert_eq!(EntitySchema::new("x").column_attrs(), None);
    }

    #[test]
    fn compose_unions_parents_in_order() {
        let ec = EntitySchema::compose("ec", &[&base()])
            .unwrap()
            .with_extra_columns("ec_measurements", &["ec_technique"]);
        let ms = EntitySchema::compose("ms", &[&base()])
            .unwrap()
            .with_extra_columns("ms_measurements", &["tspan_bg"]);

        let ecms = EntitySchema::compose("ecms", &[&ec, &ms]).unwrap();

        assert_eq!(ecms.table_name(), "ecms");
        assert_eq!(ecms.column_attrs(), Some(&["name", "technique"][..]));
        assert_eq!(ecms.extra_column_attrs().len(), 2);
        assert_eq!(ecms.aux_table_of("ec_technique"), Some("ec_measurements"));
        assert_eq!(ecms.aux_table_of("tspan_bg"), Some("ms_measurements"));
        assert_eq!(ecms.child_attrs(), &[Relation::new("series_list", "s_ids")]);
    }

    #[test]
    fn compose_rejects_attribute_in_two_tables() {
        let a = EntitySchema::new("a")
            .with_columns(&["name"])
            .with_extra_columns("a_extra", &["gain"]);
        let b = EntitySchema::new("b")
            .with_columns(&["name"])
            .with_extra_columns("b_extra", &["gain"]);

        let err = EntitySchema::compose("ab", &[&a, &b]).unwrap_err();
        assert!(matches!(err, CoreError::Schema(_)), "{err}");
        assert!(err.to_string().contains("gain"));
    }

    #[test]
    fn compose_rejects_primary_and_aux_overlap() {
        let a = EntitySchema::new("a").with_columns(&["name", "gain"]);
        let b = EntitySchema::new("b").with_extra_columns("b_extra", &["gain"]);
        assert!(EntitySchema::compose("ab", &[&a, &b]).is_err());
    }

    #[test]
    fn compose_of_undefined_parents_stays_undefined() {
        let abstract_parent = EntitySchema::new("saveable");
        let composed = EntitySchema::compose("child", &[&abstract_parent]).unwrap();
        assert_eq!(composed.column_attrs(), None);
    }
}
