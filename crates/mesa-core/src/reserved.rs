//! Storage-reserved attribute names.
//!
//! Storage engines claim a few column names for themselves. Attributes that
//! collide with them are renamed with the `mesa_` prefix on the way in and
//! restored on the way out.

use crate::saveable::Dict;

/// Attribute name -> name used in storage.
pub const RESERVED_KEYS: &[(&str, &str)] = &[
    ("id", "mesa_id"),
    ("type", "mesa_type"),
    ("metadata", "mesa_metadata"),
];

#[must_use]
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.iter().any(|(reserved, _)| *reserved == key)
}

/// Rename reserved attributes before a row is handed to a backend.
#[must_use]
pub fn to_storage(mut row: Dict) -> Dict {
    for (reserved, stored) in RESERVED_KEYS {
        if let Some(value) = row.remove(*reserved) {
            row.insert((*stored).to_string(), value);
        }
    }
    row
}

/// Undo [`to_storage`] on a row read back from a backend.
#[must_use]
pub fn from_storage(mut row: Dict) -> Dict {
    for (reserved, stored) in RESERVED_KEYS {
        if let Some(value) = row.remove(*stored) {
            row.insert((*reserved).to_string(), value);
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn dict(value: serde_json::Value) -> Dict {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn renames_metadata_on_the_way_in() {
        let row = to_storage(dict(json!({"name": "cv", "metadata": {"a": 1}})));
        assert!(!row.contains_key("metadata"));
        assert_eq!(row["mesa_metadata"], json!({"a": 1}));
        assert!(row.keys().all(|key| !is_reserved(key)));
    }

    #[test]
    fn restores_on_the_way_out() {
        let original = dict(json!({"name": "cv", "metadata": {}, "type": "x"}));
        assert_eq!(from_storage(to_storage(original.clone())), original);
    }

    #[test]
    fn rows_without_reserved_keys_pass_through() {
        let original = dict(json!({"name": "cv", "tstamp": 1.5}));
        assert_eq!(to_storage(original.clone()), original);
    }
}
