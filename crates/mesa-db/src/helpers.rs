//! Row parsing helpers.
//!
//! Row dictionaries are stored as JSON text; timestamps come either from
//! `SQLite`'s `datetime('now')` or from Rust's `to_rfc3339()`.

use chrono::{DateTime, Utc};
use mesa_core::Dict;
use serde_json::Value;

use crate::error::DatabaseError;

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// Handles both RFC 3339 (`"2026-02-09T14:30:00+00:00"`) and `SQLite`'s default
/// format (`"2026-02-09 14:30:00"`).
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string cannot be parsed as either format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Parse a TEXT column holding a JSON object into a row dictionary.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the text is not JSON or not an object.
pub fn parse_dict(s: &str) -> Result<Dict, DatabaseError> {
    match serde_json::from_str(s) {
        Ok(Value::Object(dict)) => Ok(dict),
        Ok(other) => Err(DatabaseError::Query(format!(
            "Expected a JSON object in row data, found {other}"
        ))),
        Err(e) => Err(DatabaseError::Query(format!("Invalid JSON in row data: {e}"))),
    }
}

/// Serialize a row dictionary for a TEXT column.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if serialization fails.
pub fn dict_to_text(dict: &Dict) -> Result<String, DatabaseError> {
    serde_json::to_string(dict)
        .map_err(|e| DatabaseError::Query(format!("Failed to serialize row data: {e}")))
}
