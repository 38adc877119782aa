//! Cross-cutting error types for mesa.
//!
//! Every operation of the identity and serialization layer reports failures
//! through [`CoreError`]. Storage crates define their own error enums and
//! convert into `CoreError` at the `Backend` boundary.

use thiserror::Error;

/// Errors raised by the lazy identity and serialization layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity type has no `column_attrs`, no storage mapping at load time,
    /// or a schema composition conflict.
    #[error("Schema error: {0}")]
    Schema(String),

    /// No usable backend could be resolved, or a type has no storage mapping
    /// at save time.
    #[error("Database error: {0}")]
    DataBase(String),

    /// A load targeting a specific (class, id) found no row.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: i64 },

    /// The reconciler could not infer the entity class of an object list.
    #[error("Ambiguous object list: {0}")]
    Ambiguity(String),

    /// Catch-all for unexpected storage failures.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Shorthand for a [`CoreError::NotFound`] on the given entity type.
    pub fn not_found(entity_type: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }
}

/// Convenience alias used throughout the core crate.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
