//! Schema validation error types.

use mesa_core::CoreError;
use thiserror::Error;

/// Errors from the storage registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Requested schema name was not found in the registry.
    #[error("Schema not found: {0}")]
    NotFound(String),

    /// JSON value did not pass schema validation.
    #[error("Validation failed for {type_name}: {errors:?}")]
    ValidationFailed {
        type_name: String,
        /// Individual error messages from the validator.
        errors: Vec<String>,
    },

    /// Schema generation or compilation error.
    #[error("Schema generation error: {0}")]
    Generation(String),
}

impl From<SchemaError> for CoreError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err.to_string())
    }
}
