//! Database error types for mesa-db.

use mesa_core::CoreError;
use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned unusable data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., a blocking call inside a runtime).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration could not be turned into a backend.
    #[error("Config error: {0}")]
    Config(#[from] mesa_config::ConfigError),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Error from the identity and serialization layer.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DatabaseError> for CoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Core(inner) => inner,
            other => Self::Other(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_pass_through_unchanged() {
        let err = CoreError::from(DatabaseError::Core(CoreError::not_found("Calibration", 3)));
        assert!(matches!(err, CoreError::NotFound { id: 3, .. }), "{err}");
    }

    #[test]
    fn storage_failures_become_other() {
        let err = CoreError::from(DatabaseError::NoResult);
        assert!(matches!(err, CoreError::Other(_)), "{err}");
        assert_eq!(err.to_string(), "No result returned");
    }
}
