//! Storage backend selection.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Database name that keeps a libSQL database in memory.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

fn default_database_name() -> String {
    "mesa.db".to_string()
}

fn default_collection() -> String {
    "default".to_string()
}

/// Which backend becomes active on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// No backend; saving and loading fail until one is selected.
    #[default]
    None,
    /// In-process registry, lost on exit.
    Memory,
    /// libSQL database file under `data_directory`.
    Libsql,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Memory => "memory",
            Self::Libsql => "libsql",
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory holding database files. Empty means `<data_dir>/mesa`.
    #[serde(default)]
    pub data_directory: String,

    /// File name of the libSQL database, or `:memory:`.
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Collection that saves go to when none is given.
    #[serde(default = "default_collection")]
    pub default_collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_directory: String::new(),
            database_name: default_database_name(),
            default_collection: default_collection(),
        }
    }
}

impl StorageConfig {
    /// Whether a concrete backend is selected.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.backend != StorageBackend::None
    }

    #[must_use]
    pub fn is_in_memory_database(&self) -> bool {
        self.database_name == IN_MEMORY_DATABASE
    }

    /// Directory that database files live in.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` if `data_directory` is empty and
    /// the platform has no data directory.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if !self.data_directory.is_empty() {
            return Ok(PathBuf::from(&self.data_directory));
        }
        dirs::data_dir()
            .map(|dir| dir.join("mesa"))
            .ok_or_else(|| ConfigError::NotConfigured {
                section: "storage.data_directory".into(),
            })
    }

    /// Full path of the libSQL database, or `:memory:`.
    ///
    /// # Errors
    ///
    /// Same as [`data_dir`](Self::data_dir).
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if self.is_in_memory_database() {
            return Ok(PathBuf::from(IN_MEMORY_DATABASE));
        }
        Ok(self.data_dir()?.join(&self.database_name))
    }

    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.database_name".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.database_name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                field: "storage.database_name".into(),
                reason: "must be a file name; use data_directory for the location".into(),
            });
        }
        if self.default_collection.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.default_collection".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, StorageBackend::None);
        assert!(!config.is_configured());
        assert_eq!(config.database_name, "mesa.db");
        assert_eq!(config.default_collection, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn database_path_joins_directory_and_name() {
        let config = StorageConfig {
            data_directory: "/var/lib/mesa".into(),
            database_name: "lab.db".into(),
            ..StorageConfig::default()
        };
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/var/lib/mesa/lab.db")
        );
    }

    #[test]
    fn in_memory_database_ignores_directory() {
        let config = StorageConfig {
            data_directory: "/nowhere".into(),
            database_name: IN_MEMORY_DATABASE.into(),
            ..StorageConfig::default()
        };
        assert_eq!(config.database_path().unwrap(), PathBuf::from(":memory:"));
    }

    #[test]
    fn validate_rejects_paths_in_database_name() {
        let config = StorageConfig {
            database_name: "sub/dir.db".into(),
            ..StorageConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.database_name"), "{err}");
    }

    #[test]
    fn validate_rejects_blank_collection() {
        let config = StorageConfig {
            default_collection: "  ".into(),
            ..StorageConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn backend_names_match_their_serialized_form() {
        assert_eq!(StorageBackend::Libsql.to_string(), "libsql");
        assert_eq!(StorageBackend::None.to_string(), "none");
    }
}
