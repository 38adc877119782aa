//! Backend selection from configuration.

use std::sync::Arc;

use anyhow::Context;
use mesa_config::{MesaConfig, StorageBackend};
use mesa_core::{
    ActiveBackend, BackendRef, CoreError, MappingRegistry, MemoryBackend, Saveable, StorageMapping,
};
use mesa_schema::StorageRegistry;

use crate::error::DatabaseError;
use crate::store::LibsqlStore;

/// Entity type mapping for `config`: schema-checked unless
/// `general.validate_rows` is off.
///
/// # Errors
///
/// Returns `DatabaseError::Core` if a schema cannot be generated.
pub fn storage_mapping(config: &MesaConfig) -> Result<Arc<dyn StorageMapping>, DatabaseError> {
    if config.general.validate_rows {
        let registry = StorageRegistry::standard().map_err(CoreError::from)?;
        Ok(Arc::new(registry))
    } else {
        Ok(Arc::new(MappingRegistry::standard()))
    }
}

/// Build the backend `config.storage` selects.
///
/// A file database gets its directory created first.
///
/// # Errors
///
/// - `DatabaseError::Config` if the data directory cannot be determined.
/// - `DatabaseError::Other` if the directory cannot be created.
/// - Any error from [`LibsqlStore::open`].
pub fn open_backend(config: &MesaConfig) -> Result<BackendRef, DatabaseError> {
    let backend = match config.storage.backend {
        StorageBackend::None => BackendRef::None,
        StorageBackend::Memory => BackendRef::memory(MemoryBackend::new(storage_mapping(config)?)),
        StorageBackend::Libsql => {
            let path = config.storage.database_path()?;
            if !config.storage.is_in_memory_database() {
                let dir = config.storage.data_dir()?;
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("creating data directory {}", dir.display()))?;
            }
            let path = path.to_str().ok_or_else(|| {
                DatabaseError::InvalidState(format!(
                    "database path is not valid UTF-8: {}",
                    path.display()
                ))
            })?;
            BackendRef::persistent(LibsqlStore::open(path, storage_mapping(config)?)?)
        }
    };
    tracing::debug!(kind = %config.storage.backend, backend = backend.key(), "opened backend");
    Ok(backend)
}

/// Open the configured backend and make it the active one.
///
/// Returns the backend that was active before.
///
/// # Errors
///
/// Same as [`open_backend`]; the active backend is unchanged on error.
pub fn activate(config: &MesaConfig, active: &ActiveBackend) -> Result<BackendRef, DatabaseError> {
    let backend = open_backend(config)?;
    tracing::info!(backend = backend.key(), "activating backend");
    Ok(active.select(backend))
}

/// Save `entity` to the active backend under the configured default
/// collection.
///
/// # Errors
///
/// Returns `DatabaseError::Core` if no backend is active or the save fails.
pub fn save_active<T: Saveable>(
    entity: &mut T,
    config: &MesaConfig,
    active: &ActiveBackend,
) -> Result<(), DatabaseError> {
    let backend = active.resolve(None)?;
    entity.save(&backend, &config.storage.default_collection)?;
    Ok(())
}
