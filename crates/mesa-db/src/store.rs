//! Blocking [`Backend`] over the async libSQL handle.
//!
//! The core layer is synchronous, so the store owns a current-thread tokio
//! runtime and blocks on every driver call. It refuses to run from inside
//! another runtime instead of panicking there.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use mesa_config::IN_MEMORY_DATABASE;
use mesa_core::{Backend, NewRow, StorageMapping, StoredRow};
use tokio::runtime::{Builder, Handle, Runtime};

use crate::MesaDb;
use crate::error::DatabaseError;

static NEXT_MEMORY_KEY: AtomicU64 = AtomicU64::new(1);

/// Persistent backend on a libSQL database.
///
/// File stores are keyed by the canonical path of their database, so two
/// stores opened on the same file share a key however the path was spelled,
/// and identities saved through one compare equal to identities loaded
/// through the other. Every `:memory:` store gets a key of its own.
///
/// Drop the store outside of any async runtime; dropping a runtime inside
/// one panics.
pub struct LibsqlStore {
    key: String,
    mapping: Arc<dyn StorageMapping>,
    db: MesaDb,
    runtime: Runtime,
}

impl LibsqlStore {
    /// Open (and migrate) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` when called from inside an async
    /// runtime, or any error from [`MesaDb::open_local`].
    pub fn open(path: &str, mapping: Arc<dyn StorageMapping>) -> Result<Self, DatabaseError> {
        ensure_blocking_allowed()?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DatabaseError::Other(e.into()))?;
        let db = runtime.block_on(MesaDb::open_local(path))?;

        let key = if path == IN_MEMORY_DATABASE {
            let n = NEXT_MEMORY_KEY.fetch_add(1, Ordering::Relaxed);
            format!("libsql-memory-{n}")
        } else {
            let canonical = std::fs::canonicalize(path)
                .with_context(|| format!("resolving database path {path}"))?;
            format!("libsql:{}", canonical.display())
        };
        tracing::debug!(backend = %key, "opened libSQL store");

        Ok(Self {
            key,
            mapping,
            db,
            runtime,
        })
    }

    /// The async handle, for queries the [`Backend`] trait does not cover.
    #[must_use]
    pub const fn db(&self) -> &MesaDb {
        &self.db
    }

    /// Number of main rows stored in `table`.
    ///
    /// # Errors
    ///
    /// Same as [`MesaDb::row_count`], plus `InvalidState` inside a runtime.
    pub fn row_count(&self, table: &str) -> Result<usize, DatabaseError> {
        self.block_on(self.db.row_count(table))?
    }

    /// Ids of the rows of `table` saved under `collection`, in id order.
    ///
    /// # Errors
    ///
    /// Same as [`MesaDb::ids_in`], plus `InvalidState` inside a runtime.
    pub fn ids_in(&self, table: &str, collection: &str) -> Result<Vec<i64>, DatabaseError> {
        self.block_on(self.db.ids_in(table, collection))?
    }

    fn block_on<F: Future>(&self, future: F) -> Result<F::Output, DatabaseError> {
        ensure_blocking_allowed()?;
        Ok(self.runtime.block_on(future))
    }
}

fn ensure_blocking_allowed() -> Result<(), DatabaseError> {
    if Handle::try_current().is_ok() {
        return Err(DatabaseError::InvalidState(
            "LibsqlStore blocks on I/O and cannot be used from inside an async runtime".into(),
        ));
    }
    Ok(())
}

impl Backend for LibsqlStore {
    fn key(&self) -> &str {
        &self.key
    }

    fn mapping(&self) -> &dyn StorageMapping {
        self.mapping.as_ref()
    }

    fn insert(&self, row: NewRow<'_>) -> mesa_core::Result<i64> {
        let id = self.block_on(self.db.insert_row(&row))??;
        tracing::debug!(backend = %self.key, table = row.table, id, "inserted row");
        Ok(id)
    }

    fn fetch(&self, table: &str, id: i64) -> mesa_core::Result<Option<StoredRow>> {
        Ok(self.block_on(self.db.fetch_row(table, id))??)
    }
}

impl fmt::Debug for LibsqlStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibsqlStore")
            .field("key", &self.key)
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}
