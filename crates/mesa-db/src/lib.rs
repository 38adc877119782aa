//! # mesa-db
//!
//! Persistent storage for mesa entities on libSQL.
//!
//! [`MesaDb`] is the async handle: it owns the database and connection and
//! writes entity rows as JSON text, one main row per entity plus one row per
//! aux table. [`LibsqlStore`] wraps it behind the synchronous
//! [`Backend`](mesa_core::Backend) trait, and [`open_backend`] turns a
//! [`MesaConfig`](mesa_config::MesaConfig) into a ready
//! [`BackendRef`](mesa_core::BackendRef).
//!
//! Uses the `libsql` crate (C `SQLite` fork, v0.9.29) in local mode.

pub mod backends;
pub mod error;
pub mod helpers;
mod migrations;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use libsql::Builder;
use mesa_core::{NewRow, StoredRow};

pub use backends::{activate, open_backend, save_active, storage_mapping};
pub use error::DatabaseError;
pub use store::LibsqlStore;

use helpers::{dict_to_text, parse_datetime, parse_dict};

/// Central database handle for entity rows.
pub struct MesaDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl MesaDb {
    /// Open a local database at the given path, or `:memory:`.
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let mesa_db = Self { db, conn };
        mesa_db.run_migrations().await?;
        tracing::debug!(path, "opened libSQL database");
        Ok(mesa_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Write a main row and its aux rows in one transaction.
    ///
    /// Ids are assigned per table starting at 1 and never reused.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if any statement fails; nothing is written in
    /// that case.
    pub async fn insert_row(&self, row: &NewRow<'_>) -> Result<i64, DatabaseError> {
        let data = dict_to_text(&row.row)?;
        let tx = self.conn.transaction().await?;

        let id = {
            let mut rows = tx
                .query(
                    "INSERT INTO table_sequences (table_name, last_id) VALUES (?1, 1)
                     ON CONFLICT(table_name) DO UPDATE SET last_id = last_id + 1
                     RETURNING last_id",
                    [row.table],
                )
                .await?;
            let next = rows.next().await?.ok_or(DatabaseError::NoResult)?;
            next.get::<i64>(0)?
        };

        tx.execute(
            "INSERT INTO entity_rows (table_name, id, collection, entity_type, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            libsql::params![row.table, id, row.collection, row.entity_type, data],
        )
        .await?;

        for (aux_table, aux) in &row.aux {
            tx.execute(
                "INSERT INTO aux_rows (table_name, row_id, aux_table, data)
                 VALUES (?1, ?2, ?3, ?4)",
                libsql::params![row.table, id, *aux_table, dict_to_text(aux)?],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Fetch row `id` of `table` with its aux rows.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a query fails or stored data is not a JSON
    /// object.
    pub async fn fetch_row(&self, table: &str, id: i64) -> Result<Option<StoredRow>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT collection, entity_type, data FROM entity_rows
                 WHERE table_name = ?1 AND id = ?2",
                libsql::params![table, id],
            )
            .await?;
        let Some(main) = rows.next().await? else {
            return Ok(None);
        };
        let collection = main.get::<String>(0)?;
        let entity_type = main.get::<String>(1)?;
        let row = parse_dict(&main.get::<String>(2)?)?;

        let mut aux = BTreeMap::new();
        let mut aux_rows = self
            .conn
            .query(
                "SELECT aux_table, data FROM aux_rows
                 WHERE table_name = ?1 AND row_id = ?2",
                libsql::params![table, id],
            )
            .await?;
        while let Some(aux_row) = aux_rows.next().await? {
            aux.insert(aux_row.get::<String>(0)?, parse_dict(&aux_row.get::<String>(1)?)?);
        }

        Ok(Some(StoredRow {
            entity_type,
            collection,
            row,
            aux,
        }))
    }

    /// Ids of the rows of `table` saved under `collection`, in id order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn ids_in(&self, table: &str, collection: &str) -> Result<Vec<i64>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM entity_rows WHERE table_name = ?1 AND collection = ?2 ORDER BY id",
                [table, collection],
            )
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i64>(0)?);
        }
        Ok(ids)
    }

    /// Number of main rows stored in `table`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn row_count(&self, table: &str) -> Result<usize, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM entity_rows WHERE table_name = ?1", [table])
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        let count = row.get::<i64>(0)?;
        usize::try_from(count)
            .map_err(|e| DatabaseError::InvalidState(format!("row count {count}: {e}")))
    }

    /// When row `id` of `table` was written, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or the timestamp is malformed.
    pub async fn created_at(
        &self,
        table: &str,
        id: i64,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT created_at FROM entity_rows WHERE table_name = ?1 AND id = ?2",
                libsql::params![table, id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(parse_datetime(&row.get::<String>(0)?)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use mesa_core::Dict;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    async fn test_db() -> MesaDb {
        MesaDb::open_local(":memory:").await.unwrap()
    }

    fn dict(pairs: &[(&str, serde_json::Value)]) -> Dict {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn new_row<'a>(table: &'a str, collection: &'a str, name: &str) -> NewRow<'a> {
        NewRow {
            collection,
            table,
            entity_type: "Calibration",
            row: dict(&[("name", json!(name))]),
            aux: Vec::new(),
        }
    }

    #[tokio::test]
    async fn open_local_creates_schema() {
        let db = test_db().await;
        for table in ["schema_migrations", "table_sequences", "entity_rows", "aux_rows"] {
            let mut rows = db
                .conn()
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap();
            assert!(row.is_some(), "table '{table}' should exist");
        }
    }

    #[tokio::test]
    async fn ids_count_per_table_from_one() {
        let db = test_db().await;
        assert_eq!(db.insert_row(&new_row("calibration", "default", "a")).await.unwrap(), 1);
        assert_eq!(db.insert_row(&new_row("calibration", "default", "b")).await.unwrap(), 2);
        assert_eq!(db.insert_row(&new_row("measurement", "default", "m")).await.unwrap(), 1);
        assert_eq!(db.row_count("calibration").await.unwrap(), 2);
        assert_eq!(db.row_count("data_series").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fetch_returns_main_and_aux_rows() {
        let db = test_db().await;
        let row = NewRow {
            collection: "project",
            table: "measurement",
            entity_type: "ECMSMeasurement",
            row: dict(&[("name", json!("run")), ("mesa_metadata", json!({"k": 1}))]),
            aux: vec![
                ("ec_measurements", dict(&[("ec_technique", json!("CA"))])),
                ("ms_measurements", dict(&[("tspan_bg", json!([0.0, 10.0]))])),
            ],
        };
        let id = db.insert_row(&row).await.unwrap();

        let stored = db.fetch_row("measurement", id).await.unwrap().unwrap();
        assert_eq!(stored.entity_type, "ECMSMeasurement");
        assert_eq!(stored.collection, "project");
        assert_eq!(stored.row, row.row);
        assert_eq!(
            stored.aux.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["ec_measurements", "ms_measurements"]
        );
        assert_eq!(stored.aux["ec_measurements"]["ec_technique"], "CA");
    }

    #[tokio::test]
    async fn missing_rows_are_none() {
        let db = test_db().await;
        db.insert_row(&new_row("calibration", "default", "a")).await.unwrap();
        assert!(db.fetch_row("calibration", 2).await.unwrap().is_none());
        assert!(db.fetch_row("measurement", 1).await.unwrap().is_none());
        assert!(db.created_at("calibration", 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ids_in_filters_by_collection() {
        let db = test_db().await;
        for collection in ["a", "b", "a"] {
            db.insert_row(&new_row("calibration", collection, "x")).await.unwrap();
        }
        assert_eq!(db.ids_in("calibration", "a").await.unwrap(), vec![1, 3]);
        assert_eq!(db.ids_in("calibration", "c").await.unwrap(), Vec::<i64>::new());
    }

    #[tokio::test]
    async fn created_at_is_recorded() {
        let db = test_db().await;
        let before = Utc::now() - chrono::Duration::seconds(5);
        let id = db.insert_row(&new_row("calibration", "default", "a")).await.unwrap();
        let created = db.created_at("calibration", id).await.unwrap().unwrap();
        assert!(created >= before, "{created} < {before}");
    }

    #[tokio::test]
    async fn corrupt_row_data_is_a_query_error() {
        let db = test_db().await;
        db.conn()
            .execute(
                "INSERT INTO entity_rows (table_name, id, collection, entity_type, data)
                 VALUES ('calibration', 1, 'default', 'Calibration', '[1]')",
                (),
            )
            .await
            .unwrap();
        let err = db.fetch_row("calibration", 1).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)), "{err}");
    }
}
