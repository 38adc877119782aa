//! Database migration runner.
//!
//! Embeds the SQL migration files at compile time and executes them on
//! database open. All statements use `IF NOT EXISTS`, so re-running is safe;
//! applied versions are recorded in `schema_migrations`.

use crate::MesaDb;
use crate::error::DatabaseError;

/// Entity rows, aux rows, and per-table id sequences.
const MIGRATION_001: &str = include_str!("../migrations/001_initial.sql");

const MIGRATIONS: &[(i64, &str, &str)] = &[(1, "001_initial", MIGRATION_001)];

impl MesaDb {
    /// Run all embedded migrations in sequence.
    pub(crate) async fn run_migrations(&self) -> Result<(), DatabaseError> {
        for (version, name, sql) in MIGRATIONS {
            self.conn
                .execute_batch(sql)
                .await
                .map_err(|e| DatabaseError::Migration(format!("{name}: {e}")))?;

            let recorded = self
                .conn
                .execute(
                    "INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    libsql::params![*version, *name],
                )
                .await
                .map_err(|e| DatabaseError::Migration(format!("{name}: {e}")))?;
            if recorded == 0 {
                tracing::debug!(migration = name, "migration already applied");
            } else {
                tracing::debug!(migration = name, "migration applied");
            }
        }
        Ok(())
    }

    /// Versions recorded in `schema_migrations`, ascending.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn applied_migrations(&self) -> Result<Vec<i64>, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT version FROM schema_migrations ORDER BY version", ())
            .await?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next().await? {
            versions.push(row.get::<i64>(0)?);
        }
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::MesaDb;

    #[tokio::test]
    async fn migrations_are_recorded_once() {
        let db = MesaDb::open_local(":memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        assert_eq!(db.applied_migrations().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn reopening_a_file_keeps_the_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mesa.db");
        let path = path.to_str().unwrap();

        drop(MesaDb::open_local(path).await.unwrap());
        let db = MesaDb::open_local(path).await.unwrap();
        assert_eq!(db.applied_migrations().await.unwrap(), vec![1]);
    }
}
