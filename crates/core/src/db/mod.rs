//! SQLite store for projects and per-project password overrides.
//!
//! Provides a [`Database`] handle with WAL-mode journaling, automatic schema
//! migrations, and the lookups behind [`crate::store::ProjectStore`] and
//! [`crate::store::OverrideStore`].

pub mod queries;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// Handle on the project database.
///
/// The connection sits behind a `Mutex` so the handle is `Send + Sync` and
/// can be shared as an `Arc<dyn ProjectStore>` and `Arc<dyn OverrideStore>`
/// at the same time.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path`, creating missing parent
    /// directories.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening project database");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        debug!("project database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), DatabaseError> {
        let conn = self.conn();
        schema::run_migrations(&conn)?;
        debug!("project schema is up to date");
        Ok(())
    }

    /// Lock the underlying connection, recovering from a poisoned mutex.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("database mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `f` inside a transaction; commit on `Ok`, roll back on `Err`.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().expect("failed to create in-memory db");
        db.initialize().expect("failed to initialize schema");
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(&path).expect("failed to create file db");
        db.initialize().expect("failed to initialize schema");
        assert!(path.exists());
    }

    #[test]
    fn test_transaction_commit() {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();

        db.transaction(|conn| {
            conn.execute(
                "INSERT INTO projects (code, url, transport_type, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params!["demo", "svn://h/demo", "svn", "2025-01-01T00:00:00Z"],
            )?;
            Ok(())
        })
        .unwrap();

        let url: String = db
            .conn()
            .query_row(
                "SELECT url FROM projects WHERE code = ?1",
                rusqlite::params!["demo"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(url, "svn://h/demo");
    }

    #[test]
    fn test_transaction_rollback() {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();

        let result: Result<(), DatabaseError> = db.transaction(|conn| {
            conn.execute(
                "INSERT INTO projects (code, url, transport_type, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params!["rollback", "svn://h/r", "svn", "2025-01-01T00:00:00Z"],
            )?;
            Err(DatabaseError::NotFound {
                entity: "test".into(),
                id: "forced".into(),
            })
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM projects WHERE code = ?1",
                rusqlite::params!["rollback"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }
}
