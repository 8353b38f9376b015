//! Typed query helpers for the project and override tables.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;
use crate::models::{Project, ProjectUserOverride, TransportType};
use crate::store::{OverrideStore, ProjectStore};

// ---------------------------------------------------------------------------
// Rows returned by listing queries
// ---------------------------------------------------------------------------

/// A row from the `projects` table.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub project: Project,
    pub created_at: String,
}

/// A row from the `project_users` table, without the stored password.
#[derive(Debug, Clone)]
pub struct OverrideRecord {
    pub project_code: String,
    pub username: String,
    pub updated_at: String,
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let transport: String = row.get(2)?;
    Ok(Project {
        code: row.get(0)?,
        url: row.get(1)?,
        transport_type: TransportType::from_str_val(&transport),
        description: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Database {
    // -- projects -----------------------------------------------------------

    /// Insert a project. Fails if the code is taken.
    pub fn insert_project(&self, project: &Project) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO projects (code, url, transport_type, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.code,
                project.url,
                project.transport_type.as_str(),
                project.description,
                now
            ],
        )?;
        debug!(code = %project.code, transport = %project.transport_type, "inserted project");
        Ok(())
    }

    /// Fetch a project by code.
    pub fn get_project(&self, code: &str) -> Result<Option<Project>, DatabaseError> {
        let conn = self.conn();
        let project = conn
            .query_row(
                "SELECT code, url, transport_type, description FROM projects WHERE code = ?1",
                params![code],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// All projects ordered by code.
    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT code, url, transport_type, description, created_at
             FROM projects ORDER BY code",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProjectRecord {
                    project: project_from_row(row)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete a project and its overrides. Returns `false` if it did not
    /// exist.
    pub fn delete_project(&self, code: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let changed = conn.execute("DELETE FROM projects WHERE code = ?1", params![code])?;
        debug!(code, changed, "deleted project");
        Ok(changed > 0)
    }

    // -- project_users ------------------------------------------------------

    /// Store (or replace) the encrypted override password for a user on a
    /// project.
    pub fn upsert_override(
        &self,
        project_code: &str,
        username: &str,
        encrypted_password: &str,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.transaction(|conn| {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM projects WHERE code = ?1",
                params![project_code],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(DatabaseError::NotFound {
                    entity: "project".into(),
                    id: project_code.into(),
                });
            }
            conn.execute(
                "INSERT INTO project_users (project_code, username, encrypted_password, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (project_code, username)
                 DO UPDATE SET encrypted_password = excluded.encrypted_password,
                               updated_at = excluded.updated_at",
                params![project_code, username, encrypted_password, now],
            )?;
            Ok(())
        })?;
        debug!(project_code, username, "stored password override");
        Ok(())
    }

    /// Fetch the override for a user on a project.
    pub fn get_override(
        &self,
        project_code: &str,
        username: &str,
    ) -> Result<Option<ProjectUserOverride>, DatabaseError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT project_code, username, encrypted_password
                 FROM project_users WHERE project_code = ?1 AND username = ?2",
                params![project_code, username],
                |row| {
                    Ok(ProjectUserOverride {
                        project_code: row.get(0)?,
                        username: row.get(1)?,
                        encrypted_password: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Remove an override. Returns `false` if none existed.
    pub fn delete_override(&self, project_code: &str, username: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let changed = conn.execute(
            "DELETE FROM project_users WHERE project_code = ?1 AND username = ?2",
            params![project_code, username],
        )?;
        Ok(changed > 0)
    }

    /// Users holding an override on `project_code`, ordered by username.
    pub fn list_overrides(&self, project_code: &str) -> Result<Vec<OverrideRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT project_code, username, updated_at FROM project_users
             WHERE project_code = ?1 ORDER BY username",
        )?;
        let rows = stmt
            .query_map(params![project_code], |row| {
                Ok(OverrideRecord {
                    project_code: row.get(0)?,
                    username: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl ProjectStore for Database {
    fn find_project(&self, code: &str) -> Result<Option<Project>, DatabaseError> {
        self.get_project(code)
    }
}

impl OverrideStore for Database {
    fn find_override(
        &self,
        project_code: &str,
        username: &str,
    ) -> Result<Option<ProjectUserOverride>, DatabaseError> {
        self.get_override(project_code, username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn demo() -> Project {
        Project {
            code: "demo".into(),
            url: " https://svn.example.com/demo <br/>".into(),
            transport_type: TransportType::Http,
            description: Some("Demo project".into()),
        }
    }

    #[test]
    fn test_project_insert_and_get() {
        let db = db();
        db.insert_project(&demo()).unwrap();
        let loaded = db.get_project("demo").unwrap().unwrap();
        assert_eq!(loaded, demo());
        assert!(db.get_project("missing").unwrap().is_none());
    }

    #[test]
    fn test_project_duplicate_code_rejected() {
        let db = db();
        db.insert_project(&demo()).unwrap();
        assert!(db.insert_project(&demo()).is_err());
    }

    #[test]
    fn test_list_projects_sorted() {
        let db = db();
        db.insert_project(&Project::new("zeta", "svn://h/z", TransportType::Svn))
            .unwrap();
        db.insert_project(&demo()).unwrap();
        let codes: Vec<_> = db
            .list_projects()
            .unwrap()
            .into_iter()
            .map(|r| r.project.code)
            .collect();
        assert_eq!(codes, ["demo", "zeta"]);
    }

    #[test]
    fn test_override_upsert_replaces() {
        let db = db();
        db.insert_project(&demo()).unwrap();
        db.upsert_override("demo", "alice", "first").unwrap();
        db.upsert_override("demo", "alice", "second").unwrap();

        let row = db.find_override("demo", "alice").unwrap().unwrap();
        assert_eq!(row.encrypted_password, "second");
        assert_eq!(db.list_overrides("demo").unwrap().len(), 1);
        assert!(db.find_override("demo", "bob").unwrap().is_none());
    }

    #[test]
    fn test_override_requires_project() {
        let db = db();
        let err = db.upsert_override("ghost", "alice", "x").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn test_delete_project_cascades() {
        let db = db();
        db.insert_project(&demo()).unwrap();
        db.upsert_override("demo", "alice", "x").unwrap();
        assert!(db.delete_project("demo").unwrap());
        assert!(!db.delete_project("demo").unwrap());
        assert!(db.find_override("demo", "alice").unwrap().is_none());
    }

    #[test]
    fn test_delete_override() {
        let db = db();
        db.insert_project(&demo()).unwrap();
        db.upsert_override("demo", "alice", "x").unwrap();
        assert!(db.delete_override("demo", "alice").unwrap());
        assert!(!db.delete_override("demo", "alice").unwrap());
    }
}
