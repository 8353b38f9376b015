//! Read-only lookups of project records owned by project administration.
//!
//! [`crate::db::Database`] implements both traits; tests and embedders may
//! supply their own.

use crate::errors::DatabaseError;
use crate::models::{Project, ProjectUserOverride};

/// Lookup of projects by code.
pub trait ProjectStore: Send + Sync {
    fn find_project(&self, code: &str) -> Result<Option<Project>, DatabaseError>;
}

/// Lookup of project-specific password overrides.
pub trait OverrideStore: Send + Sync {
    fn find_override(
        &self,
        project_code: &str,
        username: &str,
    ) -> Result<Option<ProjectUserOverride>, DatabaseError>;
}
