//! Project-level repository access.
//!
//! [`RepositoryService`] ties project lookup, URL normalization, credential
//! resolution and transport dispatch together. Every handle it opens on the
//! caller's behalf is closed before the call returns, on success and on
//! failure alike.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::config::TransportConfig;
use crate::credentials::CredentialResolver;
use crate::crypto::PasswordCipher;
use crate::errors::RepositoryError;
use crate::models::{DirEntry, Project, Revision, User};
use crate::operations;
use crate::store::{OverrideStore, ProjectStore};
use crate::transport::{self, AuthManager, RepositoryHandle, TransportRegistry};
use crate::url::{normalize_dir_path, normalize_url, RepositoryUrl};

/// Entry point for opening and reading project repositories.
pub struct RepositoryService {
    projects: Arc<dyn ProjectStore>,
    credentials: CredentialResolver,
    transports: Arc<TransportRegistry>,
    transport_config: TransportConfig,
}

impl RepositoryService {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        overrides: Arc<dyn OverrideStore>,
        cipher: Arc<dyn PasswordCipher>,
        transports: Arc<TransportRegistry>,
        transport_config: TransportConfig,
    ) -> Self {
        Self {
            projects,
            credentials: CredentialResolver::new(overrides, cipher),
            transports,
            transport_config,
        }
    }

    /// Open the repository of the project registered under `code`.
    ///
    /// Returns `Ok(None)` (and logs a warning) when no such project exists.
    pub async fn get_repository_by_code(
        &self,
        code: &str,
        user: &User,
    ) -> Result<Option<RepositoryHandle>, RepositoryError> {
        let Some(project) = self.projects.find_project(code)? else {
            warn!(project = code, "project not found");
            return Ok(None);
        };
        self.get_repository(&project, user).await.map(Some)
    }

    /// Open `project`'s repository as `user`.
    ///
    /// The caller owns the returned handle; dropping it closes the session.
    #[instrument(skip(self, project, user), fields(project = %project.code, username = %user.username))]
    pub async fn get_repository(
        &self,
        project: &Project,
        user: &User,
    ) -> Result<RepositoryHandle, RepositoryError> {
        let url = normalize_url(&project.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                RepositoryError::Configuration(format!(
                    "project '{}' has no repository URL",
                    project.code
                ))
            })?;
        let credentials = self.credentials.resolve(project, user)?;
        let url = RepositoryUrl::parse(&url)?;
        let auth = AuthManager::new(credentials, self.transport_config.credential_cache);
        self.transports.open(&url, auth).await
    }

    /// Root URL of `project`'s repository, or `None` on any failure.
    pub async fn get_repository_root(&self, project: &Project, user: &User) -> Option<String> {
        let mut handle = match self.get_repository(project, user).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(project = %project.code, error = %e, "could not open repository");
                return None;
            }
        };
        let root = operations::get_root(&mut handle).await;
        handle.close();
        root
    }

    /// List `path` in the project's repository at HEAD.
    pub async fn list_directory(
        &self,
        code: &str,
        path: &str,
        user: &User,
    ) -> Result<Vec<DirEntry>, RepositoryError> {
        self.list_directory_at(code, path, Revision::Head, user)
            .await
    }

    /// List `path` in the project's repository at `revision`.
    ///
    /// Authentication failures surface as [`RepositoryError::AccessDenied`];
    /// other transport failures as [`RepositoryError::Access`].
    pub async fn list_directory_at(
        &self,
        code: &str,
        path: &str,
        revision: Revision,
        user: &User,
    ) -> Result<Vec<DirEntry>, RepositoryError> {
        let path = normalize_dir_path(path);
        let mut handle = match self.get_repository_by_code(code, user).await {
            Ok(Some(handle)) => handle,
            Ok(None) => return Err(RepositoryError::ProjectNotFound(code.to_string())),
            Err(e) => {
                error!(project = code, error = %e, "could not open repository");
                return Err(e);
            }
        };
        let result = operations::list_directory(&mut handle, &path, revision).await;
        handle.close();
        result
    }

    /// Create an empty repository at `path` and return its `file://` URL.
    pub async fn create_local_repository(&self, path: &Path) -> Result<String, RepositoryError> {
        let url = transport::create_local_repository(&self.transport_config, path).await?;
        info!(path = %path.display(), %url, "local repository ready");
        Ok(url)
    }
}
