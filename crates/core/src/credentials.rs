//! Credential resolution for a project and the current user.
//!
//! The user's global password applies unless the project carries an
//! encrypted, project-specific override for that user. Overrides are never
//! consulted for [`TransportType::HttpMultiplexed`] projects.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::crypto::PasswordCipher;
use crate::errors::RepositoryError;
use crate::models::{Project, ResolvedCredentials, Secret, TransportType, User};
use crate::store::OverrideStore;
use crate::url::normalize_url;

/// Resolves which username/password pair opens a project's repository.
pub struct CredentialResolver {
    overrides: Arc<dyn OverrideStore>,
    cipher: Arc<dyn PasswordCipher>,
}

impl CredentialResolver {
    pub fn new(overrides: Arc<dyn OverrideStore>, cipher: Arc<dyn PasswordCipher>) -> Self {
        Self { overrides, cipher }
    }

    /// Resolve credentials for `user` against `project`.
    ///
    /// Fails with [`RepositoryError::Configuration`] when the project has no
    /// usable URL and with [`RepositoryError::Credential`] when an override
    /// cannot be decrypted.
    #[instrument(skip(self, project, user), fields(project = %project.code, username = %user.username))]
    pub fn resolve(
        &self,
        project: &Project,
        user: &User,
    ) -> Result<ResolvedCredentials, RepositoryError> {
        let has_url = normalize_url(&project.url).is_some_and(|u| !u.is_empty());
        if !has_url {
            return Err(RepositoryError::Configuration(format!(
                "project '{}' has no repository URL",
                project.code
            )));
        }

        let mut password = user.password.clone();

        if project.transport_type.allows_overrides() {
            if let Some(row) = self
                .overrides
                .find_override(&project.code, &user.username)?
            {
                password = Secret::new(self.cipher.decrypt(&row.encrypted_password)?);
                debug!("using project-specific password override");
            }
        } else {
            debug_assert_eq!(project.transport_type, TransportType::HttpMultiplexed);
            debug!("multiplexed transport, overrides not consulted");
        }

        Ok(ResolvedCredentials {
            username: user.username.clone(),
            password,
        })
    }
}
