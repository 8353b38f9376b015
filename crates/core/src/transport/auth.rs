//! Authentication attached to a repository session.

use serde::{Deserialize, Serialize};

use crate::models::{ResolvedCredentials, Secret};

/// Whether the `svn` client may cache credentials on disk.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialCache {
    /// Never write credentials to the client's auth area.
    #[default]
    None,
    /// Leave caching to the client's standard behaviour.
    Default,
}

/// Username, plaintext password and caching strategy for one session.
#[derive(Debug, Clone)]
pub struct AuthManager {
    username: String,
    password: Secret,
    cache: CredentialCache,
}

impl AuthManager {
    pub fn new(credentials: ResolvedCredentials, cache: CredentialCache) -> Self {
        Self {
            username: credentials.username,
            password: credentials.password,
            cache,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }

    pub fn cache(&self) -> CredentialCache {
        self.cache
    }

    /// Arguments passing these credentials to the `svn` client.
    ///
    /// The password itself never appears on the command line; when one is
    /// set the client reads it from stdin (see [`Self::stdin_password`]).
    pub(crate) fn cli_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(4);
        if self.cache == CredentialCache::None {
            args.push("--no-auth-cache".to_string());
        }
        if !self.username.is_empty() {
            args.push("--username".to_string());
            args.push(self.username.clone());
        }
        if !self.password.is_empty() {
            args.push("--password-from-stdin".to_string());
        }
        args
    }

    /// Password to write to the client's stdin, if any.
    pub(crate) fn stdin_password(&self) -> Option<&str> {
        (!self.password.is_empty()).then(|| self.password.expose())
    }
}
