//! Transport selection and scoped repository sessions.
//!
//! A [`TransportRegistry`] maps each [`TransportKind`] to one [`Transport`].
//! Opening a URL yields a [`RepositoryHandle`] that owns the session and
//! closes it exactly once, either explicitly or on drop.

pub mod auth;
mod command;
pub mod dav;
pub mod local;
pub mod parser;
mod session;
pub mod svn;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::config::TransportConfig;
use crate::errors::RepositoryError;
use crate::models::{DirEntry, Revision};
use crate::url::{normalize_dir_path, RepositoryUrl};

pub use auth::{AuthManager, CredentialCache};
pub use dav::DavTransport;
pub use local::{create_local_repository, LocalTransport};
pub use svn::SvnTransport;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The three families of repository access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// `http://` and `https://` (WebDAV/DeltaV).
    Dav,
    /// `svn://` and `svn+<tunnel>://`.
    Svn,
    /// `file://` repositories on local disk.
    Local,
}

impl TransportKind {
    /// Pick the transport family for a lowercase URL scheme.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" | "https" => Some(Self::Dav),
            "svn" => Some(Self::Svn),
            s if s.starts_with("svn+") && s.len() > 4 => Some(Self::Svn),
            "file" => Some(Self::Local),
            _ => None,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dav => write!(f, "dav"),
            Self::Svn => write!(f, "svn"),
            Self::Local => write!(f, "local"),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Factory for sessions of one transport family.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Open a session with `auth` attached. No operation has been performed
    /// on the returned session yet.
    async fn open(
        &self,
        url: &RepositoryUrl,
        auth: AuthManager,
    ) -> Result<Box<dyn RepositorySession>, RepositoryError>;
}

/// An open, authenticated connection to one repository.
#[async_trait]
pub trait RepositorySession: Send {
    /// Canonical root URL of the repository.
    async fn repository_root(&mut self) -> Result<String, RepositoryError>;

    /// Children of `path` (repository-absolute, starting with `/`) at
    /// `revision`.
    async fn list_dir(
        &mut self,
        path: &str,
        revision: Revision,
    ) -> Result<Vec<DirEntry>, RepositoryError>;

    /// Release the session. Called exactly once by [`RepositoryHandle`].
    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// State of a [`RepositoryHandle`]. Handles only exist once a session is
/// open; the unopened and authenticating stages happen inside
/// [`TransportRegistry::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Exclusive owner of an open session.
///
/// The session is closed by [`RepositoryHandle::close`] or, failing that,
/// when the handle is dropped; never twice.
pub struct RepositoryHandle {
    url: RepositoryUrl,
    session: Box<dyn RepositorySession>,
    state: SessionState,
}

impl RepositoryHandle {
    pub fn new(url: RepositoryUrl, session: Box<dyn RepositorySession>) -> Self {
        Self {
            url,
            session,
            state: SessionState::Open,
        }
    }

    pub fn url(&self) -> &RepositoryUrl {
        &self.url
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Resolve the repository root URL.
    pub async fn repository_root(&mut self) -> Result<String, RepositoryError> {
        self.ensure_open()?;
        self.session.repository_root().await
    }

    /// List a directory. Blank paths mean the root; a leading `/` is added
    /// when missing.
    pub async fn list_dir(
        &mut self,
        path: &str,
        revision: Revision,
    ) -> Result<Vec<DirEntry>, RepositoryError> {
        self.ensure_open()?;
        let path = normalize_dir_path(path);
        let mut entries = self.session.list_dir(&path, revision).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Close the session. Further calls are no-ops.
    pub fn close(&mut self) {
        if self.state == SessionState::Open {
            self.session.close();
            self.state = SessionState::Closed;
            debug!(url = %self.url, "repository session closed");
        }
    }

    fn ensure_open(&self) -> Result<(), RepositoryError> {
        if self.state == SessionState::Open {
            Ok(())
        } else {
            Err(RepositoryError::access(
                self.url.as_str(),
                "repository session is closed",
            ))
        }
    }
}

impl Drop for RepositoryHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for RepositoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryHandle")
            .field("url", &self.url)
            .field("state", &self.state)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// One transport per [`TransportKind`].
#[derive(Default)]
pub struct TransportRegistry {
    transports: HashMap<TransportKind, Arc<dyn Transport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `svn`-client backed DAV, svn and local transports.
    pub fn with_cli_transports(config: &TransportConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DavTransport::new(config)));
        registry.register(Arc::new(SvnTransport::new(config)));
        registry.register(Arc::new(LocalTransport::new(config)));
        registry
    }

    /// Register `transport` for its kind. The first registration wins;
    /// returns `false` if the kind was already registered.
    pub fn register(&mut self, transport: Arc<dyn Transport>) -> bool {
        let kind = transport.kind();
        if self.transports.contains_key(&kind) {
            debug!(%kind, "transport already registered");
            return false;
        }
        self.transports.insert(kind, transport);
        true
    }

    pub fn is_registered(&self, kind: TransportKind) -> bool {
        self.transports.contains_key(&kind)
    }

    /// Open `url` with `auth` attached, dispatching on the URL's transport
    /// kind.
    #[instrument(skip(self, auth), fields(url = %url, kind = %url.kind(), username = %auth.username()))]
    pub async fn open(
        &self,
        url: &RepositoryUrl,
        auth: AuthManager,
    ) -> Result<RepositoryHandle, RepositoryError> {
        let transport = self.transports.get(&url.kind()).ok_or_else(|| {
            warn!("no transport registered");
            RepositoryError::Configuration(format!(
                "no transport registered for {} URLs",
                url.kind()
            ))
        })?;

        debug!("attaching authentication");
        let session = transport.open(url, auth).await?;
        debug!("repository session opened");
        Ok(RepositoryHandle::new(url.clone(), session))
    }
}

static REGISTRY: OnceLock<Arc<TransportRegistry>> = OnceLock::new();

/// Register the DAV, svn and local transports for the whole process.
///
/// Must run before the first repository access. Later calls return the
/// registry built by the first one and ignore `config`.
pub fn initialize_transports(config: &TransportConfig) -> Arc<TransportRegistry> {
    REGISTRY
        .get_or_init(|| {
            info!("registering repository transports (dav, svn, local)");
            Arc::new(TransportRegistry::with_cli_transports(config))
        })
        .clone()
}

/// The process-wide registry, if [`initialize_transports`] has run.
pub fn registered_transports() -> Option<Arc<TransportRegistry>> {
    REGISTRY.get().cloned()
}
