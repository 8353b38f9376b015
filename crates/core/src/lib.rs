//! svnportal core library.
//!
//! Opens Subversion repositories on behalf of portal users: project URLs are
//! normalized, per-project password overrides are resolved and decrypted,
//! and a transport is chosen by URL scheme. Sessions are always closed once
//! an operation completes.

pub mod config;
pub mod credentials;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod models;
pub mod operations;
pub mod service;
pub mod store;
pub mod transport;
pub mod url;

// Re-exports for convenience.
pub use config::AppConfig;
pub use credentials::CredentialResolver;
pub use crypto::{AesGcmCipher, MissingKeyCipher, PasswordCipher};
pub use db::Database;
pub use errors::{CoreError, RepositoryError};
pub use models::{DirEntry, Project, Revision, TransportType, User};
pub use service::RepositoryService;
pub use transport::{initialize_transports, RepositoryHandle, TransportRegistry};
pub use url::normalize_url;
