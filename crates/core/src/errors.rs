//! Error types for the svnportal core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Repository access errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong between a project code and a directory
/// listing.
///
/// Authentication rejections are kept apart from other transport failures so
/// callers can render "access denied" differently from "unreachable".
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The project has no usable URL, or the URL cannot be dispatched.
    #[error("repository configuration error: {0}")]
    Configuration(String),

    /// No project is registered under the given code.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// A project-specific password could not be decrypted.
    #[error("credential error: {0}")]
    Credential(#[from] CryptoError),

    /// The server rejected the supplied credentials.
    #[error("access denied to '{url}': {detail}")]
    AccessDenied { url: String, detail: String },

    /// Any other transport or protocol failure, including timeouts.
    #[error("repository access failed for '{url}': {detail}")]
    Access { url: String, detail: String },

    /// The project or override lookup failed.
    #[error("repository store error: {0}")]
    Store(#[from] DatabaseError),
}

impl RepositoryError {
    /// True when the server refused the credentials.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    pub(crate) fn access(url: &str, detail: impl Into<String>) -> Self {
        Self::Access {
            url: url.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn denied(url: &str, detail: impl Into<String>) -> Self {
        Self::AccessDenied {
            url: url.to_string(),
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Crypto errors
// ---------------------------------------------------------------------------

/// Errors from the stored-password cipher.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The configured key is not a base64-encoded 32-byte key.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    /// No key was configured but an encrypt/decrypt was requested.
    #[error("encryption key is not configured (set the variable named by crypto.key_env)")]
    KeyMissing,

    /// The stored value is not valid base64 or is too short to hold a nonce.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// Authentication tag mismatch: wrong key or tampered value.
    #[error("decryption failed (wrong key or corrupted value)")]
    DecryptionFailed,

    /// Encryption itself failed.
    #[error("encryption failed")]
    EncryptionFailed,

    /// The decrypted bytes are not UTF-8.
    #[error("decrypted password is not valid UTF-8")]
    InvalidUtf8,
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
