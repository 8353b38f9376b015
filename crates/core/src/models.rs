//! Domain model types used throughout svnportal.
//!
//! Projects, users and overrides are owned by other subsystems; this crate
//! only reads them. Credentials and directory entries are produced here.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// How a project's repository is served.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// Native `svn://` server.
    #[default]
    Svn,
    /// Plain HTTP(S) DAV access.
    Http,
    /// HTTP(S) shared across projects under one identity. Per-project
    /// password overrides are never applied to these projects.
    HttpMultiplexed,
}

impl TransportType {
    /// Parse a stored tag. Unknown tags fall back to [`TransportType::Svn`].
    pub fn from_str_val(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "https" => Self::Http,
            "http_multiplexed" | "http-multiplexed" | "http_mutil" => Self::HttpMultiplexed,
            _ => Self::Svn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Svn => "svn",
            Self::Http => "http",
            Self::HttpMultiplexed => "http_multiplexed",
        }
    }

    /// Whether project-specific password overrides may apply.
    pub fn allows_overrides(&self) -> bool {
        !matches!(self, Self::HttpMultiplexed)
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A managed project. The stored URL is free text and may carry markup or
/// trailing notes; see [`crate::url::normalize_url`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Unique short code.
    pub code: String,
    /// Repository URL as entered by an administrator.
    pub url: String,
    pub transport_type: TransportType,
    #[serde(default)]
    pub description: Option<String>,
}

impl Project {
    pub fn new(code: impl Into<String>, url: impl Into<String>, transport_type: TransportType) -> Self {
        Self {
            code: code.into(),
            url: url.into(),
            transport_type,
            description: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Users and credentials
// ---------------------------------------------------------------------------

/// A password held in memory. `Debug` never prints the content.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the plaintext. Use only at the point of handing it to a
    /// transport.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The user on whose behalf a repository is opened.
///
/// The password is the user's global credential, already in plaintext.
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub password: Secret,
}

impl User {
    pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A project-specific password for one user, encrypted at rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectUserOverride {
    pub project_code: String,
    pub username: String,
    pub encrypted_password: String,
}

/// The username/plaintext password pair used for a single connection
/// attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub username: String,
    pub password: Secret,
}

// ---------------------------------------------------------------------------
// Revisions and directory entries
// ---------------------------------------------------------------------------

/// Revision to operate at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Revision {
    /// The youngest revision.
    #[default]
    Head,
    Number(i64),
}

impl Revision {
    /// Map a raw number to a revision; negative values mean HEAD.
    pub fn from_number(n: i64) -> Self {
        if n < 0 {
            Self::Head
        } else {
            Self::Number(n)
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => write!(f, "HEAD"),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Node kind of a directory entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
    Unknown,
}

impl NodeKind {
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "file" => Self::File,
            "dir" => Self::Dir,
            _ => Self::Unknown,
        }
    }
}

/// One child of a listed directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// Repository-absolute path of the entry (e.g. `/trunk/src`).
    pub path: String,
    pub kind: NodeKind,
    /// Size in bytes; `None` for directories.
    pub size: Option<u64>,
    /// Revision in which the entry last changed.
    pub revision: Option<i64>,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
}
