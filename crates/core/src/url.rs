//! Repository URL handling.
//!
//! Stored project URLs are free text typed by administrators and frequently
//! carry markup (`<br/>`), parenthetical notes or trailing descriptions.
//! [`normalize_url`] reduces them to a single token; [`RepositoryUrl::parse`]
//! then validates the token and decides which transport serves it.

use std::path::{Path, PathBuf};

use crate::errors::RepositoryError;
use crate::transport::TransportKind;

/// Characters replaced by a single space before tokenising.
const SPACE_CHARS: [char; 4] = ['\t', '\r', '\n', '\u{8}'];

/// Characters deleted outright.
const STRIP_CHARS: [char; 2] = ['<', '('];

/// Reduce a stored project URL to its first token.
///
/// Steps, in order:
/// 1. Blank input yields `None`.
/// 2. Trim, then turn tab, CR, LF and backspace into spaces.
/// 3. Delete every `<` and `(` (the characters only; what follows stays).
/// 4. Trim again and keep everything before the first space.
///
/// The result can be `Some("")` when the input consisted only of stripped
/// characters; callers treat that exactly like `None`.
///
/// ```
/// use svnportal_core::url::normalize_url;
///
/// assert_eq!(normalize_url(" http://x/y <br/> ").as_deref(), Some("http://x/y"));
/// assert_eq!(normalize_url("http://x/y(note) more").as_deref(), Some("http://x/ynote)"));
/// assert_eq!(normalize_url("   "), None);
/// ```
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cleaned: String = trimmed
        .chars()
        .map(|c| if SPACE_CHARS.contains(&c) { ' ' } else { c })
        .filter(|c| !STRIP_CHARS.contains(c))
        .collect();

    let cleaned = cleaned.trim();
    let token = match cleaned.find(' ') {
        Some(pos) => &cleaned[..pos],
        None => cleaned,
    };
    Some(token.to_string())
}

/// Normalize a directory path for listing: blank means the repository root,
/// and a leading `/` is added when missing.
pub fn normalize_dir_path(path: &str) -> String {
    if path.trim().is_empty() {
        return "/".to_string();
    }
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Join a repository-absolute path onto a base URL.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

/// Build a `file://` URL for a local path, escaping `%` and spaces.
pub fn file_url_from_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ' ' => escaped.push_str("%20"),
            c => escaped.push(c),
        }
    }
    if escaped.starts_with('/') {
        format!("file://{}", escaped)
    } else {
        format!("file:///{}", escaped)
    }
}

/// A validated repository address with its transport already decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryUrl {
    url: String,
    kind: TransportKind,
}

impl RepositoryUrl {
    /// Validate a normalized URL.
    ///
    /// Accepts `http(s)://host/...`, `svn://host/...`, `svn+<tunnel>://host/...`,
    /// `file:///path` and bare absolute paths (converted to `file://`).
    pub fn parse(url: &str) -> Result<Self, RepositoryError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RepositoryError::Configuration(
                "repository URL must not be empty".into(),
            ));
        }

        if url.starts_with('/') {
            return Ok(Self {
                url: file_url_from_path(Path::new(url)),
                kind: TransportKind::Local,
            });
        }

        let (scheme, rest) = url.split_once("://").ok_or_else(|| {
            RepositoryError::Configuration(format!("'{}' is not a repository URL", url))
        })?;

        let valid_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(RepositoryError::Configuration(format!(
                "invalid URL scheme in '{}'",
                url
            )));
        }

        let scheme = scheme.to_ascii_lowercase();
        let kind = TransportKind::from_scheme(&scheme).ok_or_else(|| {
            RepositoryError::Configuration(format!("unsupported URL scheme '{}'", scheme))
        })?;

        match kind {
            TransportKind::Local => {
                if !(rest.starts_with('/') || rest.starts_with("localhost/")) {
                    return Err(RepositoryError::Configuration(format!(
                        "file URL '{}' must be absolute (file:///path)",
                        url
                    )));
                }
            }
            TransportKind::Dav | TransportKind::Svn => {
                let host = rest.split('/').next().unwrap_or("");
                if host.is_empty() {
                    return Err(RepositoryError::Configuration(format!(
                        "URL '{}' has no host",
                        url
                    )));
                }
            }
        }

        Ok(Self {
            url: format!("{}://{}", scheme, rest.trim_end_matches('/')),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Filesystem path behind a `file://` URL.
    pub fn local_path(&self) -> Option<PathBuf> {
        let rest = self.url.strip_prefix("file://")?;
        let rest = rest.strip_prefix("localhost").unwrap_or(rest);
        Some(PathBuf::from(percent_decode(rest)))
    }
}

impl std::fmt::Display for RepositoryUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(b) = decoded {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
