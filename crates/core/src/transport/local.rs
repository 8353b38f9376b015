//! `file://` access to repositories on local disk, and creation of new ones.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::auth::AuthManager;
use super::command::SvnCommand;
use super::session::CliSession;
use super::{RepositorySession, Transport, TransportKind};
use crate::config::TransportConfig;
use crate::errors::RepositoryError;
use crate::url::{file_url_from_path, RepositoryUrl};

/// Hook installed into new repositories so revision properties can be edited.
const PRE_REVPROP_CHANGE_HOOK: &str = "#!/bin/sh\nexit 0\n";

pub struct LocalTransport {
    command: SvnCommand,
}

impl LocalTransport {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            command: SvnCommand::new(&config.svn_binary, config.read_timeout()),
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    /// Local repositories are not authenticated; `auth` is dropped once the
    /// repository directory has been located.
    async fn open(
        &self,
        url: &RepositoryUrl,
        auth: AuthManager,
    ) -> Result<Box<dyn RepositorySession>, RepositoryError> {
        let path = url
            .local_path()
            .ok_or_else(|| RepositoryError::Configuration(format!("'{}' is not a file URL", url)))?;
        let repo_root = find_repository_dir(&path).ok_or_else(|| {
            RepositoryError::access(
                url.as_str(),
                format!("no repository found at {}", path.display()),
            )
        })?;
        debug!(%url, root = %repo_root.display(), user = auth.username(), "opening local session");
        Ok(Box::new(CliSession::new(url.clone(), self.command.clone(), None)))
    }
}

/// Walk up from `path` to the directory holding the repository's `format`
/// file and `db` directory.
fn find_repository_dir(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|dir| dir.join("format").is_file() && dir.join("db").is_dir())
        .map(Path::to_path_buf)
}

/// Create an empty FSFS repository at `path` and return its `file://` URL.
///
/// Revision property changes are enabled via a permissive
/// `pre-revprop-change` hook. An existing repository at `path` is an error.
#[instrument(skip(config), fields(path = %path.display()))]
pub async fn create_local_repository(
    config: &TransportConfig,
    path: &Path,
) -> Result<String, RepositoryError> {
    let display = path.display().to_string();
    let fail = |detail: String| RepositoryError::Access {
        url: display.clone(),
        detail: format!("failed to create repository at {}: {}", display, detail),
    };

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| fail(e.to_string()))?
            .join(path)
    };

    let mut cmd = Command::new(&config.svnadmin_binary);
    cmd.arg("create")
        .arg(&absolute)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let timeout: Duration = config.read_timeout();
    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                fail(format!("svnadmin binary not found: {}", config.svnadmin_binary))
            } else {
                fail(e.to_string())
            }
        })?,
        Err(_) => return Err(fail(format!("timed out after {}s", timeout.as_secs()))),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(%stderr, "svnadmin create failed");
        return Err(fail(stderr));
    }

    install_revprop_hook(&absolute).map_err(|e| fail(e.to_string()))?;

    let canonical = std::fs::canonicalize(&absolute).unwrap_or(absolute);
    let url = file_url_from_path(&canonical);
    info!(%url, "created local repository");
    Ok(url)
}

fn install_revprop_hook(repo: &Path) -> std::io::Result<()> {
    let hook = repo.join("hooks").join("pre-revprop-change");
    std::fs::write(&hook, PRE_REVPROP_CHANGE_HOOK)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
