//! Session backed by the `svn` client, shared by all three transports.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::auth::AuthManager;
use super::command::SvnCommand;
use super::parser::{parse_repository_root, parse_svn_list};
use super::RepositorySession;
use crate::errors::RepositoryError;
use crate::models::{DirEntry, Revision};
use crate::url::{join_url, RepositoryUrl};

pub(crate) struct CliSession {
    url: RepositoryUrl,
    command: SvnCommand,
    /// `None` for transports that do not authenticate (local files).
    auth: Option<AuthManager>,
    root: Option<String>,
}

impl CliSession {
    pub(crate) fn new(url: RepositoryUrl, command: SvnCommand, auth: Option<AuthManager>) -> Self {
        Self {
            url,
            command,
            auth,
            root: None,
        }
    }
}

#[async_trait]
impl RepositorySession for CliSession {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn repository_root(&mut self) -> Result<String, RepositoryError> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        let url = self.url.as_str();
        let pegged = format!("{}@", url);
        let xml = self
            .command
            .run(url, &["info", "--xml", &pegged], self.auth.as_ref())
            .await?;
        let root = parse_repository_root(url, &xml)?;
        debug!(%root, "resolved repository root");
        self.root = Some(root.clone());
        Ok(root)
    }

    /// `path` is relative to the repository root, not to the session URL.
    #[instrument(skip(self), fields(url = %self.url))]
    async fn list_dir(
        &mut self,
        path: &str,
        revision: Revision,
    ) -> Result<Vec<DirEntry>, RepositoryError> {
        let root = self.repository_root().await?;
        let target = join_url(&root, path);
        let rev = revision.to_string();
        // Always peg explicitly: svn treats the last `@` of a target as a peg
        // separator, so `release@2` must be passed as `release@2@`. Numbered
        // revisions peg at the same revision so paths deleted since resolve.
        let pegged = match revision {
            Revision::Head => format!("{}@", target),
            Revision::Number(n) => format!("{}@{}", target, n),
        };
        let xml = self
            .command
            .run(&target, &["list", "--xml", "-r", &rev, &pegged], self.auth.as_ref())
            .await?;
        Ok(parse_svn_list(path, &xml))
    }

    fn close(&mut self) {
        self.root = None;
        self.auth = None;
        debug!(url = %self.url, "svn client session released");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::models::{ResolvedCredentials, Secret};
    use crate::transport::command::write_recording_svn;
    use crate::transport::CredentialCache;

    fn session(dir: &std::path::Path, password: &str) -> CliSession {
        let binary = write_recording_svn(dir);
        let auth = AuthManager::new(
            ResolvedCredentials {
                username: "alice".into(),
                password: Secret::new(password),
            },
            CredentialCache::None,
        );
        CliSession::new(
            RepositoryUrl::parse("svn://h/r").unwrap(),
            SvnCommand::new(binary.to_string_lossy(), Duration::from_secs(10)),
            Some(auth),
        )
    }

    fn argv(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("argv.log"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_head_listing_escapes_at_sign() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), "pw");

        session
            .list_dir("/tags/release@2", Revision::Head)
            .await
            .unwrap();
        let args = argv(dir.path());
        assert_eq!(&args[..4], ["list", "--xml", "-r", "HEAD"]);
        assert_eq!(args[4], "svn://h/r/tags/release@2@");
    }

    #[tokio::test]
    async fn test_numbered_listing_pegs_revision() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), "pw");

        session
            .list_dir("/tags/release@2", Revision::Number(5))
            .await
            .unwrap();
        let args = argv(dir.path());
        assert_eq!(&args[..4], ["list", "--xml", "-r", "5"]);
        assert_eq!(args[4], "svn://h/r/tags/release@2@5");
    }

    #[tokio::test]
    async fn test_root_lookup_is_pegged_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), "pw");

        assert_eq!(session.repository_root().await.unwrap(), "svn://h/r");
        assert_eq!(argv(dir.path())[..3], ["info", "--xml", "svn://h/r@"]);

        std::fs::remove_file(dir.path().join("argv.log")).unwrap();
        assert_eq!(session.repository_root().await.unwrap(), "svn://h/r");
        assert!(!dir.path().join("argv.log").exists());
    }

    #[tokio::test]
    async fn test_password_is_sent_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), "hunter2");

        session.repository_root().await.unwrap();
        let args = argv(dir.path());
        assert!(args.iter().any(|a| a == "--password-from-stdin"));
        assert!(args.iter().all(|a| !a.contains("hunter2")));
        let stdin = std::fs::read_to_string(dir.path().join("stdin.log")).unwrap();
        assert_eq!(stdin, "hunter2\n");
    }
}
