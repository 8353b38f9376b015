//! Invocation of the `svn` command-line client.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex_lite::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::auth::AuthManager;
use crate::errors::RepositoryError;

/// Subversion error codes meaning the server refused the credentials.
const AUTH_ERROR_CODES: &[&str] = &[
    "E170001", // Authorization failed
    "E215004", // No more credentials or we tried too many times
    "E175013", // Access forbidden (DAV 403)
    "E220001", // Item is not readable
];

/// Lowercase message fragments that indicate the same without a code.
const AUTH_ERROR_MESSAGES: &[&str] = &[
    "authorization failed",
    "authentication failed",
    "403 forbidden",
    "access forbidden",
];

/// A configured `svn` invocation: binary, timeout and per-transport flags.
#[derive(Debug, Clone)]
pub(crate) struct SvnCommand {
    binary: String,
    timeout: Duration,
    extra_args: Vec<String>,
}

impl SvnCommand {
    pub(crate) fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            extra_args: Vec::new(),
        }
    }

    pub(crate) fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Run `svn <args>` against `url`, returning stdout.
    ///
    /// A non-zero exit is classified as access denied or a generic access
    /// failure from stderr. The child is killed when the timeout expires.
    pub(crate) async fn run(
        &self,
        url: &str,
        args: &[&str],
        auth: Option<&AuthManager>,
    ) -> Result<String, RepositoryError> {
        let password = auth.and_then(AuthManager::stdin_password);
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .arg("--non-interactive")
            .args(&self.extra_args)
            .stdin(if password.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(auth) = auth {
            cmd.args(auth.cli_args());
        }

        debug!(cmd = ?format!("{} {}", self.binary, args.join(" ")), "running svn command");
        let output = match tokio::time::timeout(self.timeout, spawn_and_wait(cmd, password)).await {
            Ok(result) => result.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RepositoryError::access(url, format!("svn binary not found: {}", self.binary))
                } else {
                    RepositoryError::access(url, format!("failed to run svn: {}", e))
                }
            })?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "svn command timed out");
                return Err(RepositoryError::access(
                    url,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, stderr = %stderr.trim(), "svn command failed");
            return Err(classify_failure(url, &stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Spawn `cmd`, feed `password` on stdin (for `--password-from-stdin`) and
/// collect the output.
async fn spawn_and_wait(
    mut cmd: Command,
    password: Option<&str>,
) -> std::io::Result<std::process::Output> {
    let mut child = cmd.spawn()?;
    if let (Some(password), Some(mut stdin)) = (password, child.stdin.take()) {
        // The client may exit before reading; its stderr explains why.
        if let Err(e) = stdin.write_all(format!("{}\n", password).as_bytes()).await {
            debug!(error = %e, "svn closed stdin early");
        }
    }
    child.wait_with_output().await
}

/// Map `svn` stderr to the error taxonomy.
pub(crate) fn classify_failure(url: &str, stderr: &str) -> RepositoryError {
    let detail = stderr.trim();
    let detail = if detail.is_empty() {
        "svn exited with an error and no message"
    } else {
        detail
    };
    if is_auth_failure(detail) {
        RepositoryError::denied(url, detail)
    } else {
        RepositoryError::access(url, detail)
    }
}

fn is_auth_failure(stderr: &str) -> bool {
    static CODE: OnceLock<Regex> = OnceLock::new();
    let code = CODE.get_or_init(|| Regex::new(r"E\d{6}").expect("static regex is valid"));

    if code
        .find_iter(stderr)
        .any(|m| AUTH_ERROR_CODES.contains(&m.as_str()))
    {
        return true;
    }
    let lower = stderr.to_ascii_lowercase();
    AUTH_ERROR_MESSAGES.iter().any(|m| lower.contains(m))
}

/// Write a stand-in `svn` into `dir` that records its argv (one per line) to
/// `argv.log` and its stdin to `stdin.log`, and prints minimal XML for
/// `info` and `list`.
#[cfg(all(test, unix))]
pub(crate) fn write_recording_svn(dir: &std::path::Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    const SCRIPT: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
printf '%s\n' "$@" > "$dir/argv.log"
cat > "$dir/stdin.log"
case "$1" in
  info) echo '<?xml version="1.0"?><info><entry><repository><root>svn://h/r</root></repository></entry></info>' ;;
  list) echo '<?xml version="1.0"?><lists><list path="svn://h/r"></list></lists>' ;;
esac
"#;
    let path = dir.join("svn");
    std::fs::write(&path, SCRIPT).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_codes() {
        let err = classify_failure(
            "svn://h/r",
            "svn: E170001: Authorization failed\n",
        );
        assert!(err.is_access_denied());

        let err = classify_failure(
            "https://h/r",
            "svn: E215004: No more credentials or we tried too many times.\nAuthentication failed",
        );
        assert!(err.is_access_denied());

        let err = classify_failure("https://h/r", "svn: E175013: Access to '/r' forbidden");
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_classify_message_without_code() {
        let err = classify_failure("https://h/r", "Server sent 403 Forbidden");
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_classify_other_failures() {
        let err = classify_failure(
            "svn://h/r",
            "svn: E170013: Unable to connect to a repository at URL 'svn://h/r'",
        );
        match err {
            RepositoryError::Access { url, detail } => {
                assert_eq!(url, "svn://h/r");
                assert!(detail.contains("Unable to connect"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_empty_stderr() {
        let err = classify_failure("svn://h/r", "  ");
        assert!(matches!(err, RepositoryError::Access { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_access_error() {
        let cmd = SvnCommand::new("definitely-not-an-svn-binary", Duration::from_secs(5));
        let err = cmd.run("svn://h/r", &["info"], None).await.unwrap_err();
        match err {
            RepositoryError::Access { detail, .. } => assert!(detail.contains("not found")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
