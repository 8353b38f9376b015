//! TOML-based configuration for svnportal.
//!
//! The encryption key for stored passwords is never written to the file;
//! `crypto.key_env` names the environment variable holding it, resolved at
//! runtime via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::transport::CredentialCache;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Project/override database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Stored-password encryption settings.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Repository transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding projects and password overrides.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/svnportal/svnportal.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Crypto
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Environment variable holding the base64 AES-256 key.
    #[serde(default = "default_key_env")]
    pub key_env: String,

    /// Resolved key (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub key: Option<String>,
}

fn default_key_env() -> String {
    "SVNPORTAL_KEY".into()
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            key_env: default_key_env(),
            key: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Settings shared by the DAV, svn and local transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// `svn` client binary.
    #[serde(default = "default_svn_binary")]
    pub svn_binary: String,

    /// `svnadmin` binary used to create local repositories.
    #[serde(default = "default_svnadmin_binary")]
    pub svnadmin_binary: String,

    /// Connection timeout handed to the HTTP layer.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound on any single repository command.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Whether the client may cache credentials on disk.
    #[serde(default)]
    pub credential_cache: CredentialCache,

    /// Accept unknown CAs and hostname mismatches on https URLs.
    #[serde(default)]
    pub trust_server_cert: bool,
}

fn default_svn_binary() -> String {
    "svn".into()
}
fn default_svnadmin_binary() -> String {
    "svnadmin".into()
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_read_timeout() -> u64 {
    120
}

impl TransportConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            svn_binary: default_svn_binary(),
            svnadmin_binary: default_svnadmin_binary(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            credential_cache: CredentialCache::default(),
            trust_server_cert: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `*_env` fields from the environment.
    ///
    /// A missing variable logs a warning but does not fail; projects without
    /// overrides work without a key.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");
        self.crypto.key = resolve_optional_env(&self.crypto.key_env, "crypto.key_env");
        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.svn_binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "transport.svn_binary".into(),
                detail: "svn binary must not be empty".into(),
            });
        }
        if self.transport.svnadmin_binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "transport.svnadmin_binary".into(),
                detail: "svnadmin binary must not be empty".into(),
            });
        }
        if self.transport.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transport.connect_timeout_secs".into(),
                detail: "connect timeout must be > 0".into(),
            });
        }
        if self.transport.read_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transport.read_timeout_secs".into(),
                detail: "read timeout must be > 0".into(),
            });
        }
        if self.crypto.key_env.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "crypto.key_env".into(),
                detail: "key variable name must not be empty".into(),
            });
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.path".into(),
                detail: "database path must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[database]
path = "/tmp/svnportal/test.db"

[crypto]
key_env = "SVNPORTAL_TEST_KEY"

[transport]
svn_binary = "/usr/local/bin/svn"
svnadmin_binary = "/usr/local/bin/svnadmin"
connect_timeout_secs = 5
read_timeout_secs = 30
credential_cache = "default"
trust_server_cert = true

[logging]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.database.path, PathBuf::from("/tmp/svnportal/test.db"));
        assert_eq!(config.crypto.key_env, "SVNPORTAL_TEST_KEY");
        assert_eq!(config.transport.svn_binary, "/usr/local/bin/svn");
        assert_eq!(config.transport.read_timeout(), Duration::from_secs(30));
        assert_eq!(config.transport.credential_cache, CredentialCache::Default);
        assert!(config.transport.trust_server_cert);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.transport.connect_timeout_secs, 5);
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transport\nsvn_binary = ").unwrap();
        let result = AppConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.transport.read_timeout_secs = 0;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "transport.read_timeout_secs"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_binary() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.transport.svn_binary = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("SVNPORTAL_CONFIG_TEST_KEY", "a2V5");
        let mut config: AppConfig = toml::from_str(
            r#"
[crypto]
key_env = "SVNPORTAL_CONFIG_TEST_KEY"
"#,
        )
        .unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.crypto.key.as_deref(), Some("a2V5"));
        std::env::remove_var("SVNPORTAL_CONFIG_TEST_KEY");
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.database.path, default_db_path());
        assert_eq!(config.crypto.key_env, "SVNPORTAL_KEY");
        assert_eq!(config.transport.svn_binary, "svn");
        assert_eq!(config.transport.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.transport.credential_cache, CredentialCache::None);
        assert!(!config.transport.trust_server_cert);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }
}
