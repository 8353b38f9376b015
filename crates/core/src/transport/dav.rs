//! `http://` / `https://` access through the client's DAV layer.

use async_trait::async_trait;
use tracing::debug;

use super::auth::AuthManager;
use super::command::SvnCommand;
use super::session::CliSession;
use super::{RepositorySession, Transport, TransportKind};
use crate::config::TransportConfig;
use crate::errors::RepositoryError;
use crate::url::RepositoryUrl;

pub struct DavTransport {
    command: SvnCommand,
}

impl DavTransport {
    pub fn new(config: &TransportConfig) -> Self {
        let mut command = SvnCommand::new(&config.svn_binary, config.read_timeout())
            .with_arg("--config-option")
            .with_arg(format!(
                "servers:global:http-timeout={}",
                config.connect_timeout_secs
            ));
        if config.trust_server_cert {
            command = command.with_arg("--trust-server-cert-failures=unknown-ca,cn-mismatch");
        }
        Self { command }
    }
}

#[async_trait]
impl Transport for DavTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Dav
    }

    async fn open(
        &self,
        url: &RepositoryUrl,
        auth: AuthManager,
    ) -> Result<Box<dyn RepositorySession>, RepositoryError> {
        debug!(%url, "opening DAV session");
        Ok(Box::new(CliSession::new(
            url.clone(),
            self.command.clone(),
            Some(auth),
        )))
    }
}
