//! `svn://` and `svn+<tunnel>://` access (svnserve protocol).

use async_trait::async_trait;
use tracing::debug;

use super::auth::AuthManager;
use super::command::SvnCommand;
use super::session::CliSession;
use super::{RepositorySession, Transport, TransportKind};
use crate::config::TransportConfig;
use crate::errors::RepositoryError;
use crate::url::RepositoryUrl;

pub struct SvnTransport {
    command: SvnCommand,
}

impl SvnTransport {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            command: SvnCommand::new(&config.svn_binary, config.read_timeout()),
        }
    }
}

#[async_trait]
impl Transport for SvnTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Svn
    }

    async fn open(
        &self,
        url: &RepositoryUrl,
        auth: AuthManager,
    ) -> Result<Box<dyn RepositorySession>, RepositoryError> {
        debug!(%url, "opening svnserve session");
        Ok(Box::new(CliSession::new(
            url.clone(),
            self.command.clone(),
            Some(auth),
        )))
    }
}
