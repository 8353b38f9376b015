//! Operations on an open [`RepositoryHandle`].
//!
//! Root lookup is advisory: failures are logged and yield `None`. Listing is
//! a primary read: failures are logged and returned to the caller.

use tracing::{error, instrument};

use crate::errors::RepositoryError;
use crate::models::{DirEntry, Revision};
use crate::transport::RepositoryHandle;

/// Resolve the repository root, or `None` if it cannot be determined.
#[instrument(skip(handle), fields(url = %handle.url()))]
pub async fn get_root(handle: &mut RepositoryHandle) -> Option<String> {
    match handle.repository_root().await {
        Ok(root) => Some(root),
        Err(e) if e.is_access_denied() => {
            error!(error = %e, "authentication failed while resolving repository root");
            None
        }
        Err(e) => {
            error!(error = %e, "could not resolve repository root");
            None
        }
    }
}

/// List `path` at `revision`. A blank path lists the root.
#[instrument(skip(handle), fields(url = %handle.url()))]
pub async fn list_directory(
    handle: &mut RepositoryHandle,
    path: &str,
    revision: Revision,
) -> Result<Vec<DirEntry>, RepositoryError> {
    handle.list_dir(path, revision).await.map_err(|e| {
        if e.is_access_denied() {
            error!(error = %e, "authentication failed while listing directory");
        } else {
            error!(error = %e, "directory listing failed");
        }
        e
    })
}
