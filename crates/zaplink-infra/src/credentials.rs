//! Filesystem credential-directory store.
//!
//! Each session gets one directory under the configured root, keyed by its
//! session id. The connection provider reads and writes its credential
//! material there; the supervisor removes the whole directory on
//! stop-triggered logout and on delete.

use tokio::fs;
use tracing::{debug, info};
use zaplink_core::credentials::CredentialStore;
use zaplink_types::error::CredentialStoreError;
use zaplink_types::session::SessionId;

use std::io;
use std::path::{Path, PathBuf};

/// Per-session credential directories under a single root.
#[derive(Debug, Clone)]
pub struct CredentialDirStore {
    root: PathBuf,
}

impl CredentialDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a session's credential directory (not necessarily existing).
    pub fn dir_for(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.to_string())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CredentialStore for CredentialDirStore {
    async fn ensure_dir(&self, session_id: &SessionId) -> Result<PathBuf, CredentialStoreError> {
        let dir = self.dir_for(session_id);
        fs::create_dir_all(&dir).await?;
        debug!(%session_id, dir = %dir.display(), "credential directory ready");
        Ok(dir)
    }

    async fn remove(&self, session_id: &SessionId) -> Result<(), CredentialStoreError> {
        let dir = self.dir_for(session_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(%session_id, "credential directory removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn has_credentials(&self, session_id: &SessionId) -> Result<bool, CredentialStoreError> {
        let dir = self.dir_for(session_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(entries.next_entry().await?.is_some())
    }
}
