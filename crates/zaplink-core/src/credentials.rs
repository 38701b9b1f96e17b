//! Credential-store trait definition.

use zaplink_types::error::CredentialStoreError;
use zaplink_types::session::SessionId;

use std::path::PathBuf;

/// Per-session on-disk credential storage (port implemented in zaplink-infra).
///
/// One directory per session, keyed by session id; removed entirely on
/// stop-triggered logout and on delete.
pub trait CredentialStore: Send + Sync {
    /// Create the session's credential directory if needed and return it.
    fn ensure_dir(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<PathBuf, CredentialStoreError>> + Send;

    /// Remove the session's credential directory and everything in it.
    ///
    /// Removing a directory that does not exist is a no-op.
    fn remove(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<(), CredentialStoreError>> + Send;

    /// Whether any credential material is stored for the session.
    fn has_credentials(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<bool, CredentialStoreError>> + Send;
}
