//! SessionRepository trait definition.

use zaplink_types::error::RepositoryError;
use zaplink_types::session::{Session, SessionId};

/// Repository trait for session record persistence.
///
/// Implementations live in zaplink-infra (e.g., `SqliteSessionRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait SessionRepository: Send + Sync {
    /// Persist a freshly created session record.
    fn create(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a session by its unique ID.
    fn get(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Write back a full session record (state, phone identity, artifact, ...).
    ///
    /// Returns `RepositoryError::NotFound` if the record no longer exists.
    fn update(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List sessions, optionally filtered to one owner, newest first.
    fn list(
        &self,
        owner_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, RepositoryError>> + Send;

    /// Count sessions belonging to an owner (for per-owner quota checks).
    fn count_for_owner(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete a session record.
    ///
    /// Returns `RepositoryError::NotFound` if the record does not exist.
    fn delete(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
