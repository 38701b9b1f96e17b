//! MessageRepository trait definition.

use zaplink_types::error::RepositoryError;
use zaplink_types::message::{Message, MessageStatus};
use zaplink_types::session::SessionId;

/// Repository trait for message persistence.
///
/// `(session_id, message_id)` is unique; `insert` reports a duplicate as
/// `RepositoryError::Conflict`, which the ingestion pipeline treats as
/// "already exists" rather than as a failure.
pub trait MessageRepository: Send + Sync {
    /// Insert a new message.
    ///
    /// Returns `RepositoryError::Conflict` when `(session_id, message_id)`
    /// is already stored.
    fn insert(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Look up a message by its provider-assigned id within a session.
    fn get(
        &self,
        session_id: &SessionId,
        message_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Message>, RepositoryError>> + Send;

    /// Overwrite a message's delivery status.
    ///
    /// Monotonicity is the caller's concern; this is a plain write.
    /// Returns `RepositoryError::NotFound` if the message does not exist.
    fn update_status(
        &self,
        session_id: &SessionId,
        message_id: &str,
        status: MessageStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Page through a conversation's history in ascending timestamp order.
    ///
    /// When `before_timestamp` is set, only messages strictly older than it
    /// are returned (the page still ends at the newest qualifying message).
    fn history(
        &self,
        session_id: &SessionId,
        remote_jid: &str,
        limit: i64,
        before_timestamp: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Delete every message belonging to a session; returns the count removed.
    fn delete_for_session(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Total number of messages stored for a session.
    fn count_for_session(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
