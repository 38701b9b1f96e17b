//! ContactRepository trait definition.

use chrono::{DateTime, Utc};
use zaplink_types::contact::Contact;
use zaplink_types::error::RepositoryError;
use zaplink_types::provider::ContactFields;
use zaplink_types::session::SessionId;

/// Repository trait for contact persistence.
///
/// `(session_id, jid)` is unique. Two write paths exist because provider
/// contact updates and message ingestion touch contacts differently:
/// updates overwrite whatever fields are present, while ingestion only
/// records the interaction and fills a missing push name.
pub trait ContactRepository: Send + Sync {
    /// Insert-or-update a contact from a provider contact update.
    ///
    /// Fields present in `fields` overwrite the stored values; absent
    /// fields are left unchanged. Creates the contact (deriving
    /// `phone_number`/`is_group` from the jid) when it does not exist.
    fn upsert_fields(
        &self,
        session_id: &SessionId,
        fields: &ContactFields,
    ) -> impl std::future::Future<Output = Result<Contact, RepositoryError>> + Send;

    /// Record a message interaction with a jid.
    ///
    /// Creates the contact when missing; bumps `last_interaction` (never
    /// backwards); fills `push_name` only when none is stored yet.
    fn record_interaction(
        &self,
        session_id: &SessionId,
        jid: &str,
        push_name: Option<&str>,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Look up a contact by jid within a session.
    fn get(
        &self,
        session_id: &SessionId,
        jid: &str,
    ) -> impl std::future::Future<Output = Result<Option<Contact>, RepositoryError>> + Send;

    /// List a session's contacts ordered by `last_interaction` descending.
    fn list(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Vec<Contact>, RepositoryError>> + Send;

    /// Delete every contact belonging to a session; returns the count removed.
    fn delete_for_session(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
