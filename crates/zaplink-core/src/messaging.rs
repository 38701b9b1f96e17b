//! Outbound send and read-side queries for messages and contacts.
//!
//! `MessageService` shares the supervisor's running-handle registry: sending
//! requires a live provider, while history and contact reads go straight to
//! storage. Outbound sends persist nothing when the provider rejects the
//! message -- there are no partial records.

use chrono::Utc;
use tracing::{info, warn};
use zaplink_types::contact::Contact;
use zaplink_types::error::{GatewayError, RepositoryError};
use zaplink_types::message::{Message, MessageKind, MessageStatus};
use zaplink_types::provider::OutboundReceipt;
use zaplink_types::session::SessionId;

use crate::provider::ConnectionProvider;
use crate::repository::{ContactRepository, MessageRepository, SessionRepository};
use crate::supervisor::registry::SessionRegistry;

/// Default page size for conversation history queries.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Message send/read operations against running sessions.
pub struct MessageService<P, S, M, C> {
    registry: SessionRegistry<P>,
    sessions: S,
    messages: M,
    contacts: C,
}

impl<P, S, M, C> MessageService<P, S, M, C>
where
    P: ConnectionProvider,
    S: SessionRepository,
    M: MessageRepository,
    C: ContactRepository,
{
    pub fn new(registry: SessionRegistry<P>, sessions: S, messages: M, contacts: C) -> Self {
        Self {
            registry,
            sessions,
            messages,
            contacts,
        }
    }

    /// Send a text message through a running session.
    ///
    /// Fails with `SessionNotRunning` when no handle (or no live provider)
    /// is registered. On provider success the message is persisted with
    /// status `Pending` under the provider-returned id and the contact's
    /// `last_interaction` is bumped; on provider failure nothing is written.
    pub async fn send_text_message(
        &self,
        session_id: &SessionId,
        jid: &str,
        text: &str,
    ) -> Result<OutboundReceipt, GatewayError> {
        let provider = self
            .registry
            .get(session_id)
            .and_then(|handle| handle.provider())
            .ok_or(GatewayError::SessionNotRunning)?;

        let receipt = provider.send_text(jid, text).await?;

        let message = Message {
            session_id: session_id.clone(),
            message_id: receipt.message_id.clone(),
            remote_jid: jid.to_string(),
            from_me: true,
            participant: None,
            push_name: None,
            timestamp: receipt.timestamp,
            kind: MessageKind::Text,
            content: Some(text.to_string()),
            media_url: None,
            status: MessageStatus::Pending,
            created_at: Utc::now(),
        };

        match self.messages.insert(&message).await {
            Ok(()) => {}
            // The provider echoed the send back through ingestion before we
            // got here; the record already exists.
            Err(RepositoryError::Conflict(_)) => {
                warn!(%session_id, message_id = %receipt.message_id, "outbound message already stored");
            }
            Err(e) => return Err(e.into()),
        }

        self.contacts
            .record_interaction(session_id, jid, None, Utc::now())
            .await?;

        info!(%session_id, jid, message_id = %receipt.message_id, "text message sent");
        Ok(receipt)
    }

    /// Page through a conversation's history in ascending timestamp order.
    ///
    /// `before_timestamp` bounds the page to strictly older messages.
    pub async fn get_message_history(
        &self,
        session_id: &SessionId,
        jid: &str,
        limit: Option<i64>,
        before_timestamp: Option<i64>,
    ) -> Result<Vec<Message>, GatewayError> {
        self.require_session(session_id).await?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        Ok(self
            .messages
            .history(session_id, jid, limit, before_timestamp)
            .await?)
    }

    /// A session's contacts, most recently interacted with first.
    pub async fn get_contacts(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Contact>, GatewayError> {
        self.require_session(session_id).await?;
        Ok(self.contacts.list(session_id).await?)
    }

    async fn require_session(&self, session_id: &SessionId) -> Result<(), GatewayError> {
        self.sessions
            .get(session_id)
            .await?
            .map(|_| ())
            .ok_or(GatewayError::NotFound)
    }
}
