//! Ingestion pipeline: normalizes one session's provider events into
//! persisted records and republished gateway events.
//!
//! One instance exists per running session and is the single consumer of
//! that session's event sequence, so provider ordering is preserved.
//! Errors while handling an individual event are logged and the event is
//! dropped; later events keep flowing (one bad event must not stop the
//! pipeline).

pub mod classify;

use chrono::Utc;
use tracing::{debug, error, warn};
use zaplink_types::error::RepositoryError;
use zaplink_types::event::{GatewayEvent, GatewayEventKind};
use zaplink_types::message::{Message, MessageStatus};
use zaplink_types::provider::{ContactFields, ProviderEvent, ProviderMessage};
use zaplink_types::session::SessionId;

use crate::bus::EventBus;
use crate::repository::{ContactRepository, MessageRepository};

use classify::classify;

/// Per-session ingestion pipeline.
///
/// Deduplicates inbound messages on `(session_id, message_id)`, applies
/// monotonic status progression, upserts contacts, and publishes the
/// normalized `message:*` / `contact:*` events.
pub struct IngestionPipeline<M, C> {
    session_id: SessionId,
    messages: M,
    contacts: C,
    bus: EventBus,
}

impl<M, C> IngestionPipeline<M, C>
where
    M: MessageRepository,
    C: ContactRepository,
{
    pub fn new(session_id: SessionId, messages: M, contacts: C, bus: EventBus) -> Self {
        Self {
            session_id,
            messages,
            contacts,
            bus,
        }
    }

    /// The session this pipeline ingests for.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Process one provider event.
    ///
    /// Connection-level events are not the pipeline's concern and are
    /// ignored here; the supervisor's connection task handles them.
    pub async fn process(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::MessagesUpserted { messages } => {
                for message in messages {
                    let message_id = message.message_id.clone();
                    if let Err(e) = self.ingest_message(message).await {
                        error!(
                            session_id = %self.session_id,
                            message_id = %message_id,
                            error = %e,
                            "failed to ingest message, dropping event"
                        );
                    }
                }
            }
            ProviderEvent::MessageStatusChanged { message_id, raw_status } => {
                if let Err(e) = self.apply_status(&message_id, raw_status).await {
                    error!(
                        session_id = %self.session_id,
                        message_id = %message_id,
                        error = %e,
                        "failed to apply status update, dropping event"
                    );
                }
            }
            ProviderEvent::ContactsUpdated { updates } => {
                for update in updates {
                    let jid = update.jid.clone();
                    if let Err(e) = self.apply_contact_update(update).await {
                        error!(
                            session_id = %self.session_id,
                            jid = %jid,
                            error = %e,
                            "failed to apply contact update, dropping event"
                        );
                    }
                }
            }
            ProviderEvent::ConnectionStateChanged { .. }
            | ProviderEvent::CredentialArtifactIssued { .. }
            | ProviderEvent::CredentialsDirty => {
                debug!(session_id = %self.session_id, "ignoring connection-level event");
            }
        }
    }

    /// Persist a message on first sighting; duplicates are a no-op.
    async fn ingest_message(&self, raw: ProviderMessage) -> Result<(), RepositoryError> {
        if self
            .messages
            .get(&self.session_id, &raw.message_id)
            .await?
            .is_some()
        {
            debug!(
                session_id = %self.session_id,
                message_id = %raw.message_id,
                "duplicate message id, skipping"
            );
            return Ok(());
        }

        let classified = classify(&raw.content);
        let status = if raw.from_me {
            MessageStatus::Sent
        } else {
            MessageStatus::Received
        };

        let message = Message {
            session_id: self.session_id.clone(),
            message_id: raw.message_id,
            remote_jid: raw.remote_jid.clone(),
            from_me: raw.from_me,
            participant: raw.participant,
            push_name: raw.push_name.clone(),
            timestamp: raw.timestamp,
            kind: classified.kind,
            content: classified.content,
            media_url: classified.media_url,
            status,
            created_at: Utc::now(),
        };

        match self.messages.insert(&message).await {
            Ok(()) => {}
            // The store saw this id first (provider redelivery racing the
            // lookup above): already exists, nothing to publish.
            Err(RepositoryError::Conflict(_)) => {
                debug!(
                    session_id = %self.session_id,
                    message_id = %message.message_id,
                    "message already stored, skipping"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        self.contacts
            .record_interaction(
                &self.session_id,
                &raw.remote_jid,
                raw.push_name.as_deref(),
                Utc::now(),
            )
            .await?;

        self.bus.publish(GatewayEvent::new(
            self.session_id.clone(),
            GatewayEventKind::MessageNew { message },
        ));

        Ok(())
    }

    /// Advance a message's delivery status, never regressing it.
    async fn apply_status(&self, message_id: &str, raw_status: u32) -> Result<(), RepositoryError> {
        let Some(status) = MessageStatus::from_raw_code(raw_status) else {
            warn!(
                session_id = %self.session_id,
                message_id,
                raw_status,
                "unknown raw status code, dropping"
            );
            return Ok(());
        };

        let Some(message) = self.messages.get(&self.session_id, message_id).await? else {
            warn!(
                session_id = %self.session_id,
                message_id,
                "status update for unknown message, dropping"
            );
            return Ok(());
        };

        if !message.status.can_advance_to(status) {
            debug!(
                session_id = %self.session_id,
                message_id,
                current = %message.status,
                requested = %status,
                "ignoring non-advancing status update"
            );
            return Ok(());
        }

        self.messages
            .update_status(&self.session_id, message_id, status)
            .await?;

        self.bus.publish(GatewayEvent::new(
            self.session_id.clone(),
            GatewayEventKind::MessageStatus {
                message_id: message_id.to_string(),
                status,
            },
        ));

        Ok(())
    }

    /// Upsert the fields present in a contact update and republish it.
    async fn apply_contact_update(&self, update: ContactFields) -> Result<(), RepositoryError> {
        let contact = self.contacts.upsert_fields(&self.session_id, &update).await?;

        self.bus.publish(GatewayEvent::new(
            self.session_id.clone(),
            GatewayEventKind::ContactUpdate {
                jid: contact.jid,
                name: contact.name,
                push_name: contact.push_name,
            },
        ));

        Ok(())
    }
}
