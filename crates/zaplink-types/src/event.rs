//! Normalized gateway events published on the event bus.
//!
//! `GatewayEvent` is the unified event type flowing from the supervisor and
//! ingestion pipeline to external subscribers. Events are ephemeral -- they
//! are never persisted. Topics are hierarchical
//! (`category:eventType:sessionId`) with a `category:any` wildcard per
//! category.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::message::{Message, MessageStatus};
use crate::session::{SessionId, SessionState};

/// Top-level event category, the first topic segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Message,
    Session,
    Contact,
}

impl EventCategory {
    /// The `category:any` wildcard topic receiving every event of this
    /// category regardless of session or type.
    pub fn wildcard_topic(&self) -> String {
        format!("{self}:any")
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventCategory::Message => "message",
            EventCategory::Session => "session",
            EventCategory::Contact => "contact",
        };
        write!(f, "{s}")
    }
}

/// Build the exact topic string for a category/eventType/session triple.
pub fn topic_for(category: EventCategory, event_type: &str, session_id: &SessionId) -> String {
    format!("{category}:{event_type}:{session_id}")
}

/// Payload union of all events the gateway publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEventKind {
    /// A message was persisted for the first time.
    MessageNew { message: Message },

    /// A message's delivery status advanced.
    MessageStatus {
        message_id: String,
        status: MessageStatus,
    },

    /// The session's connection state machine transitioned.
    SessionConnection { state: SessionState },

    /// A fresh credential artifact (QR-equivalent) awaits the user.
    SessionQr { artifact: String },

    /// The handshake completed and the phone identity was recorded.
    SessionAuthenticated { phone_number: String },

    /// The session logged out (remote-initiated or via stop).
    SessionLogout,

    /// Contact metadata changed.
    ContactUpdate {
        jid: String,
        name: Option<String>,
        push_name: Option<String>,
    },
}

/// An event scoped to one session, routable by topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub session_id: SessionId,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: GatewayEventKind,
}

impl GatewayEvent {
    pub fn new(session_id: SessionId, kind: GatewayEventKind) -> Self {
        Self {
            session_id,
            occurred_at: Utc::now(),
            kind,
        }
    }

    pub fn category(&self) -> EventCategory {
        match self.kind {
            GatewayEventKind::MessageNew { .. } | GatewayEventKind::MessageStatus { .. } => {
                EventCategory::Message
            }
            GatewayEventKind::SessionConnection { .. }
            | GatewayEventKind::SessionQr { .. }
            | GatewayEventKind::SessionAuthenticated { .. }
            | GatewayEventKind::SessionLogout => EventCategory::Session,
            GatewayEventKind::ContactUpdate { .. } => EventCategory::Contact,
        }
    }

    /// The second topic segment.
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            GatewayEventKind::MessageNew { .. } => "new",
            GatewayEventKind::MessageStatus { .. } => "status",
            GatewayEventKind::SessionConnection { .. } => "connection",
            GatewayEventKind::SessionQr { .. } => "qr",
            GatewayEventKind::SessionAuthenticated { .. } => "authenticated",
            GatewayEventKind::SessionLogout => "logout",
            GatewayEventKind::ContactUpdate { .. } => "update",
        }
    }

    /// Exact topic this event is published under.
    pub fn topic(&self) -> String {
        topic_for(self.category(), self.event_type(), &self.session_id)
    }

    /// Wildcard topic this event is also delivered to.
    pub fn wildcard_topic(&self) -> String {
        self.category().wildcard_topic()
    }
}
