//! Connection-provider event types.
//!
//! `ProviderEvent` is the closed tagged union a connection provider pushes
//! over its event channel. The supervisor and ingestion pipeline pattern
//! match on it exhaustively; there are no optional duck-typed fields.
//! All variants are Clone + Send + Sync for use with tokio channels.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Connection-level state reported by a provider.
///
/// `Open` carries the phone identity of the authenticated account; `Close`
/// carries the classified disconnect cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open { phone_number: String },
    Close { cause: DisconnectCause },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open { .. } => "open",
            ConnectionState::Close { .. } => "close",
        };
        write!(f, "{s}")
    }
}

/// Why a provider connection closed.
///
/// Everything except an explicit remote logout is transient and eligible
/// for automatic reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectCause {
    ConnectionLost,
    Timeout,
    /// Another device/client took over the connection.
    Conflict,
    /// The remote side invalidated this device's credentials.
    LoggedOut,
}

impl DisconnectCause {
    /// Terminal causes stop the session instead of triggering a reconnect.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DisconnectCause::LoggedOut)
    }
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisconnectCause::ConnectionLost => "connection_lost",
            DisconnectCause::Timeout => "timeout",
            DisconnectCause::Conflict => "conflict",
            DisconnectCause::LoggedOut => "logged_out",
        };
        write!(f, "{s}")
    }
}

/// Raw content of an inbound message as the provider delivered it.
///
/// The ingestion pipeline's dispatch table turns this into a
/// `(MessageKind, content, media_url)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { body: String },
    Image { caption: Option<String>, url: Option<String> },
    Video { caption: Option<String>, url: Option<String> },
    Audio { url: Option<String> },
    Document { file_name: Option<String>, url: Option<String> },
    Sticker { url: Option<String> },
    Location { latitude: f64, longitude: f64 },
    ContactCard,
    Unknown,
}

/// One message in a `MessagesUpserted` batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// Provider-assigned message id, unique per session.
    pub message_id: String,
    pub remote_jid: String,
    pub from_me: bool,
    /// Sender jid within a group conversation.
    pub participant: Option<String>,
    pub push_name: Option<String>,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub content: MessageContent,
}

/// A partial contact update; absent fields leave the stored value unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactFields {
    pub jid: String,
    pub name: Option<String>,
    pub push_name: Option<String>,
    pub status: Option<String>,
    pub profile_picture_url: Option<String>,
}

/// Receipt returned by a provider for an accepted outbound send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundReceipt {
    pub message_id: String,
    /// Epoch milliseconds at which the provider accepted the message.
    pub timestamp: i64,
}

/// Events a connection provider pushes over its event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    /// The connection transitioned.
    ConnectionStateChanged { state: ConnectionState },

    /// No valid stored credential exists; the remote side issued a fresh
    /// credential artifact (QR-equivalent) to display to the user.
    CredentialArtifactIssued { artifact: String },

    /// The provider rotated credential material; it must be persisted
    /// before the next reconnect can be assumed to succeed.
    CredentialsDirty,

    /// A batch of inbound (or echoed outbound) messages.
    MessagesUpserted { messages: Vec<ProviderMessage> },

    /// Delivery-status progression for a previously seen message.
    MessageStatusChanged { message_id: String, raw_status: u32 },

    /// Contact metadata updates.
    ContactsUpdated { updates: Vec<ContactFields> },
}
