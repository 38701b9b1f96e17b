//! Message record, delivery status, and content kind types.
//!
//! Messages are identified by `(session_id, message_id)` and ordered within
//! a conversation by their epoch-millisecond timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::session::SessionId;

/// Delivery status of a message.
///
/// Statuses only move forward along
/// `pending -> sent/received -> delivered -> read`; `Failed` is reachable
/// from any state and absorbing. `Received` is the initial status of
/// inbound messages and sits at the same rank as `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Received,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Position in the monotonic delivery order.
    ///
    /// `Failed` ranks above everything so it can be reached from any state
    /// and left from none.
    pub fn rank(&self) -> u8 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::Sent | MessageStatus::Received => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
            MessageStatus::Failed => 4,
        }
    }

    /// Whether a transition to `new` is a strict advance.
    ///
    /// Equal or earlier statuses are no-ops for callers; `Failed` never
    /// advances anywhere.
    pub fn can_advance_to(&self, new: MessageStatus) -> bool {
        new.rank() > self.rank()
    }

    /// Map a provider's raw status code to a status.
    ///
    /// Codes outside the known 0..=3 range return `None` and should be
    /// dropped by the caller.
    pub fn from_raw_code(code: u32) -> Option<MessageStatus> {
        match code {
            0 | 1 => Some(MessageStatus::Sent),
            2 => Some(MessageStatus::Delivered),
            3 => Some(MessageStatus::Read),
            _ => None,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Received => "received",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MessageStatus::Pending),
            "sent" => Ok(MessageStatus::Sent),
            "received" => Ok(MessageStatus::Received),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(format!("invalid message status: '{other}'")),
        }
    }
}

/// Content kind of a message, assigned by the ingestion classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Contact,
    Unknown,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
            MessageKind::Sticker => "sticker",
            MessageKind::Location => "location",
            MessageKind::Contact => "contact",
            MessageKind::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "video" => Ok(MessageKind::Video),
            "audio" => Ok(MessageKind::Audio),
            "document" => Ok(MessageKind::Document),
            "sticker" => Ok(MessageKind::Sticker),
            "location" => Ok(MessageKind::Location),
            "contact" => Ok(MessageKind::Contact),
            "unknown" => Ok(MessageKind::Unknown),
            other => Err(format!("invalid message kind: '{other}'")),
        }
    }
}

/// A persisted chat message within a session.
///
/// `message_id` is the provider-assigned id; `(session_id, message_id)` is
/// unique in the store. `timestamp` (epoch millis) is the authoritative
/// ordering key within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub session_id: SessionId,
    pub message_id: String,
    pub remote_jid: String,
    pub from_me: bool,
    /// Sender within a group conversation, absent for direct chats.
    pub participant: Option<String>,
    /// Display name the remote side advertised with the message.
    pub push_name: Option<String>,
    pub timestamp: i64,
    pub kind: MessageKind,
    /// Normalized textual representation (body, caption, file name, ...).
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}
