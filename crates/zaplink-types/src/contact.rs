//! Contact record for remote parties a session has interacted with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jid;
use crate::session::SessionId;

/// A remote party (individual or group) known to a session.
///
/// Identified by `(session_id, jid)`, unique in the store.
/// `phone_number` and `is_group` are derived from the jid at creation;
/// `last_interaction` only ever moves forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub session_id: SessionId,
    pub jid: String,
    pub name: Option<String>,
    pub push_name: Option<String>,
    pub phone_number: Option<String>,
    pub is_group: bool,
    pub is_blocked: bool,
    pub last_interaction: Option<DateTime<Utc>>,
    pub profile_picture_url: Option<String>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Create a contact for a jid, deriving `phone_number` and `is_group`.
    pub fn new(session_id: SessionId, jid: impl Into<String>) -> Self {
        let jid = jid.into();
        let now = Utc::now();
        Self {
            phone_number: jid::phone_number_from_jid(&jid),
            is_group: jid::is_group_jid(&jid),
            session_id,
            jid,
            name: None,
            push_name: None,
            is_blocked: false,
            last_interaction: None,
            profile_picture_url: None,
            status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance `last_interaction`, never moving it backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if self.last_interaction.is_none_or(|prev| at > prev) {
            self.last_interaction = Some(at);
        }
        self.updated_at = Utc::now();
    }
}
