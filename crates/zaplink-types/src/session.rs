//! Session identity, lifecycle state, and record types.
//!
//! A session is one user-owned, independently connectable chat-network
//! identity. Its state machine is driven by the supervisor and by the
//! connection events the bound provider emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a session, wrapping a UUID v7 (time-sortable).
///
/// Generated once at creation and never reused, including after deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new SessionId using UUID v7 (time-sortable, guaranteed ordering).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a SessionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a session's connection state machine.
///
/// Transitions are driven by the supervisor:
/// `Created -> Starting -> AwaitingCredential -> Connected`, with
/// `Connected -> Disconnected -> Reconnecting -> Starting` on transient
/// disconnects. `LoggedOut` and `Deleted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Starting,
    AwaitingCredential,
    Connected,
    Disconnected,
    Reconnecting,
    LoggedOut,
    Deleted,
}

impl SessionState {
    /// Terminal states are never left by the state machine itself.
    ///
    /// A `LoggedOut` session may still be restarted explicitly (a fresh
    /// credential handshake will be required); `Deleted` never comes back.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::LoggedOut | SessionState::Deleted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::Starting => "starting",
            SessionState::AwaitingCredential => "awaiting_credential",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::LoggedOut => "logged_out",
            SessionState::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(SessionState::Created),
            "starting" => Ok(SessionState::Starting),
            "awaiting_credential" => Ok(SessionState::AwaitingCredential),
            "connected" => Ok(SessionState::Connected),
            "disconnected" => Ok(SessionState::Disconnected),
            "reconnecting" => Ok(SessionState::Reconnecting),
            "logged_out" => Ok(SessionState::LoggedOut),
            "deleted" => Ok(SessionState::Deleted),
            other => Err(format!("invalid session state: '{other}'")),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Created
    }
}

/// A provisioned chat-network session bound to one external account.
///
/// `phone_number` is set only once the remote side has authenticated the
/// connection. `pending_artifact` holds the transient credential artifact
/// (QR-equivalent) while the handshake is waiting for it to be consumed; it
/// is cleared on successful authentication and on stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub owner_id: String,
    pub name: String,
    pub state: SessionState,
    pub phone_number: Option<String>,
    pub pending_artifact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_connection_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a fresh session record in the `Created` state.
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            owner_id: owner_id.into(),
            name: name.into(),
            state: SessionState::Created,
            phone_number: None,
            pending_artifact: None,
            created_at: Utc::now(),
            last_connection_at: None,
        }
    }

    /// Whether the remote side has authenticated this session.
    pub fn is_authenticated(&self) -> bool {
        self.phone_number.is_some() && self.state == SessionState::Connected
    }

    /// Snapshot of the authentication-relevant fields.
    pub fn auth_status(&self) -> AuthStatus {
        AuthStatus {
            state: self.state,
            is_authenticated: self.is_authenticated(),
            pending_artifact: self.pending_artifact.clone(),
            phone_number: self.phone_number.clone(),
            last_connection_at: self.last_connection_at,
        }
    }
}

/// Point-in-time view of a session's authentication progress.
///
/// Returned by `start_session` and `get_session_status` so callers can poll
/// for a pending credential artifact or a completed handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub state: SessionState,
    pub is_authenticated: bool,
    pub pending_artifact: Option<String>,
    pub phone_number: Option<String>,
    pub last_connection_at: Option<DateTime<Utc>>,
}

/// A session record tagged with whether a running handle currently exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListing {
    #[serde(flatten)]
    pub session: Session,
    pub is_running: bool,
}

/// Result of `start_session`: the record plus an auth snapshot.
///
/// The handshake continues in the background; callers observe progress via
/// `session:*` events or by polling `get_session_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartOutcome {
    pub session: Session,
    pub auth_status: AuthStatus,
}

/// Full status view of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusView {
    pub session: Session,
    pub is_running: bool,
    pub auth_status: AuthStatus,
}
