//! Session supervisor: lifecycle orchestration for chat-network sessions.
//!
//! The supervisor owns the registry of running sessions, enforces per-owner
//! and global quotas, and drives each session's connection state machine
//! (start, stop, reconnect, delete). Starting a session binds a connection
//! provider and an ingestion pipeline to it; everything the provider emits
//! flows through the pipeline into storage and out over the event bus.

pub(crate) mod connection;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use zaplink_types::error::GatewayError;
use zaplink_types::event::{GatewayEvent, GatewayEventKind};
use zaplink_types::session::{
    Session, SessionId, SessionListing, SessionState, SessionStatusView, StartOutcome,
};

use crate::bus::EventBus;
use crate::credentials::CredentialStore;
use crate::provider::{ConnectionProvider, ProviderFactory};
use crate::repository::{ContactRepository, MessageRepository, SessionRepository};

use registry::{SessionHandle, SessionRegistry};

/// Tunables for the supervisor.
///
/// The reconnect delay is fixed -- no exponential growth, no jitter. That is
/// a deliberate simplification, not a claim of optimality.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Maximum sessions one owner may create.
    pub max_sessions_per_owner: usize,
    /// Maximum concurrently running handles across all owners.
    pub max_running_sessions: usize,
    /// Delay before a transiently disconnected session reconnects.
    pub reconnect_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_owner: 3,
            max_running_sessions: 10,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Shared state behind the supervisor, also visible to connection tasks.
pub(crate) struct SupervisorInner<S, M, C, F, K>
where
    F: ProviderFactory,
{
    pub(crate) config: SupervisorConfig,
    pub(crate) sessions: S,
    pub(crate) messages: M,
    pub(crate) contacts: C,
    pub(crate) factory: F,
    pub(crate) credentials: K,
    pub(crate) bus: EventBus,
    pub(crate) registry: SessionRegistry<F::Provider>,
}

impl<S, M, C, F, K> SupervisorInner<S, M, C, F, K>
where
    S: SessionRepository,
    F: ProviderFactory,
{
    /// Read-mutate-write a session record, logging (not propagating)
    /// failures; state persistence must never take a connection task down.
    pub(crate) async fn update_session_record(
        &self,
        session_id: &SessionId,
        mutate: impl FnOnce(&mut Session),
    ) -> Option<Session> {
        match self.sessions.get(session_id).await {
            Ok(Some(mut session)) => {
                mutate(&mut session);
                if let Err(e) = self.sessions.update(&session).await {
                    warn!(%session_id, error = %e, "failed to persist session state");
                }
                Some(session)
            }
            Ok(None) => {
                warn!(%session_id, "session record missing during state update");
                None
            }
            Err(e) => {
                warn!(%session_id, error = %e, "failed to load session for state update");
                None
            }
        }
    }

    pub(crate) fn publish_connection_state(&self, session_id: &SessionId, state: SessionState) {
        self.bus.publish(GatewayEvent::new(
            session_id.clone(),
            GatewayEventKind::SessionConnection { state },
        ));
    }
}

/// Orchestrates session lifecycle across many concurrent connections.
///
/// Generic over the repository, provider-factory, and credential-store
/// ports so the core never depends on concrete infrastructure.
pub struct SessionSupervisor<S, M, C, F, K>
where
    F: ProviderFactory,
{
    inner: Arc<SupervisorInner<S, M, C, F, K>>,
}

impl<S, M, C, F, K> Clone for SessionSupervisor<S, M, C, F, K>
where
    F: ProviderFactory,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, M, C, F, K> SessionSupervisor<S, M, C, F, K>
where
    S: SessionRepository + Clone + 'static,
    M: MessageRepository + Clone + 'static,
    C: ContactRepository + Clone + 'static,
    F: ProviderFactory,
    K: CredentialStore + 'static,
{
    pub fn new(
        config: SupervisorConfig,
        sessions: S,
        messages: M,
        contacts: C,
        factory: F,
        credentials: K,
        bus: EventBus,
    ) -> Self {
        info!(
            max_running = config.max_running_sessions,
            max_per_owner = config.max_sessions_per_owner,
            "session supervisor initialized"
        );
        Self {
            inner: Arc::new(SupervisorInner {
                config,
                sessions,
                messages,
                contacts,
                factory,
                credentials,
                bus,
                registry: SessionRegistry::new(),
            }),
        }
    }

    /// The shared running-handle registry (for wiring a `MessageService`).
    pub fn registry(&self) -> SessionRegistry<F::Provider> {
        self.inner.registry.clone()
    }

    /// The event bus this supervisor publishes on.
    pub fn bus(&self) -> EventBus {
        self.inner.bus.clone()
    }

    /// Create a new session record for an owner.
    ///
    /// Fails with `QuotaExceeded` (creating nothing) when the owner already
    /// holds the configured maximum.
    pub async fn create_session(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Session, GatewayError> {
        let limit = self.inner.config.max_sessions_per_owner;
        let owned = self.inner.sessions.count_for_owner(owner_id).await?;
        if owned as usize >= limit {
            return Err(GatewayError::QuotaExceeded { limit });
        }

        let session = Session::new(owner_id, name);
        self.inner.sessions.create(&session).await?;
        info!(session_id = %session.id, owner_id, "session created");
        Ok(session)
    }

    /// Start a session's connection, or report its state if already running.
    ///
    /// The handshake proceeds in a background task; the returned snapshot
    /// reflects the record at claim time.
    pub async fn start_session(&self, session_id: &SessionId) -> Result<StartOutcome, GatewayError> {
        let session = self
            .inner
            .sessions
            .get(session_id)
            .await?
            .ok_or(GatewayError::NotFound)?;

        if self.inner.registry.contains(session_id) {
            return self.already_running(session_id, session).await;
        }

        let limit = self.inner.config.max_running_sessions;
        if self.inner.registry.len() >= limit {
            return Err(GatewayError::GlobalQuotaExceeded { limit });
        }

        let handle = Arc::new(SessionHandle::new(session_id.clone()));
        if !self.inner.registry.claim(Arc::clone(&handle)) {
            // Lost a concurrent start race; the winner owns the handle.
            return self.already_running(session_id, session).await;
        }

        let task = tokio::spawn(connection::run_connection(
            Arc::clone(&self.inner),
            Arc::clone(&handle),
        ));
        handle.set_task(task);

        info!(%session_id, "session started");
        let auth_status = session.auth_status();
        Ok(StartOutcome { session, auth_status })
    }

    async fn already_running(
        &self,
        session_id: &SessionId,
        fallback: Session,
    ) -> Result<StartOutcome, GatewayError> {
        // Re-read so the caller sees the running connection's latest state.
        let session = self
            .inner
            .sessions
            .get(session_id)
            .await?
            .unwrap_or(fallback);
        let auth_status = session.auth_status();
        Ok(StartOutcome { session, auth_status })
    }

    /// Stop a running session. Not running is a no-op success.
    ///
    /// Cancels any pending reconnect before it fires, issues the explicit
    /// provider disconnect (terminal), removes the credential directory,
    /// and records the session as `Disconnected`.
    pub async fn stop_session(&self, session_id: &SessionId) -> Result<(), GatewayError> {
        let Some(handle) = self.inner.registry.remove(session_id) else {
            return Ok(());
        };

        handle.cancel_token().cancel();
        if let Some(provider) = handle.provider() {
            provider.disconnect().await;
        }
        if let Some(task) = handle.take_task() {
            if let Err(e) = task.await {
                warn!(%session_id, error = %e, "connection task join failed");
            }
        }

        self.inner.credentials.remove(session_id).await?;
        self.inner
            .update_session_record(session_id, |session| {
                session.state = SessionState::Disconnected;
                session.pending_artifact = None;
            })
            .await;

        self.inner
            .publish_connection_state(session_id, SessionState::Disconnected);
        self.inner.bus.publish(GatewayEvent::new(
            session_id.clone(),
            GatewayEventKind::SessionLogout,
        ));

        info!(%session_id, "session stopped");
        Ok(())
    }

    /// Delete a session and everything it owns. Irreversible.
    ///
    /// Stops the session first (cancelling any pending reconnect), then
    /// removes its messages, contacts, record, and credential directory.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<(), GatewayError> {
        if self.inner.sessions.get(session_id).await?.is_none() {
            return Err(GatewayError::NotFound);
        }

        self.stop_session(session_id).await?;

        let messages = self.inner.messages.delete_for_session(session_id).await?;
        let contacts = self.inner.contacts.delete_for_session(session_id).await?;
        self.inner.sessions.delete(session_id).await?;
        self.inner.credentials.remove(session_id).await?;

        self.inner
            .publish_connection_state(session_id, SessionState::Deleted);

        info!(%session_id, messages, contacts, "session deleted");
        Ok(())
    }

    /// List sessions, optionally for one owner, tagged with running status.
    pub async fn list_sessions(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<SessionListing>, GatewayError> {
        let sessions = self.inner.sessions.list(owner_id).await?;
        Ok(sessions
            .into_iter()
            .map(|session| {
                let is_running = self.inner.registry.contains(&session.id);
                SessionListing { session, is_running }
            })
            .collect())
    }

    /// Current record, running flag, and auth snapshot for a session.
    pub async fn get_session_status(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionStatusView, GatewayError> {
        let session = self
            .inner
            .sessions
            .get(session_id)
            .await?
            .ok_or(GatewayError::NotFound)?;
        let auth_status = session.auth_status();
        Ok(SessionStatusView {
            is_running: self.inner.registry.contains(session_id),
            session,
            auth_status,
        })
    }

    /// The pending credential artifact (QR-equivalent), if one is waiting.
    pub async fn get_credential_artifact(
        &self,
        session_id: &SessionId,
    ) -> Result<String, GatewayError> {
        let session = self
            .inner
            .sessions
            .get(session_id)
            .await?
            .ok_or(GatewayError::NotFound)?;
        session
            .pending_artifact
            .ok_or(GatewayError::ArtifactNotAvailable)
    }
}
