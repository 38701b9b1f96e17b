//! Per-session connection task.
//!
//! Each running session is driven by one of these tasks: it builds a
//! provider, consumes the provider's event stream, keeps the session record
//! and event bus in step with the connection state machine, and handles
//! reconnection after transient disconnects. The task's cancellation token
//! is the single shutdown path -- `stop`/`delete` cancel it, which also
//! aborts any reconnect delay still pending, so a stale reconnect can never
//! revive a stopped or deleted session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zaplink_types::event::{GatewayEvent, GatewayEventKind};
use zaplink_types::provider::{ConnectionState, DisconnectCause, ProviderEvent};
use zaplink_types::session::SessionState;

use crate::credentials::CredentialStore;
use crate::pipeline::IngestionPipeline;
use crate::provider::{ConnectionProvider, ProviderFactory};
use crate::repository::{ContactRepository, MessageRepository, SessionRepository};

use super::SupervisorInner;
use super::registry::SessionHandle;

/// Why one connection attempt ended.
enum ConnectionOutcome {
    /// The session was stopped or deleted.
    Cancelled,
    /// The remote side logged this device out (terminal).
    LoggedOut,
    /// A recoverable disconnect; reconnect after the configured delay.
    Transient(DisconnectCause),
}

/// Drive a session's connection until it is cancelled or logged out.
pub(crate) async fn run_connection<S, M, C, F, K>(
    inner: Arc<SupervisorInner<S, M, C, F, K>>,
    handle: Arc<SessionHandle<F::Provider>>,
) where
    S: SessionRepository,
    M: MessageRepository + Clone,
    C: ContactRepository + Clone,
    F: ProviderFactory,
    K: CredentialStore,
{
    let session_id = handle.session_id().clone();
    let cancel = handle.cancel_token().clone();
    let pipeline = IngestionPipeline::new(
        session_id.clone(),
        inner.messages.clone(),
        inner.contacts.clone(),
        inner.bus.clone(),
    );

    loop {
        if cancel.is_cancelled() {
            break;
        }

        inner
            .update_session_record(&session_id, |session| {
                session.state = SessionState::Starting;
            })
            .await;
        inner.publish_connection_state(&session_id, SessionState::Starting);

        let credential_dir = match inner.credentials.ensure_dir(&session_id).await {
            Ok(dir) => dir,
            Err(e) => {
                error!(%session_id, error = %e, "failed to prepare credential directory");
                if wait_for_reconnect(&cancel, inner.config.reconnect_delay).await {
                    continue;
                }
                break;
            }
        };

        let provider = tokio::select! {
            _ = cancel.cancelled() => break,
            created = inner.factory.create(&session_id, &credential_dir) => match created {
                Ok(provider) => Arc::new(provider),
                Err(e) => {
                    warn!(%session_id, error = %e, "provider construction failed");
                    if wait_for_reconnect(&cancel, inner.config.reconnect_delay).await {
                        continue;
                    }
                    break;
                }
            }
        };
        handle.set_provider(Arc::clone(&provider));

        let events = tokio::select! {
            _ = cancel.cancelled() => {
                handle.clear_provider();
                break;
            }
            connected = provider.connect() => match connected {
                Ok(events) => events,
                Err(e) => {
                    warn!(%session_id, error = %e, "connect failed");
                    handle.clear_provider();
                    if wait_for_reconnect(&cancel, inner.config.reconnect_delay).await {
                        continue;
                    }
                    break;
                }
            }
        };

        let outcome = consume_events(&inner, &pipeline, &provider, events, &cancel).await;
        handle.clear_provider();

        match outcome {
            ConnectionOutcome::Cancelled => break,
            ConnectionOutcome::LoggedOut => {
                info!(%session_id, "remote side logged the session out");
                inner
                    .update_session_record(&session_id, |session| {
                        session.state = SessionState::LoggedOut;
                        session.pending_artifact = None;
                    })
                    .await;
                inner.publish_connection_state(&session_id, SessionState::LoggedOut);
                inner.bus.publish(GatewayEvent::new(
                    session_id.clone(),
                    GatewayEventKind::SessionLogout,
                ));
                break;
            }
            ConnectionOutcome::Transient(cause) => {
                if cancel.is_cancelled() {
                    break;
                }
                info!(
                    %session_id,
                    %cause,
                    delay_ms = inner.config.reconnect_delay.as_millis() as u64,
                    "transient disconnect, scheduling reconnect"
                );
                inner
                    .update_session_record(&session_id, |session| {
                        session.state = SessionState::Disconnected;
                    })
                    .await;
                inner.publish_connection_state(&session_id, SessionState::Disconnected);

                inner
                    .update_session_record(&session_id, |session| {
                        session.state = SessionState::Reconnecting;
                    })
                    .await;
                inner.publish_connection_state(&session_id, SessionState::Reconnecting);

                if !wait_for_reconnect(&cancel, inner.config.reconnect_delay).await {
                    break;
                }
            }
        }
    }

    inner.registry.remove(&session_id);
    debug!(%session_id, "connection task exited");
}

/// Sleep out the reconnect delay; `false` means the session was cancelled
/// while waiting and must not reconnect.
async fn wait_for_reconnect(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Consume one connection's event stream until it closes.
async fn consume_events<S, M, C, F, K>(
    inner: &SupervisorInner<S, M, C, F, K>,
    pipeline: &IngestionPipeline<M, C>,
    provider: &Arc<F::Provider>,
    mut events: mpsc::Receiver<ProviderEvent>,
    cancel: &CancellationToken,
) -> ConnectionOutcome
where
    S: SessionRepository,
    M: MessageRepository + Clone,
    C: ContactRepository + Clone,
    F: ProviderFactory,
    K: CredentialStore,
{
    let session_id = pipeline.session_id().clone();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return ConnectionOutcome::Cancelled,
            received = events.recv() => match received {
                Some(event) => event,
                None => {
                    warn!(%session_id, "provider event stream ended");
                    return ConnectionOutcome::Transient(DisconnectCause::ConnectionLost);
                }
            }
        };

        match event {
            ProviderEvent::ConnectionStateChanged { state } => match state {
                ConnectionState::Connecting => {
                    debug!(%session_id, "provider connecting");
                }
                ConnectionState::Open { phone_number } => {
                    // Persist rotated credential material before relying on
                    // it for the next reconnect.
                    if let Err(e) = provider.persist_credentials().await {
                        warn!(%session_id, error = %e, "credential persist failed");
                    }
                    info!(%session_id, %phone_number, "connection established");
                    inner
                        .update_session_record(&session_id, |session| {
                            session.state = SessionState::Connected;
                            session.phone_number = Some(phone_number.clone());
                            session.pending_artifact = None;
                            session.last_connection_at = Some(Utc::now());
                        })
                        .await;
                    inner.publish_connection_state(&session_id, SessionState::Connected);
                    inner.bus.publish(GatewayEvent::new(
                        session_id.clone(),
                        GatewayEventKind::SessionAuthenticated { phone_number },
                    ));
                }
                ConnectionState::Close { cause } => {
                    return if cause.is_terminal() {
                        ConnectionOutcome::LoggedOut
                    } else {
                        ConnectionOutcome::Transient(cause)
                    };
                }
            },
            ProviderEvent::CredentialArtifactIssued { artifact } => {
                info!(%session_id, "credential artifact issued");
                inner
                    .update_session_record(&session_id, |session| {
                        session.state = SessionState::AwaitingCredential;
                        session.pending_artifact = Some(artifact.clone());
                    })
                    .await;
                inner.bus.publish(GatewayEvent::new(
                    session_id.clone(),
                    GatewayEventKind::SessionQr { artifact },
                ));
            }
            ProviderEvent::CredentialsDirty => {
                if let Err(e) = provider.persist_credentials().await {
                    warn!(%session_id, error = %e, "credential persist failed");
                }
            }
            data @ (ProviderEvent::MessagesUpserted { .. }
            | ProviderEvent::MessageStatusChanged { .. }
            | ProviderEvent::ContactsUpdated { .. }) => {
                pipeline.process(data).await;
            }
        }
    }
}
