//! Connection-provider trait definitions.
//!
//! The supervisor and ingestion pipeline consume the chat network through
//! these capability traits only -- never through a concrete wire-protocol
//! implementation. Events arrive over an `mpsc` channel rather than
//! re-entrant callbacks, so per-session ordering is explicit: whatever the
//! provider pushed first is received first.

use tokio::sync::mpsc;
use zaplink_types::error::ProviderError;
use zaplink_types::provider::{OutboundReceipt, ProviderEvent};
use zaplink_types::session::SessionId;

use std::path::Path;

/// A live connection to the remote chat network for one session.
///
/// Implementations are owned behind `Arc` by the supervisor's running
/// handle, shared with the outbound send path.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Establish the connection and return its event stream.
    ///
    /// The returned receiver yields events for the lifetime of this
    /// connection; the stream ending is treated as a disconnect.
    fn connect(
        &self,
    ) -> impl std::future::Future<Output = Result<mpsc::Receiver<ProviderEvent>, ProviderError>> + Send;

    /// Send a text message to a jid, returning the provider-assigned id.
    fn send_text(
        &self,
        jid: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<OutboundReceipt, ProviderError>> + Send;

    /// Flush rotated credential material to the credential directory.
    ///
    /// Must be called whenever the provider signals `CredentialsDirty`,
    /// before assuming a later reconnect will succeed.
    fn persist_credentials(
        &self,
    ) -> impl std::future::Future<Output = Result<(), ProviderError>> + Send;

    /// Explicitly close the connection (terminal; no reconnect follows).
    fn disconnect(&self) -> impl std::future::Future<Output = ()> + Send;
}

/// Factory constructing a provider bound to a session's credential directory.
pub trait ProviderFactory: Send + Sync + 'static {
    type Provider: ConnectionProvider;

    fn create(
        &self,
        session_id: &SessionId,
        credential_dir: &Path,
    ) -> impl std::future::Future<Output = Result<Self::Provider, ProviderError>> + Send;
}

