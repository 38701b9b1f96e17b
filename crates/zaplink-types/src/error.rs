use thiserror::Error;

/// Errors surfaced by gateway operations (supervisor and messaging).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("session not found")]
    NotFound,

    #[error("owner session quota of {limit} reached")]
    QuotaExceeded { limit: usize },

    #[error("global running-session quota of {limit} reached")]
    GlobalQuotaExceeded { limit: usize },

    #[error("session is not running")]
    SessionNotRunning,

    #[error("no credential artifact available")]
    ArtifactNotAvailable,

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("credential store error: {0}")]
    CredentialStore(#[from] CredentialStoreError),
}

/// Errors from repository operations (used by trait definitions in zaplink-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors reported by a connection provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("credential persist failed: {0}")]
    PersistFailed(String),

    #[error("provider is not connected")]
    NotConnected,
}

/// Errors from the on-disk credential-directory store.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
