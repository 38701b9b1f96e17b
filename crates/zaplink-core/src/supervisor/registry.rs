//! Running-handle registry.
//!
//! The registry is the one piece of state shared by every session task and
//! the supervisor's public operations. It maps `SessionId` to the session's
//! running handle and enforces the at-most-one-owner invariant: `claim` is
//! atomic, so two concurrent starts can never both register a handle for
//! the same session.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zaplink_types::session::SessionId;

/// Handle to one running session.
///
/// Owns the cancellation token that stops the connection task (and any
/// pending reconnect), the current provider instance (swapped across
/// reconnects), and the task join handle.
pub struct SessionHandle<P> {
    session_id: SessionId,
    cancel: CancellationToken,
    provider: RwLock<Option<Arc<P>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P> SessionHandle<P> {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            cancel: CancellationToken::new(),
            provider: RwLock::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Token cancelling the connection task and any pending reconnect.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The provider of the current connection attempt, if one is live.
    pub fn provider(&self) -> Option<Arc<P>> {
        self.provider.read().ok().and_then(|guard| guard.clone())
    }

    pub(crate) fn set_provider(&self, provider: Arc<P>) {
        if let Ok(mut guard) = self.provider.write() {
            *guard = Some(provider);
        }
    }

    pub(crate) fn clear_provider(&self) {
        if let Ok(mut guard) = self.provider.write() {
            *guard = None;
        }
    }

    pub(crate) fn set_task(&self, task: JoinHandle<()>) {
        if let Ok(mut guard) = self.task.lock() {
            *guard = Some(task);
        }
    }

    pub(crate) fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().ok().and_then(|mut guard| guard.take())
    }
}

/// Concurrent map of running session handles.
///
/// Cloning shares the underlying map.
pub struct SessionRegistry<P> {
    inner: Arc<DashMap<SessionId, Arc<SessionHandle<P>>>>,
}

impl<P> SessionRegistry<P> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Atomically register a handle for its session.
    ///
    /// Returns `false` (leaving the existing handle in place) when the
    /// session already has one -- the at-most-one-owner invariant.
    pub fn claim(&self, handle: Arc<SessionHandle<P>>) -> bool {
        match self.inner.entry(handle.session_id().clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    pub fn get(&self, session_id: &SessionId) -> Option<Arc<SessionHandle<P>>> {
        self.inner
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Deregister a session's handle. Idempotent.
    pub fn remove(&self, session_id: &SessionId) -> Option<Arc<SessionHandle<P>>> {
        self.inner.remove(session_id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.inner.contains_key(session_id)
    }

    /// Number of currently registered running handles.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<P> Default for SessionRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for SessionRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> std::fmt::Debug for SessionRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("running", &self.inner.len())
            .finish()
    }
}
