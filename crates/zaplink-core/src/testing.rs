//! In-memory test doubles for the repository, provider, and credential
//! ports, shared by the supervisor, pipeline, and messaging tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use zaplink_types::contact::Contact;
use zaplink_types::error::{CredentialStoreError, ProviderError, RepositoryError};
use zaplink_types::message::{Message, MessageStatus};
use zaplink_types::provider::{ContactFields, OutboundReceipt, ProviderEvent};
use zaplink_types::session::{Session, SessionId, SessionState};

use crate::bus::EventBus;
use crate::credentials::CredentialStore;
use crate::messaging::MessageService;
use crate::provider::{ConnectionProvider, ProviderFactory};
use crate::repository::{ContactRepository, MessageRepository, SessionRepository};
use crate::supervisor::{SessionSupervisor, SupervisorConfig};

// ---------------------------------------------------------------------------
// In-memory repositories
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub(crate) struct InMemorySessions {
    records: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl SessionRepository for InMemorySessions {
    async fn create(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&session.id) {
            return Err(RepositoryError::Conflict("sessions.id".to_string()));
        }
        records.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.records.lock().unwrap().get(session_id).cloned())
    }

    async fn update(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(&session.id) {
            return Err(RepositoryError::NotFound);
        }
        records.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<Session>, RepositoryError> {
        let records = self.records.lock().unwrap();
        let mut sessions: Vec<Session> = records
            .values()
            .filter(|s| owner_id.is_none_or(|owner| s.owner_id == owner))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn count_for_owner(&self, owner_id: &str) -> Result<u64, RepositoryError> {
        let records = self.records.lock().unwrap();
        Ok(records.values().filter(|s| s.owner_id == owner_id).count() as u64)
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        match self.records.lock().unwrap().remove(session_id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryMessages {
    records: Arc<Mutex<HashMap<(SessionId, String), Message>>>,
    fail_next_insert: Arc<AtomicBool>,
}

impl InMemoryMessages {
    /// Make the next insert fail with a query error (event-isolation tests).
    pub(crate) fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl MessageRepository for InMemoryMessages {
    async fn insert(&self, message: &Message) -> Result<(), RepositoryError> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Query("injected insert failure".to_string()));
        }
        let key = (message.session_id.clone(), message.message_id.clone());
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&key) {
            return Err(RepositoryError::Conflict("messages.message_id".to_string()));
        }
        records.insert(key, message.clone());
        Ok(())
    }

    async fn get(
        &self,
        session_id: &SessionId,
        message_id: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let key = (session_id.clone(), message_id.to_string());
        Ok(self.records.lock().unwrap().get(&key).cloned())
    }

    async fn update_status(
        &self,
        session_id: &SessionId,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), RepositoryError> {
        let key = (session_id.clone(), message_id.to_string());
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&key) {
            Some(message) => {
                message.status = status;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn history(
        &self,
        session_id: &SessionId,
        remote_jid: &str,
        limit: i64,
        before_timestamp: Option<i64>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let records = self.records.lock().unwrap();
        let mut page: Vec<Message> = records
            .values()
            .filter(|m| {
                m.session_id == *session_id
                    && m.remote_jid == remote_jid
                    && before_timestamp.is_none_or(|before| m.timestamp < before)
            })
            .cloned()
            .collect();
        // Newest `limit` messages of the window, returned ascending.
        page.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        page.truncate(limit.max(0) as usize);
        page.reverse();
        Ok(page)
    }

    async fn delete_for_session(&self, session_id: &SessionId) -> Result<u64, RepositoryError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|(sid, _), _| sid != session_id);
        Ok((before - records.len()) as u64)
    }

    async fn count_for_session(&self, session_id: &SessionId) -> Result<u64, RepositoryError> {
        let records = self.records.lock().unwrap();
        Ok(records.keys().filter(|(sid, _)| sid == session_id).count() as u64)
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryContacts {
    records: Arc<Mutex<HashMap<(SessionId, String), Contact>>>,
}

impl ContactRepository for InMemoryContacts {
    async fn upsert_fields(
        &self,
        session_id: &SessionId,
        fields: &ContactFields,
    ) -> Result<Contact, RepositoryError> {
        let key = (session_id.clone(), fields.jid.clone());
        let mut records = self.records.lock().unwrap();
        let contact = records
            .entry(key)
            .or_insert_with(|| Contact::new(session_id.clone(), fields.jid.clone()));
        if let Some(name) = &fields.name {
            contact.name = Some(name.clone());
        }
        if let Some(push_name) = &fields.push_name {
            contact.push_name = Some(push_name.clone());
        }
        if let Some(status) = &fields.status {
            contact.status = Some(status.clone());
        }
        if let Some(url) = &fields.profile_picture_url {
            contact.profile_picture_url = Some(url.clone());
        }
        contact.updated_at = Utc::now();
        Ok(contact.clone())
    }

    async fn record_interaction(
        &self,
        session_id: &SessionId,
        jid: &str,
        push_name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let key = (session_id.clone(), jid.to_string());
        let mut records = self.records.lock().unwrap();
        let contact = records
            .entry(key)
            .or_insert_with(|| Contact::new(session_id.clone(), jid));
        if contact.push_name.is_none() {
            contact.push_name = push_name.map(str::to_string);
        }
        contact.touch(at);
        Ok(())
    }

    async fn get(
        &self,
        session_id: &SessionId,
        jid: &str,
    ) -> Result<Option<Contact>, RepositoryError> {
        let key = (session_id.clone(), jid.to_string());
        Ok(self.records.lock().unwrap().get(&key).cloned())
    }

    async fn list(&self, session_id: &SessionId) -> Result<Vec<Contact>, RepositoryError> {
        let records = self.records.lock().unwrap();
        let mut contacts: Vec<Contact> = records
            .values()
            .filter(|c| c.session_id == *session_id)
            .cloned()
            .collect();
        contacts.sort_by(|a, b| b.last_interaction.cmp(&a.last_interaction));
        Ok(contacts)
    }

    async fn delete_for_session(&self, session_id: &SessionId) -> Result<u64, RepositoryError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|(sid, _), _| sid != session_id);
        Ok((before - records.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// In-memory credential store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct InMemoryCredentials {
    root: PathBuf,
    dirs: Arc<Mutex<HashSet<SessionId>>>,
    removals: Arc<Mutex<Vec<SessionId>>>,
}

impl Default for InMemoryCredentials {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/nonexistent/zaplink-test-credentials"),
            dirs: Arc::default(),
            removals: Arc::default(),
        }
    }
}

impl InMemoryCredentials {
    pub(crate) fn has_dir(&self, session_id: &SessionId) -> bool {
        self.dirs.lock().unwrap().contains(session_id)
    }

    pub(crate) fn removal_count(&self, session_id: &SessionId) -> usize {
        self.removals
            .lock()
            .unwrap()
            .iter()
            .filter(|id| *id == session_id)
            .count()
    }
}

impl CredentialStore for InMemoryCredentials {
    async fn ensure_dir(&self, session_id: &SessionId) -> Result<PathBuf, CredentialStoreError> {
        self.dirs.lock().unwrap().insert(session_id.clone());
        Ok(self.root.join(session_id.to_string()))
    }

    async fn remove(&self, session_id: &SessionId) -> Result<(), CredentialStoreError> {
        self.dirs.lock().unwrap().remove(session_id);
        self.removals.lock().unwrap().push(session_id.clone());
        Ok(())
    }

    async fn has_credentials(&self, session_id: &SessionId) -> Result<bool, CredentialStoreError> {
        Ok(self.has_dir(session_id))
    }
}

// ---------------------------------------------------------------------------
// Scripted provider
// ---------------------------------------------------------------------------

/// Control surface for the scripted provider shared with the test body.
///
/// Tests emit provider events through `emit` and observe calls the
/// supervisor makes back into the provider.
pub(crate) struct ProviderHub {
    event_tx: Mutex<Option<mpsc::Sender<ProviderEvent>>>,
    connects_tx: watch::Sender<usize>,
    connects_rx: watch::Receiver<usize>,
    persist_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    send_queue: Mutex<VecDeque<Result<OutboundReceipt, ProviderError>>>,
    sent: Mutex<Vec<(String, String)>>,
    send_seq: AtomicUsize,
}

impl ProviderHub {
    pub(crate) fn new() -> Arc<Self> {
        let (connects_tx, connects_rx) = watch::channel(0);
        Arc::new(Self {
            event_tx: Mutex::new(None),
            connects_tx,
            connects_rx,
            persist_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            send_queue: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            send_seq: AtomicUsize::new(0),
        })
    }

    /// Push an event into the current connection's stream.
    pub(crate) async fn emit(&self, event: ProviderEvent) {
        let tx = self
            .event_tx
            .lock()
            .unwrap()
            .clone()
            .expect("no live connection to emit into");
        tx.send(event).await.expect("event stream closed");
    }

    /// Block until at least `n` connects have happened.
    pub(crate) async fn wait_for_connects(&self, n: usize) {
        let mut rx = self.connects_rx.clone();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|count| *count >= n))
            .await
            .expect("timed out waiting for connect")
            .expect("connect watch closed");
    }

    pub(crate) fn connects(&self) -> usize {
        *self.connects_rx.borrow()
    }

    pub(crate) fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn queue_send_failure(&self, error: ProviderError) {
        self.send_queue.lock().unwrap().push_back(Err(error));
    }

    pub(crate) fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

pub(crate) struct ScriptedProvider {
    hub: Arc<ProviderHub>,
}

impl ConnectionProvider for ScriptedProvider {
    async fn connect(&self) -> Result<mpsc::Receiver<ProviderEvent>, ProviderError> {
        let (tx, rx) = mpsc::channel(64);
        *self.hub.event_tx.lock().unwrap() = Some(tx);
        self.hub.connects_tx.send_modify(|count| *count += 1);
        Ok(rx)
    }

    async fn send_text(&self, jid: &str, text: &str) -> Result<OutboundReceipt, ProviderError> {
        self.hub
            .sent
            .lock()
            .unwrap()
            .push((jid.to_string(), text.to_string()));
        if let Some(queued) = self.hub.send_queue.lock().unwrap().pop_front() {
            return queued;
        }
        let seq = self.hub.send_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OutboundReceipt {
            message_id: format!("out-{seq}"),
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    async fn persist_credentials(&self) -> Result<(), ProviderError> {
        self.hub.persist_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.hub.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        // A disconnected provider stops emitting.
        *self.hub.event_tx.lock().unwrap() = None;
    }
}

pub(crate) struct ScriptedFactory {
    hub: Arc<ProviderHub>,
}

impl ProviderFactory for ScriptedFactory {
    type Provider = ScriptedProvider;

    async fn create(
        &self,
        _session_id: &SessionId,
        _credential_dir: &std::path::Path,
    ) -> Result<Self::Provider, ProviderError> {
        Ok(ScriptedProvider {
            hub: Arc::clone(&self.hub),
        })
    }
}

// ---------------------------------------------------------------------------
// Wired-up gateway for supervisor/messaging tests
// ---------------------------------------------------------------------------

pub(crate) type TestSupervisor = SessionSupervisor<
    InMemorySessions,
    InMemoryMessages,
    InMemoryContacts,
    ScriptedFactory,
    InMemoryCredentials,
>;

pub(crate) type TestMessageService =
    MessageService<ScriptedProvider, InMemorySessions, InMemoryMessages, InMemoryContacts>;

pub(crate) struct TestGateway {
    pub supervisor: TestSupervisor,
    pub hub: Arc<ProviderHub>,
    pub bus: EventBus,
    pub sessions: InMemorySessions,
    pub messages: InMemoryMessages,
    pub contacts: InMemoryContacts,
    pub credentials: InMemoryCredentials,
}

impl TestGateway {
    pub(crate) fn message_service(&self) -> TestMessageService {
        MessageService::new(
            self.supervisor.registry(),
            self.sessions.clone(),
            self.messages.clone(),
            self.contacts.clone(),
        )
    }

    /// Poll storage until the session reaches `state` (2 s timeout).
    pub(crate) async fn wait_for_state(&self, session_id: &SessionId, state: SessionState) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let current = self
                .sessions
                .get(session_id)
                .await
                .unwrap()
                .map(|session| session.state);
            if current == Some(state) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for {state}, last saw {current:?}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Build a fully wired supervisor over in-memory ports.
pub(crate) fn gateway_with(config: SupervisorConfig) -> TestGateway {
    let hub = ProviderHub::new();
    let bus = EventBus::new();
    let sessions = InMemorySessions::default();
    let messages = InMemoryMessages::default();
    let contacts = InMemoryContacts::default();
    let credentials = InMemoryCredentials::default();

    let supervisor = SessionSupervisor::new(
        config,
        sessions.clone(),
        messages.clone(),
        contacts.clone(),
        ScriptedFactory { hub: Arc::clone(&hub) },
        credentials.clone(),
        bus.clone(),
    );

    TestGateway {
        supervisor,
        hub,
        bus,
        sessions,
        messages,
        contacts,
        credentials,
    }
}

/// Default test gateway: quotas as configured in production defaults but a
/// fast reconnect delay so tests do not sleep for seconds.
pub(crate) fn gateway() -> TestGateway {
    gateway_with(SupervisorConfig {
        reconnect_delay: Duration::from_millis(20),
        ..SupervisorConfig::default()
    })
}
