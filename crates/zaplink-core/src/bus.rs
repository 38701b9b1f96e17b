//! Topic-based event bus for distributing `GatewayEvent` to subscribers.
//!
//! Topics are hierarchical strings (`category:eventType:sessionId`); each
//! category additionally has a `category:any` wildcard topic that receives
//! every event of that category. Built on per-topic `tokio::sync::broadcast`
//! channels, so delivery is synchronous within the publishing call,
//! best-effort, and at-most-once: late subscribers miss earlier events.
//!
//! The bus is constructed explicitly and injected into its producers; there
//! is no global instance. `shutdown` drops every channel, disconnecting all
//! subscribers.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use zaplink_types::event::GatewayEvent;

/// Default per-topic channel capacity.
const TOPIC_BUFFER: usize = 1024;

/// In-process publish/subscribe router for gateway events.
///
/// Cloning the bus clones a handle to the same channel map, allowing
/// multiple producers and consumers.
pub struct EventBus {
    channels: Arc<DashMap<String, broadcast::Sender<GatewayEvent>>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the default per-topic capacity.
    pub fn new() -> Self {
        Self::with_capacity(TOPIC_BUFFER)
    }

    /// Create a new event bus with the given per-topic channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Subscribe to a topic, creating its channel on first use.
    ///
    /// The receiver sees only events published after this call.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<GatewayEvent> {
        let entry = self
            .channels
            .entry(topic.to_string())
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            });
        entry.subscribe()
    }

    /// Publish an event to its exact topic and its category wildcard topic.
    ///
    /// Returns the number of receivers the event reached. Topics nobody has
    /// subscribed to do not exist, so publishing into silence is free.
    pub fn publish(&self, event: GatewayEvent) -> usize {
        let exact = event.topic();
        let wildcard = event.wildcard_topic();

        let mut delivered = 0;
        if let Some(sender) = self.channels.get(&wildcard) {
            delivered += sender.send(event.clone()).unwrap_or(0);
        }
        if let Some(sender) = self.channels.get(&exact) {
            delivered += sender.send(event).unwrap_or(0);
        }

        debug!(topic = %exact, delivered, "published gateway event");
        delivered
    }

    /// Drop a topic's channel, disconnecting its subscribers.
    ///
    /// Removing a topic that was never subscribed is a no-op; returns
    /// whether a channel existed.
    pub fn remove_topic(&self, topic: &str) -> bool {
        self.channels.remove(topic).is_some()
    }

    /// Drop every channel, disconnecting all subscribers.
    pub fn shutdown(&self) {
        let count = self.channels.len();
        self.channels.clear();
        debug!(topics = count, "event bus shut down");
    }

    /// Number of live topics (subscribed at least once and not removed).
    pub fn topic_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            capacity: self.capacity,
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.channels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;
    use zaplink_types::event::GatewayEventKind;
    use zaplink_types::message::MessageStatus;
    use zaplink_types::session::{SessionId, SessionState};

    fn status_event(session_id: &SessionId) -> GatewayEvent {
        GatewayEvent::new(
            session_id.clone(),
            GatewayEventKind::MessageStatus {
                message_id: "M1".to_string(),
                status: MessageStatus::Delivered,
            },
        )
    }

    #[tokio::test]
    async fn publish_reaches_exact_topic_subscriber() {
        let bus = EventBus::new();
        let sid = SessionId::new();
        let mut rx = bus.subscribe(&format!("message:status:{sid}"));

        let delivered = bus.publish(status_event(&sid));
        assert_eq!(delivered, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, sid);
        assert!(matches!(received.kind, GatewayEventKind::MessageStatus { .. }));
    }

    #[tokio::test]
    async fn wildcard_receives_all_sessions_of_category() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("message:any");

        let s1 = SessionId::new();
        let s2 = SessionId::new();
        bus.publish(status_event(&s1));
        bus.publish(status_event(&s2));

        assert_eq!(rx.recv().await.unwrap().session_id, s1);
        assert_eq!(rx.recv().await.unwrap().session_id, s2);
    }

    #[tokio::test]
    async fn wildcard_does_not_cross_categories() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("contact:any");

        bus.publish(status_event(&SessionId::new()));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn exact_and_wildcard_both_counted() {
        let bus = EventBus::new();
        let sid = SessionId::new();
        let _exact = bus.subscribe(&format!("message:status:{sid}"));
        let _any = bus.subscribe("message:any");

        assert_eq!(bus.publish(status_event(&sid)), 2);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_dropped() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(status_event(&SessionId::new())), 0);
    }

    #[tokio::test]
    async fn other_sessions_topic_is_isolated() {
        let bus = EventBus::new();
        let mine = SessionId::new();
        let other = SessionId::new();
        let mut rx = bus.subscribe(&format!("message:status:{mine}"));

        bus.publish(status_event(&other));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        let sid = SessionId::new();
        bus.publish(status_event(&sid));

        let mut rx = bus.subscribe(&format!("message:status:{sid}"));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn remove_topic_is_noop_when_absent() {
        let bus = EventBus::new();
        assert!(!bus.remove_topic("message:any"));

        let _rx = bus.subscribe("message:any");
        assert!(bus.remove_topic("message:any"));
        assert!(!bus.remove_topic("message:any"));
    }

    #[tokio::test]
    async fn shutdown_disconnects_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("session:any");
        bus.shutdown();
        assert_eq!(bus.topic_count(), 0);

        let sid = SessionId::new();
        bus.publish(GatewayEvent::new(
            sid,
            GatewayEventKind::SessionConnection { state: SessionState::Connected },
        ));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));
    }

    #[tokio::test]
    async fn clone_shares_channels() {
        let bus = EventBus::new();
        let bus2 = bus.clone();
        let sid = SessionId::new();
        let mut rx = bus.subscribe(&format!("message:status:{sid}"));

        bus2.publish(status_event(&sid));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn debug_impl() {
        let bus = EventBus::new();
        let debug = format!("{bus:?}");
        assert!(debug.contains("EventBus"));
        assert!(debug.contains("topics"));
    }
}
