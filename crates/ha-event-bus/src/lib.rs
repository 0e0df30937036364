//! Event bus with typed pub/sub for Home Assistant
//!
//! The EventBus is the host's message broker. Integrations use it for
//! lifecycle signals such as `homeassistant_stop`, either by holding a
//! receiver or by registering a one-shot listener whose [`Unsubscribe`]
//! goes into the entry's unload arena.

use dashmap::DashMap;
use ha_core::{Context, Event, EventData, EventType, Unsubscribe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A unique identifier for an event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The event bus for publishing and subscribing to events
pub struct EventBus {
    /// Map of event types to their broadcast senders
    listeners: DashMap<EventType, broadcast::Sender<Event<serde_json::Value>>>,
    /// Counter for generating unique listener IDs
    next_listener_id: AtomicU64,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
            capacity,
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe(
        &self,
        event_type: impl Into<EventType>,
    ) -> broadcast::Receiver<Event<serde_json::Value>> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        self.listeners
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to a typed event
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Run `callback` the first time an event of `event_type` fires.
    ///
    /// The subscription is taken before this returns, so an event fired
    /// right after the call is still seen. The returned [`Unsubscribe`]
    /// cancels the listener if it has not fired yet. Must be called from
    /// within a Tokio runtime.
    pub fn listen_once<F>(&self, event_type: impl Into<EventType>, callback: F) -> Unsubscribe
    where
        F: FnOnce(Event<serde_json::Value>) + Send + 'static,
    {
        let event_type = event_type.into();
        let id = self.next_listener_id();
        let mut rx = self.subscribe(event_type.clone());
        debug!(event_type = %event_type, listener = id.0, "Registered one-shot listener");

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        callback(event);
                        return;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "One-shot listener lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Unsubscribe::new(move || task.abort())
    }

    /// Fire an event to all subscribers of its type
    pub fn fire(&self, event: Event<serde_json::Value>) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // Send errors just mean no active receivers
            let _ = sender.send(event);
        }
    }

    /// Fire a typed event
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        let json_data = serde_json::to_value(&data).unwrap_or_default();
        self.fire(Event::new(T::event_type(), json_data, context));
    }

    /// Generate a new unique listener ID
    pub fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Number of receivers currently subscribed to `event_type`
    pub fn receiver_count(&self, event_type: impl Into<EventType>) -> usize {
        self.listeners
            .get(&event_type.into())
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for typed events
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event<serde_json::Value>>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<Event<serde_json::Value>>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next event whose data deserializes as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(Event {
                    event_type: event.event_type,
                    data,
                    time_fired: event.time_fired,
                    context: event.context,
                });
            }
        }
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::events::{HomeAssistantStopData, HOMEASSISTANT_STOP};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("test_event");

        bus.fire(Event::new("test_event", json!({"key": "value"}), Context::new()));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), "test_event");
        assert_eq!(received.data["key"], "value");
    }

    #[test]
    fn test_receiver_woken_by_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("test_event");
        let mut recv = task::spawn(rx.recv());
        assert_pending!(recv.poll());

        bus.fire(Event::new("test_event", json!({"n": 1}), Context::new()));
        assert!(recv.is_woken());
        let event = assert_ready_ok!(recv.poll());
        assert_eq!(event.data["n"], 1);
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<HomeAssistantStopData>();

        bus.fire_typed(HomeAssistantStopData::default(), Context::new());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), HOMEASSISTANT_STOP);
    }

    #[tokio::test]
    async fn test_listen_once_fires_a_single_time() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let _unsub = bus.listen_once(HOMEASSISTANT_STOP, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.fire_typed(HomeAssistantStopData::default(), Context::new());
        bus.fire_typed(HomeAssistantStopData::default(), Context::new());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listen_once_cancelled_before_fire() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let unsub = bus.listen_once(HOMEASSISTANT_STOP, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(unsub.call());
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.fire_typed(HomeAssistantStopData::default(), Context::new());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.receiver_count(HOMEASSISTANT_STOP), 0);
    }

    #[tokio::test]
    async fn test_no_cross_event_pollution() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe("event_a");
        let mut rx_b = bus.subscribe("event_b");

        bus.fire(Event::new("event_a", json!({"type": "a"}), Context::new()));

        assert_eq!(rx_a.recv().await.unwrap().data["type"], "a");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_listener_id_uniqueness() {
        let bus = EventBus::new();
        let id1 = bus.next_listener_id();
        let id2 = bus.next_listener_id();
        assert_ne!(id1, id2);
    }
}
