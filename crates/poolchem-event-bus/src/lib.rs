//! Event bus with typed pub/sub
//!
//! Each event type gets its own broadcast channel, created lazily on first
//! subscription. Receivers see events in the order they were fired.
//! [`EventBus::track_state_changes`] narrows the `state_changed` stream to a
//! fixed set of entities, which is how integrations follow their source
//! sensors.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use poolchem_core::events::StateChangedData;
use poolchem_core::{Context, EntityId, Event, EventData, EventType};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

type RawEvent = Event<serde_json::Value>;

pub struct EventBus {
    listeners: DashMap<EventType, broadcast::Sender<RawEvent>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            listeners: DashMap::new(),
            capacity,
        }
    }

    fn sender(&self, event_type: EventType) -> broadcast::Sender<RawEvent> {
        self.listeners
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to events of a specific type
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<RawEvent> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");
        self.sender(event_type).subscribe()
    }

    /// Subscribe to a typed event, receiving deserialized payloads
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Follow `state_changed` events for the given entities only
    pub fn track_state_changes(
        &self,
        entity_ids: impl IntoIterator<Item = EntityId>,
    ) -> StateChangeTracker {
        let entity_ids: HashSet<EntityId> = entity_ids.into_iter().collect();
        debug!(count = entity_ids.len(), "Tracking state changes");
        StateChangeTracker {
            rx: self.subscribe_typed(),
            entity_ids,
        }
    }

    /// Fire an event to every subscriber of its type
    pub fn fire(&self, event: RawEvent) {
        debug!(event_type = %event.event_type, "Firing event");
        if let Some(sender) = self.listeners.get(&event.event_type) {
            // A send error only means nobody is listening
            let _ = sender.send(event);
        }
    }

    /// Serialize a typed payload and fire it
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        let data = match serde_json::to_value(&data) {
            Ok(value) => value,
            Err(err) => {
                warn!(event_type = T::event_type(), error = %err, "Dropping unserializable event");
                return;
            }
        };
        self.fire(Event::new(T::event_type(), data, context));
    }

    /// Number of event types with live channels
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for typed events
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<RawEvent>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<RawEvent>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next event whose payload deserializes as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            match <T as serde::Deserialize>::deserialize(&event.data) {
                Ok(data) => return Ok(event.with_data(data)),
                Err(err) => trace!(error = %err, "Skipping malformed event payload"),
            }
        }
    }
}

/// `state_changed` receiver restricted to a set of entities
pub struct StateChangeTracker {
    rx: TypedEventReceiver<StateChangedData>,
    entity_ids: HashSet<EntityId>,
}

impl StateChangeTracker {
    /// Receive the next change to one of the tracked entities
    pub async fn recv(&mut self) -> Result<Event<StateChangedData>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.entity_ids.contains(&event.data.entity_id) {
                return Ok(event);
            }
        }
    }

    pub fn entity_ids(&self) -> &HashSet<EntityId> {
        &self.entity_ids
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use poolchem_core::State;
    use serde_json::json;
    use std::collections::HashMap;

    fn change(entity_id: &str, value: &str) -> StateChangedData {
        let entity_id: EntityId = entity_id.parse().unwrap();
        StateChangedData {
            entity_id: entity_id.clone(),
            old_state: None,
            new_state: Some(State::new(entity_id, value, HashMap::new(), Context::new())),
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("pool_event");

        bus.fire(Event::new("pool_event", json!({"key": "value"}), Context::new()));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), "pool_event");
        assert_eq!(received.data["key"], "value");
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<StateChangedData>();

        bus.fire_typed(change("sensor.pool_ph", "7.4"), Context::new());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data.entity_id.to_string(), "sensor.pool_ph");
        assert_eq!(received.data.new_state.unwrap().state, "7.4");
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

    #[tokio::test]
    async fn test_tracker_filters_entities() {
        let bus = EventBus::new();
        let mut tracker = bus.track_state_changes(vec![
            "sensor.pool_ph".parse().unwrap(),
            "sensor.pool_fc".parse().unwrap(),
        ]);

        bus.fire_typed(change("sensor.kitchen_temp", "21"), Context::new());
        bus.fire_typed(change("sensor.pool_fc", "3.0"), Context::new());
        bus.fire_typed(change("sensor.pool_ph", "7.6"), Context::new());

        let first = tracker.recv().await.unwrap();
        assert_eq!(first.data.entity_id.to_string(), "sensor.pool_fc");
        let second = tracker.recv().await.unwrap();
        assert_eq!(second.data.entity_id.to_string(), "sensor.pool_ph");
        assert_eq!(tracker.entity_ids().len(), 2);
    }

    #[tokio::test]
    async fn test_fire_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.fire(Event::new("nobody_home", json!({}), Context::new()));
        assert_eq!(bus.listener_count(), 0);
    }
}
