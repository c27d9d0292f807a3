//! Events carried on the bus
//!
//! An [`Event`] is a type name, a payload, the time it was fired and the
//! [`Context`] that caused it. Payloads travel as JSON and are turned back
//! into typed [`EventData`] by subscribers that want them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Context;

/// A payload that always travels under the same event type
pub trait EventData: Clone + Send + Sync + 'static {
    fn event_type() -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T = serde_json::Value> {
    pub event_type: EventType,
    pub data: T,
    pub time_fired: DateTime<Utc>,
    pub context: Context,
}

impl<T> Event<T> {
    pub fn new(event_type: impl Into<EventType>, data: T, context: Context) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            time_fired: Utc::now(),
            context,
        }
    }

    /// The same event carrying `data` instead, e.g. a decoded payload
    pub fn with_data<U>(self, data: U) -> Event<U> {
        Event {
            event_type: self.event_type,
            data,
            time_fired: self.time_fired,
            context: self.context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_data_keeps_metadata() {
        let raw = Event::new("pool_reading", json!({"ph": 7.4}), Context::new());
        let ph = raw.data["ph"].as_f64().unwrap();
        let fired = raw.time_fired;
        let context_id = raw.context.id.clone();

        let typed = raw.with_data(ph);
        assert_eq!(typed.data, 7.4);
        assert_eq!(typed.event_type.as_str(), "pool_reading");
        assert_eq!(typed.time_fired, fired);
        assert_eq!(typed.context.id, context_id);
    }

    #[test]
    fn test_event_type_serializes_as_string() {
        let event = Event::new("runtime_started", json!({}), Context::new());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], json!("runtime_started"));
    }
}
