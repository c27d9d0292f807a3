//! Host primitives for the pool chemistry runtime
//!
//! Entity identifiers, entity states, events and the context that links
//! them. Every other crate in the workspace builds on these types.

mod context;
mod entity_id;
mod event;
mod state;

pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use state::State;

/// State value reported when an entity has no known value
pub const STATE_UNKNOWN: &str = "unknown";

/// State value reported when an entity cannot be reached
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Attribute carrying the unit a numeric state is expressed in
pub const ATTR_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";

/// Attribute carrying the display name of an entity
pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";

/// Temperature units as they appear in `unit_of_measurement`
pub mod units {
    pub const CELSIUS: &str = "°C";
    pub const FAHRENHEIT: &str = "°F";
    pub const PPM: &str = "ppm";
    pub const PERCENT: &str = "%";
}

/// Standard event types
pub mod events {
    use super::*;

    /// Event type for state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Event type fired once the runtime has started
    pub const RUNTIME_STARTED: &str = "runtime_started";

    /// Event type fired when the runtime is shutting down
    pub const RUNTIME_STOP: &str = "runtime_stop";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}
