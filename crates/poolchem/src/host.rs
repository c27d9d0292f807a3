//! Capability interfaces onto the host
//!
//! The coordinator never touches the state machine, event bus or config
//! entries directly. It reads sensors through [`SensorReader`], reads and
//! writes its records through [`ConfigStore`] and follows its source
//! sensors through [`EventSubscriber`]. The host crates implement all three;
//! tests substitute their own.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use poolchem_config_entries::ConfigEntries;
use poolchem_core::EntityId;
use poolchem_event_bus::EventBus;
use poolchem_state_machine::StateMachine;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::error::Result;

/// A numeric sensor reading
#[derive(Debug, Clone, PartialEq)]
pub struct SensorValue {
    pub value: f64,
    pub unit: Option<String>,
}

pub trait SensorReader: Send + Sync {
    /// Current value of a sensor
    ///
    /// `None` when the entity does not exist, is `unknown`/`unavailable`,
    /// or its state is not a number.
    fn read(&self, entity_id: &EntityId) -> Option<SensorValue>;
}

impl SensorReader for StateMachine {
    fn read(&self, entity_id: &EntityId) -> Option<SensorValue> {
        let state = self.get(entity_id)?;
        let value = state.numeric_value()?;
        Some(SensorValue {
            value,
            unit: state.unit_of_measurement().map(str::to_string),
        })
    }
}

/// Both records of one config entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigRecord {
    pub data: HashMap<String, Value>,
    pub options: HashMap<String, Value>,
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn read(&self, entry_id: &str) -> Option<ConfigRecord>;

    /// Merge `options` into the entry's options and persist them
    async fn write_options(&self, entry_id: &str, options: HashMap<String, Value>) -> Result<()>;
}

#[async_trait]
impl ConfigStore for ConfigEntries {
    async fn read(&self, entry_id: &str) -> Option<ConfigRecord> {
        self.get(entry_id).map(|entry| ConfigRecord {
            data: entry.data,
            options: entry.options,
        })
    }

    async fn write_options(&self, entry_id: &str, options: HashMap<String, Value>) -> Result<()> {
        self.merge_options(entry_id, options).await?;
        Ok(())
    }
}

/// A notification about the source sensors
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChange {
    Changed {
        entity_id: EntityId,
        new_state: Option<String>,
    },
    /// The listener fell behind and dropped this many notifications
    Missed(u64),
}

pub type ChangeCallback = Arc<dyn Fn(SourceChange) + Send + Sync>;

/// Handle to a live subscription; dropping it unsubscribes
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub trait EventSubscriber: Send + Sync {
    /// Invoke `callback` for every state change of `entity_ids`, in the
    /// order the host emits them
    fn subscribe(&self, entity_ids: Vec<EntityId>, callback: ChangeCallback) -> Subscription;
}

impl EventSubscriber for EventBus {
    fn subscribe(&self, entity_ids: Vec<EntityId>, callback: ChangeCallback) -> Subscription {
        // Subscribe before spawning so nothing fired after this call is lost
        let mut tracker = self.track_state_changes(entity_ids);
        let task = tokio::spawn(async move {
            loop {
                match tracker.recv().await {
                    Ok(event) => callback(SourceChange::Changed {
                        entity_id: event.data.entity_id,
                        new_state: event.data.new_state.map(|s| s.state),
                    }),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Source sensor listener lagged");
                        callback(SourceChange::Missed(missed));
                    }
                    Err(RecvError::Closed) => {
                        debug!("Event bus closed, stopping source listener");
                        break;
                    }
                }
            }
        });
        Subscription::new(move || task.abort())
    }
}
