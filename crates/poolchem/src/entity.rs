//! Shared plumbing for the entities a pool exposes
//!
//! Every entity belongs to one pool device, is identified by
//! `{entry_id}_{key}` and is rendered into the state machine as a plain
//! state string plus attributes.

use std::collections::HashMap;

use poolchem_core::{Context, EntityId, ATTR_FRIENDLY_NAME, STATE_UNAVAILABLE};
use poolchem_state_machine::StateMachine;
use serde::Serialize;
use serde_json::{json, Value};

use crate::consts::{DOMAIN, MANUFACTURER, MODEL, VERSION};
use crate::error::Result;
use crate::types::PoolConfig;

pub const ATTR_ICON: &str = "icon";
pub const ATTR_DEVICE_CLASS: &str = "device_class";
pub const ATTR_STATE_CLASS: &str = "state_class";
pub const ATTR_OPTIONS: &str = "options";

/// Groups all entities of one pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

impl DeviceInfo {
    pub fn for_pool(entry_id: &str, config: &PoolConfig) -> Self {
        Self {
            identifiers: vec![(DOMAIN.to_string(), entry_id.to_string())],
            name: config.pool_name.clone(),
            manufacturer: MANUFACTURER.to_string(),
            model: MODEL.to_string(),
            sw_version: VERSION.to_string(),
        }
    }
}

pub fn unique_id(entry_id: &str, key: &str) -> String {
    format!("{entry_id}_{key}")
}

/// Identity of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub unique_id: String,
    pub entity_id: EntityId,
    pub friendly_name: String,
}

impl EntityInfo {
    /// `("sensor", "Back Yard", "csi")` gets `sensor.back_yard_csi`
    pub fn new(
        platform: &str,
        entry_id: &str,
        config: &PoolConfig,
        key: &str,
        name: &str,
    ) -> Result<Self> {
        Ok(Self {
            unique_id: unique_id(entry_id, key),
            entity_id: EntityId::from_name(platform, &format!("{} {}", config.pool_name, key))?,
            friendly_name: format!("{} {}", config.pool_name, name),
        })
    }

    /// Write the entity into the state machine
    ///
    /// `None` renders as `unavailable`.
    pub fn publish(
        &self,
        states: &StateMachine,
        state: Option<String>,
        mut attributes: HashMap<String, Value>,
    ) {
        attributes.insert(ATTR_FRIENDLY_NAME.to_string(), json!(self.friendly_name));
        let state = state.unwrap_or_else(|| STATE_UNAVAILABLE.to_string());
        states.set(self.entity_id.clone(), state, attributes, Context::new());
    }

    pub fn remove(&self, states: &StateMachine) {
        states.remove(&self.entity_id, Context::new());
    }
}

/// Round to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// State string for a number, without a trailing `.0`
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
