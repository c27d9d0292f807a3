//! Test harness for the pool chemistry integration
//!
//! Wires a real event bus, state machine, config entries and flow manager
//! in a temp directory, with the integration registered on top.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use poolchem::{ChemistryEngine, PoolChemIntegration, DOMAIN};
use poolchem_config_entries::{ConfigEntries, ConfigEntry, FlowManager, Storage};
use poolchem_core::{Context, EntityId, State, ATTR_UNIT_OF_MEASUREMENT};
use poolchem_event_bus::EventBus;
use poolchem_state_machine::StateMachine;
use serde_json::{json, Value};
use tempfile::TempDir;

pub use poolchem_config_entries::UserInput;

pub struct TestHost {
    _dir: TempDir,
    pub bus: Arc<EventBus>,
    pub states: Arc<StateMachine>,
    pub entries: Arc<ConfigEntries>,
    pub flows: FlowManager,
    pub integration: Arc<PoolChemIntegration>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_engine(engine: Arc<dyn ChemistryEngine>) -> Self {
        Self::build(Some(engine))
    }

    fn build(engine: Option<Arc<dyn ChemistryEngine>>) -> Self {
        let dir = TempDir::new().unwrap();
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        let entries = Arc::new(ConfigEntries::new(Arc::new(Storage::new(dir.path()))));
        let flows = FlowManager::new(entries.clone());

        let mut integration = PoolChemIntegration::new(states.clone(), bus.clone(), entries.clone());
        if let Some(engine) = engine {
            integration = integration.with_engine(engine);
        }
        let integration = Arc::new(integration);
        integration.register(&entries, &flows);

        Self {
            _dir: dir,
            bus,
            states,
            entries,
            flows,
            integration,
        }
    }

    pub fn set_sensor(&self, entity_id: &str, state: impl Into<String>, unit: Option<&str>) {
        let mut attributes = HashMap::new();
        if let Some(unit) = unit {
            attributes.insert(ATTR_UNIT_OF_MEASUREMENT.to_string(), json!(unit));
        }
        self.states
            .set(id(entity_id), state, attributes, Context::new());
    }

    /// Standard balanced readings: 84 °F, pH 7.5, FC 5, TA 80, CH 300, CYA 40
    pub fn set_standard_readings(&self) {
        self.set_sensor("sensor.water_temp", "84", Some("°F"));
        self.set_sensor("sensor.pool_ph", "7.5", None);
        self.set_sensor("sensor.pool_fc", "5", Some("ppm"));
        self.set_sensor("sensor.pool_ta", "80", Some("ppm"));
        self.set_sensor("sensor.pool_ch", "300", Some("ppm"));
        self.set_sensor("sensor.pool_cya", "40", Some("ppm"));
    }

    /// Add an entry and set it up, returning its id
    pub async fn add_pool(&self, data: UserInput, options: UserInput) -> String {
        let title = data
            .get("pool_name")
            .and_then(Value::as_str)
            .unwrap_or("Pool")
            .to_string();
        let entry = self
            .entries
            .add(
                ConfigEntry::new(DOMAIN, title)
                    .with_data(data)
                    .with_options(options),
            )
            .await
            .unwrap();
        self.entries.setup(&entry.entry_id).await.unwrap();
        entry.entry_id
    }

    pub fn state(&self, entity_id: &str) -> Option<State> {
        self.states.get(&id(entity_id))
    }

    pub fn state_value(&self, entity_id: &str) -> Option<String> {
        self.states.get_state(&id(entity_id))
    }

    /// Wait until `entity_id` has `expected` as state
    pub async fn wait_for_state(&self, entity_id: &str, expected: &str) {
        let entity = entity_id.to_string();
        let expected = expected.to_string();
        wait_until(|| self.state_value(&entity).as_deref() == Some(expected.as_str())).await;
    }
}

pub fn id(entity_id: &str) -> EntityId {
    entity_id.parse().unwrap()
}

/// Poll `condition` until it holds, failing after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn input(pairs: &[(&str, Value)]) -> UserInput {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Setup data for a 15 000 gallon pool wired to the standard sensors
pub fn pool_data(name: &str, pool_type: &str) -> UserInput {
    input(&[
        ("pool_name", json!(name)),
        ("volume_gallons", json!(15000)),
        ("pool_type", json!(pool_type)),
        ("surface_type", json!("plaster")),
        ("temp_entity", json!("sensor.water_temp")),
        ("ph_entity", json!("sensor.pool_ph")),
        ("fc_entity", json!("sensor.pool_fc")),
        ("ta_entity", json!("sensor.pool_ta")),
        ("ch_entity", json!("sensor.pool_ch")),
        ("cya_entity", json!("sensor.pool_cya")),
    ])
}

pub fn chlorine_pool() -> UserInput {
    pool_data("Backyard", "chlorine")
}

pub fn saltwater_pool() -> UserInput {
    let mut data = pool_data("Backyard", "saltwater");
    data.insert("salt_entity".to_string(), json!("sensor.pool_salt"));
    data
}
