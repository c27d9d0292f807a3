//! Pool chemistry integration
//!
//! Turns a handful of pool sensors (temperature, pH, FC, TA, CH and
//! optionally CYA, salt, TDS, borates) into water balance indices, an
//! FC/CYA ratio and dosing recommendations, and lets the user edit the
//! targets those recommendations aim for.
//!
//! [`PoolChemIntegration`] is both the config entry handler and the flow
//! handler factory for the `poolchem` domain.

pub mod coalesce;
pub mod config_flow;
pub mod consts;
pub mod coordinator;
pub mod diagnostics;
pub mod engine;
pub mod entity;
pub mod error;
pub mod host;
pub mod number;
pub mod sensor;
pub mod types;

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use poolchem_config_entries::{
    ConfigEntries, ConfigEntry, EntryHandler, FlowHandler, FlowHandlerFactory, FlowManager,
};
use poolchem_core::EntityId;
use poolchem_event_bus::EventBus;
use poolchem_state_machine::StateMachine;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use config_flow::{PoolChemConfigFlow, PoolChemOptionsFlow};
pub use consts::DOMAIN;
pub use coordinator::{ChemistrySnapshot, PoolChemCoordinator};
pub use engine::{ChemistryEngine, DoseRequest, LibraryEngine, Step};
pub use error::{PoolChemError, Result};
pub use host::{
    ChangeCallback, ConfigRecord, ConfigStore, EventSubscriber, SensorReader, SensorValue,
    SourceChange, Subscription,
};
pub use number::TargetNumber;
pub use sensor::{PoolSensor, SensorKind};
pub use types::{
    AcidType, ChlorineType, DoseKind, Measurement, PhUpType, PoolConfig, PoolOptions, PoolType,
    SurfaceType, TargetField, WaterBalanceState,
};

type SharedSensors = Arc<Mutex<Vec<PoolSensor>>>;

/// Everything a loaded entry owns
struct EntryRuntime {
    coordinator: Arc<PoolChemCoordinator>,
    sensors: SharedSensors,
    numbers: Vec<Arc<TargetNumber>>,
    publisher: JoinHandle<()>,
}

impl EntryRuntime {
    fn entity_ids(&self) -> Vec<EntityId> {
        let sensors = self.sensors.lock().unwrap_or_else(PoisonError::into_inner);
        sensors
            .iter()
            .map(|s| s.info.entity_id.clone())
            .chain(self.numbers.iter().map(|n| n.info.entity_id.clone()))
            .collect()
    }
}

pub struct PoolChemIntegration {
    states: Arc<StateMachine>,
    store: Arc<dyn ConfigStore>,
    reader: Arc<dyn SensorReader>,
    subscriber: Arc<dyn EventSubscriber>,
    engine: Arc<dyn ChemistryEngine>,
    runtimes: DashMap<String, EntryRuntime>,
}

impl PoolChemIntegration {
    /// Integration bound to the host's state machine, event bus and store
    pub fn new(states: Arc<StateMachine>, bus: Arc<EventBus>, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            reader: states.clone(),
            states,
            store,
            subscriber: bus,
            engine: Arc::new(LibraryEngine),
            runtimes: DashMap::new(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn ChemistryEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Register as entry handler and flow factory for [`DOMAIN`]
    pub fn register(self: &Arc<Self>, entries: &ConfigEntries, flows: &FlowManager) {
        entries.register_handler(DOMAIN, self.clone());
        flows.register(DOMAIN, self.clone());
    }

    pub fn coordinator(&self, entry_id: &str) -> Option<Arc<PoolChemCoordinator>> {
        self.runtimes.get(entry_id).map(|r| r.coordinator.clone())
    }

    pub fn number(&self, entry_id: &str, field: TargetField) -> Option<Arc<TargetNumber>> {
        self.runtimes.get(entry_id).and_then(|r| {
            r.numbers
                .iter()
                .find(|n| n.description.field == field)
                .cloned()
        })
    }

    /// Entity ids of every sensor and number of a loaded entry
    pub fn entity_ids(&self, entry_id: &str) -> Vec<EntityId> {
        self.runtimes
            .get(entry_id)
            .map(|r| r.entity_ids())
            .unwrap_or_default()
    }

    /// Sensor keys of a loaded entry, in catalog order
    pub fn sensor_keys(&self, entry_id: &str) -> Vec<&'static str> {
        self.runtimes
            .get(entry_id)
            .map(|r| {
                r.sensors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .map(|s| s.description.key)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn diagnostics(&self, entry: &ConfigEntry) -> Option<serde_json::Value> {
        let coordinator = self.coordinator(&entry.entry_id)?;
        Some(diagnostics::config_entry_diagnostics(entry, &coordinator))
    }

    fn spawn_publisher(
        &self,
        coordinator: &Arc<PoolChemCoordinator>,
        sensors: SharedSensors,
        numbers: Vec<Arc<TargetNumber>>,
    ) -> JoinHandle<()> {
        let states = self.states.clone();
        let coordinator = coordinator.clone();
        let mut updates = coordinator.subscribe();
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let data = updates.borrow_and_update().clone();
                let options = coordinator.options();
                {
                    let sensors = sensors.lock().unwrap_or_else(PoisonError::into_inner);
                    for sensor in sensors.iter() {
                        sensor.render(&states, data.as_ref());
                    }
                }
                for number in &numbers {
                    number.render(&states, &options);
                }
            }
        })
    }
}

#[async_trait]
impl EntryHandler for PoolChemIntegration {
    async fn setup_entry(&self, entry: &ConfigEntry) -> std::result::Result<(), String> {
        let config = PoolConfig::from_data(&entry.data).map_err(|e| e.to_string())?;
        let options = PoolOptions::from_options(&entry.options).unwrap_or_else(|err| {
            warn!(entry_id = %entry.entry_id, "Ignoring invalid options: {}", err);
            PoolOptions::default()
        });

        let coordinator = Arc::new(PoolChemCoordinator::new(
            entry.entry_id.clone(),
            config.clone(),
            options.clone(),
            self.store.clone(),
            self.reader.clone(),
            self.engine.clone(),
        ));

        let sensors = sensor::sensor_descriptions(&config, &options)
            .into_iter()
            .map(|d| PoolSensor::new(&entry.entry_id, &config, d))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.to_string())?;
        let numbers = number::target_fields(config.pool_type)
            .into_iter()
            .map(|field| {
                TargetNumber::new(
                    &entry.entry_id,
                    &config,
                    field,
                    self.store.clone(),
                    coordinator.clone(),
                )
                .map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.to_string())?;

        for sensor in &sensors {
            sensor.render(&self.states, None);
        }
        for number in &numbers {
            number.render(&self.states, &options);
        }

        let sensors: SharedSensors = Arc::new(Mutex::new(sensors));
        let publisher = self.spawn_publisher(&coordinator, sensors.clone(), numbers.clone());

        coordinator.start(self.subscriber.as_ref()).await;

        self.runtimes.insert(
            entry.entry_id.clone(),
            EntryRuntime {
                coordinator,
                sensors,
                numbers,
                publisher,
            },
        );
        info!("Pool chemistry set up for: {}", config.pool_name);
        Ok(())
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> std::result::Result<(), String> {
        let Some((_, runtime)) = self.runtimes.remove(&entry.entry_id) else {
            debug!(entry_id = %entry.entry_id, "Nothing to unload");
            return Ok(());
        };

        runtime.coordinator.shutdown();
        runtime.publisher.abort();
        for entity_id in runtime.entity_ids() {
            self.states.remove(&entity_id, poolchem_core::Context::new());
        }
        info!("Pool chemistry unloaded: {}", entry.entry_id);
        Ok(())
    }

    /// Re-sync the dosing sensors to the new toggles and recalculate
    async fn options_updated(&self, entry: &ConfigEntry) {
        let Some((coordinator, sensors)) = self
            .runtimes
            .get(&entry.entry_id)
            .map(|r| (r.coordinator.clone(), r.sensors.clone()))
        else {
            return;
        };

        let options = PoolOptions::from_options(&entry.options).unwrap_or_default();
        let config = coordinator.config();
        let wanted = sensor::sensor_descriptions(config, &options);
        let data = coordinator.data();

        {
            let mut sensors = sensors.lock().unwrap_or_else(PoisonError::into_inner);
            sensors.retain(|sensor| {
                let keep = wanted.iter().any(|d| d.kind == sensor.kind());
                if !keep {
                    debug!(key = sensor.description.key, "Removing dosing sensor");
                    sensor.info.remove(&self.states);
                }
                keep
            });
            for description in wanted {
                if sensors.iter().any(|s| s.kind() == description.kind) {
                    continue;
                }
                match PoolSensor::new(&entry.entry_id, config, description) {
                    Ok(sensor) => {
                        debug!(key = sensor.description.key, "Adding dosing sensor");
                        sensor.render(&self.states, data.as_ref());
                        sensors.push(sensor);
                    }
                    Err(err) => warn!("Cannot create sensor: {}", err),
                }
            }
        }

        coordinator.request_refresh().await;
    }
}

impl FlowHandlerFactory for PoolChemIntegration {
    fn config_flow(&self) -> Box<dyn FlowHandler> {
        Box::new(PoolChemConfigFlow::new())
    }

    fn options_flow(&self) -> Option<Box<dyn FlowHandler>> {
        Some(Box::new(PoolChemOptionsFlow::new()))
    }
}
