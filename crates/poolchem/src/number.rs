//! Editable target values
//!
//! Each target is a number entity backed by the options record. Writing one
//! merges the new value into the options and asks the coordinator for a
//! refresh.

use std::collections::HashMap;
use std::sync::Arc;

use poolchem_config_entries::NumberMode;
use poolchem_core::units::PPM;
use poolchem_core::ATTR_UNIT_OF_MEASUREMENT;
use poolchem_state_machine::StateMachine;
use serde_json::json;
use tracing::{debug, instrument};

use crate::coordinator::PoolChemCoordinator;
use crate::entity::{format_number, EntityInfo, ATTR_ICON};
use crate::error::{PoolChemError, Result};
use crate::host::ConfigStore;
use crate::types::{PoolConfig, PoolOptions, PoolType, TargetField};

#[derive(Debug, Clone, PartialEq)]
pub struct NumberDescription {
    pub field: TargetField,
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub unit: Option<&'static str>,
    pub mode: NumberMode,
    pub icon: &'static str,
}

impl NumberDescription {
    pub fn key(&self) -> &'static str {
        self.field.key()
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && (self.min..=self.max).contains(&value)
    }
}

/// Bounds and presentation of the editor for `field`
pub fn number_description(field: TargetField) -> NumberDescription {
    let (name, min, max, step, unit, icon) = match field {
        TargetField::Ph => ("Target pH", 6.8, 8.0, 0.1, None, "mdi:ph"),
        TargetField::Fc => ("Target FC", 1.0, 20.0, 0.5, Some(PPM), "mdi:water-plus-outline"),
        TargetField::Ta => ("Target TA", 50.0, 150.0, 5.0, Some(PPM), "mdi:water-opacity"),
        TargetField::Ch => ("Target CH", 150.0, 500.0, 10.0, Some(PPM), "mdi:water-circle"),
        TargetField::Cya => ("Target CYA", 0.0, 100.0, 5.0, Some(PPM), "mdi:shield-sun-outline"),
        TargetField::Borates => ("Target borates", 0.0, 100.0, 5.0, Some(PPM), "mdi:flask-outline"),
        TargetField::Salt => ("Target salt", 2500.0, 4000.0, 100.0, Some(PPM), "mdi:shaker"),
    };
    NumberDescription {
        field,
        name,
        min,
        max,
        step,
        unit,
        mode: NumberMode::Slider,
        icon,
    }
}

/// Targets editable for a pool of this type; salt only for saltwater
pub fn target_fields(pool_type: PoolType) -> Vec<TargetField> {
    TargetField::ALL
        .into_iter()
        .filter(|field| *field != TargetField::Salt || pool_type == PoolType::Saltwater)
        .collect()
}

pub struct TargetNumber {
    pub description: NumberDescription,
    pub info: EntityInfo,
    store: Arc<dyn ConfigStore>,
    coordinator: Arc<PoolChemCoordinator>,
}

impl TargetNumber {
    pub fn new(
        entry_id: &str,
        config: &PoolConfig,
        field: TargetField,
        store: Arc<dyn ConfigStore>,
        coordinator: Arc<PoolChemCoordinator>,
    ) -> Result<Self> {
        let description = number_description(field);
        let info = EntityInfo::new("number", entry_id, config, description.key(), description.name)?;
        Ok(Self {
            description,
            info,
            store,
            coordinator,
        })
    }

    /// Value stored in the options record, or the default
    pub async fn value(&self) -> f64 {
        let options = match self.store.read(self.coordinator.entry_id()).await {
            Some(record) => PoolOptions::from_options(&record.options).unwrap_or_default(),
            None => PoolOptions::default(),
        };
        options.target(self.description.field)
    }

    /// Store a new target and recalculate
    #[instrument(skip(self), fields(entity_id = %self.info.entity_id))]
    pub async fn set_value(&self, value: f64) -> Result<()> {
        if !self.description.contains(value) {
            return Err(PoolChemError::OutOfRange {
                key: self.description.key(),
                value,
                min: self.description.min,
                max: self.description.max,
            });
        }

        self.store
            .write_options(
                self.coordinator.entry_id(),
                HashMap::from([(self.description.key().to_string(), json!(value))]),
            )
            .await?;
        debug!(value, "Target updated");

        self.coordinator.request_refresh().await;
        Ok(())
    }

    pub fn render(&self, states: &StateMachine, options: &PoolOptions) {
        let d = &self.description;
        let mut attributes = HashMap::from([
            ("min".to_string(), json!(d.min)),
            ("max".to_string(), json!(d.max)),
            ("step".to_string(), json!(d.step)),
            ("mode".to_string(), json!(d.mode)),
            (ATTR_ICON.to_string(), json!(d.icon)),
        ]);
        if let Some(unit) = d.unit {
            attributes.insert(ATTR_UNIT_OF_MEASUREMENT.to_string(), json!(unit));
        }
        let value = format_number(options.target(d.field));
        self.info.publish(states, Some(value), attributes);
    }
}

impl std::fmt::Debug for TargetNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetNumber")
            .field("key", &self.description.key())
            .field("entity_id", &self.info.entity_id)
            .finish()
    }
}
