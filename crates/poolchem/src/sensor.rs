//! Read-only pool sensors
//!
//! Each sensor is a pure function of the latest [`ChemistrySnapshot`]. The
//! catalog is a table of [`SensorDescription`]s; what a sensor shows is
//! decided by its [`SensorKind`].

use std::collections::HashMap;
use std::sync::Arc;

use poolchem_core::units::PERCENT;
use poolchem_core::ATTR_UNIT_OF_MEASUREMENT;
use poolchem_state_machine::StateMachine;
use serde_json::{json, Value};

use crate::consts::*;
use crate::coordinator::ChemistrySnapshot;
use crate::entity::{
    format_number, round_to, EntityInfo, ATTR_DEVICE_CLASS, ATTR_ICON, ATTR_OPTIONS,
    ATTR_STATE_CLASS,
};
use crate::error::Result;
use crate::types::{DoseKind, PoolConfig, PoolOptions, WaterBalanceState};

const STATE_CLASS_MEASUREMENT: &str = "measurement";
const DEVICE_CLASS_ENUM: &str = "enum";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Csi,
    Lsi,
    WaterBalance,
    TargetCsi,
    TargetLsi,
    TargetWaterBalance,
    FcCyaRatio,
    Dose(DoseKind),
}

/// Static metadata of one sensor
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDescription {
    pub kind: SensorKind,
    pub key: &'static str,
    pub name: &'static str,
    pub unit: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub icon: Option<&'static str>,
}

impl SensorDescription {
    const fn new(kind: SensorKind, key: &'static str, name: &'static str) -> Self {
        Self {
            kind,
            key,
            name,
            unit: None,
            state_class: None,
            device_class: None,
            icon: None,
        }
    }

    const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    const fn measurement(mut self) -> Self {
        self.state_class = Some(STATE_CLASS_MEASUREMENT);
        self
    }

    const fn enumerated(mut self) -> Self {
        self.device_class = Some(DEVICE_CLASS_ENUM);
        self
    }

    const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Metadata attributes shown regardless of the value
    fn static_attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        if let Some(unit) = self.unit {
            attributes.insert(ATTR_UNIT_OF_MEASUREMENT.to_string(), json!(unit));
        }
        if let Some(state_class) = self.state_class {
            attributes.insert(ATTR_STATE_CLASS.to_string(), json!(state_class));
        }
        if let Some(device_class) = self.device_class {
            attributes.insert(ATTR_DEVICE_CLASS.to_string(), json!(device_class));
            let options: Vec<&str> = WaterBalanceState::ALL.iter().map(|s| s.as_str()).collect();
            attributes.insert(ATTR_OPTIONS.to_string(), json!(options));
        }
        if let Some(icon) = self.icon {
            attributes.insert(ATTR_ICON.to_string(), json!(icon));
        }
        attributes
    }
}

/// Water balance sensors, created for every pool
pub const BALANCE_SENSORS: [SensorDescription; 7] = [
    SensorDescription::new(SensorKind::Csi, SENSOR_CSI, "CSI")
        .measurement()
        .icon("mdi:scale-balance"),
    SensorDescription::new(SensorKind::Lsi, SENSOR_LSI, "LSI")
        .measurement()
        .icon("mdi:scale-balance"),
    SensorDescription::new(SensorKind::WaterBalance, SENSOR_WATER_BALANCE, "Water balance")
        .enumerated()
        .icon("mdi:water-check"),
    SensorDescription::new(SensorKind::TargetCsi, SENSOR_TARGET_CSI, "Target CSI")
        .measurement()
        .icon("mdi:target"),
    SensorDescription::new(SensorKind::TargetLsi, SENSOR_TARGET_LSI, "Target LSI")
        .measurement()
        .icon("mdi:target"),
    SensorDescription::new(
        SensorKind::TargetWaterBalance,
        SENSOR_TARGET_WATER_BALANCE,
        "Target water balance",
    )
    .enumerated()
    .icon("mdi:target"),
    SensorDescription::new(SensorKind::FcCyaRatio, SENSOR_FC_CYA_RATIO, "FC/CYA ratio")
        .unit(PERCENT)
        .measurement()
        .icon("mdi:percent"),
];

/// Description of the dosing sensor for `kind`
pub fn dose_description(kind: DoseKind) -> SensorDescription {
    let (name, unit, icon) = match kind {
        DoseKind::Acid => ("Acid dose", "fl oz", "mdi:flask-outline"),
        DoseKind::Chlorine => ("Chlorine dose", "fl oz", "mdi:water-plus-outline"),
        DoseKind::Alkalinity => ("Alkalinity dose", "oz", "mdi:shaker-outline"),
        DoseKind::Calcium => ("Calcium dose", "oz", "mdi:shaker-outline"),
        DoseKind::Cya => ("CYA dose", "oz", "mdi:shield-sun-outline"),
        DoseKind::Salt => ("Salt dose", "lbs", "mdi:shaker"),
        DoseKind::Borates => ("Borates dose", "oz", "mdi:flask-outline"),
    };
    SensorDescription::new(SensorKind::Dose(kind), kind.key(), name)
        .unit(unit)
        .measurement()
        .icon(icon)
}

/// Dosing categories that get a sensor for this pool and these options
pub fn enabled_doses(config: &PoolConfig, options: &PoolOptions) -> Vec<DoseKind> {
    DoseKind::ALL
        .into_iter()
        .filter(|kind| kind.applies_to(config.pool_type) && options.dose_enabled(*kind))
        .collect()
}

/// Every sensor a pool exposes: the balance sensors plus enabled doses
pub fn sensor_descriptions(config: &PoolConfig, options: &PoolOptions) -> Vec<SensorDescription> {
    BALANCE_SENSORS
        .into_iter()
        .chain(enabled_doses(config, options).into_iter().map(dose_description))
        .collect()
}

impl SensorKind {
    /// Sensor value, `None` when the underlying result is absent
    pub fn value(&self, data: &ChemistrySnapshot) -> Option<Value> {
        match self {
            SensorKind::Csi => data.csi.map(|v| json!(round_to(v, 2))),
            SensorKind::Lsi => data.lsi.map(|v| json!(round_to(v, 2))),
            SensorKind::WaterBalance => data.balance_state.map(|s| json!(s.as_str())),
            SensorKind::TargetCsi => data.target_csi.map(|v| json!(round_to(v, 2))),
            SensorKind::TargetLsi => data.target_lsi.map(|v| json!(round_to(v, 2))),
            SensorKind::TargetWaterBalance => {
                data.target_balance_state.map(|s| json!(s.as_str()))
            }
            SensorKind::FcCyaRatio => data.fc_cya_ratio.map(|v| json!(round_to(v, 1))),
            SensorKind::Dose(kind) => data.dose(*kind).map(|dose| json!(dose.amount)),
        }
    }

    pub fn available(&self, data: &ChemistrySnapshot) -> bool {
        self.value(data).is_some()
    }

    pub fn attributes(&self, data: &ChemistrySnapshot) -> HashMap<String, Value> {
        let mut attrs = HashMap::new();
        match self {
            SensorKind::Csi => {
                if let Some(water) = &data.water {
                    attrs.insert("ph".into(), json!(water.ph));
                    attrs.insert("temperature_f".into(), json!(water.temperature_f));
                    attrs.insert("calcium_hardness".into(), json!(water.calcium_hardness));
                    attrs.insert("total_alkalinity".into(), json!(water.total_alkalinity));
                    attrs.insert("cyanuric_acid".into(), json!(water.cyanuric_acid));
                    attrs.insert("salt".into(), json!(water.salt));
                    attrs.insert("borates".into(), json!(water.borates));
                }
                if let Some(state) = data.balance_state {
                    attrs.insert("balance_state".into(), json!(state.as_str()));
                }
            }
            SensorKind::Lsi => {
                if let Some(water) = &data.water {
                    attrs.insert("ph".into(), json!(water.ph));
                    attrs.insert("temperature_f".into(), json!(water.temperature_f));
                    attrs.insert("calcium_hardness".into(), json!(water.calcium_hardness));
                    attrs.insert("total_alkalinity".into(), json!(water.total_alkalinity));
                    attrs.insert("tds".into(), json!(water.tds));
                }
            }
            SensorKind::WaterBalance => {
                if let Some(csi) = data.csi {
                    attrs.insert("csi".into(), json!(round_to(csi, 2)));
                }
                if let Some(lsi) = data.lsi {
                    attrs.insert("lsi".into(), json!(round_to(lsi, 2)));
                }
            }
            SensorKind::TargetWaterBalance => {
                if let Some(csi) = data.target_csi {
                    attrs.insert("csi".into(), json!(round_to(csi, 2)));
                }
                if let Some(lsi) = data.target_lsi {
                    attrs.insert("lsi".into(), json!(round_to(lsi, 2)));
                }
            }
            SensorKind::TargetCsi | SensorKind::TargetLsi => {}
            SensorKind::FcCyaRatio => {
                if let Some(fc) = data.free_chlorine {
                    attrs.insert("free_chlorine".into(), json!(fc));
                }
                if let Some(cya) = data.cyanuric_acid {
                    attrs.insert("cyanuric_acid".into(), json!(cya));
                }
                if let Some(adequate) = data.fc_is_adequate {
                    attrs.insert("is_adequate".into(), json!(adequate));
                }
            }
            SensorKind::Dose(kind) => {
                if let Some(dose) = data.dose(*kind) {
                    attrs.insert("chemical".into(), json!(dose.chemical.display_name()));
                    attrs.insert("unit".into(), json!(dose.unit.as_str()));
                    if let (Some(volume), Some(unit)) = (dose.amount_volume, dose.volume_unit) {
                        attrs.insert("amount_volume".into(), json!(volume));
                        attrs.insert("volume_unit".into(), json!(unit.as_str()));
                    }
                    if let Some(notes) = &dose.notes {
                        attrs.insert("notes".into(), json!(notes));
                    }
                }
            }
        }
        attrs
    }
}

/// One rendered sensor of a pool
#[derive(Debug, Clone)]
pub struct PoolSensor {
    pub description: SensorDescription,
    pub info: EntityInfo,
}

impl PoolSensor {
    pub fn new(entry_id: &str, config: &PoolConfig, description: SensorDescription) -> Result<Self> {
        let info = EntityInfo::new("sensor", entry_id, config, description.key, description.name)?;
        Ok(Self { description, info })
    }

    pub fn kind(&self) -> SensorKind {
        self.description.kind
    }

    /// Write the sensor for `data`; no snapshot yet means unavailable
    pub fn render(&self, states: &StateMachine, data: Option<&Arc<ChemistrySnapshot>>) {
        let mut attributes = self.description.static_attributes();
        let state = data.and_then(|data| {
            let value = self.kind().value(data)?;
            attributes.extend(self.kind().attributes(data));
            Some(match value {
                Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
                Value::String(s) => s,
                other => other.to_string(),
            })
        });
        self.info.publish(states, state, attributes);
    }
}
