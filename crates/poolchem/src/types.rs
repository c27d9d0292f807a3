//! Typed views of the setup data and options records
//!
//! Config entries store both records as loose JSON maps. The integration
//! converts them into [`PoolConfig`] and [`PoolOptions`] once per use, with
//! every missing key falling back to its default.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use poolchem_chemistry::ChemicalType;
use poolchem_core::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consts::*;
use crate::error::{PoolChemError, Result};

/// A closed set of string choices offered in a select field
pub trait Choice: Copy + Sized + 'static {
    const ALL: &'static [Self];

    /// Stored value
    fn value(&self) -> &'static str;

    /// Display label
    fn label(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolType {
    #[default]
    Chlorine,
    Saltwater,
    Mineral,
}

impl Choice for PoolType {
    const ALL: &'static [Self] = &[PoolType::Chlorine, PoolType::Saltwater, PoolType::Mineral];

    fn value(&self) -> &'static str {
        match self {
            PoolType::Chlorine => "chlorine",
            PoolType::Saltwater => "saltwater",
            PoolType::Mineral => "mineral",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PoolType::Chlorine => "Chlorine",
            PoolType::Saltwater => "Saltwater (SWG)",
            PoolType::Mineral => "Mineral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    #[default]
    Plaster,
    Pebble,
    Vinyl,
    Fiberglass,
    Painted,
}

impl Choice for SurfaceType {
    const ALL: &'static [Self] = &[
        SurfaceType::Plaster,
        SurfaceType::Pebble,
        SurfaceType::Vinyl,
        SurfaceType::Fiberglass,
        SurfaceType::Painted,
    ];

    fn value(&self) -> &'static str {
        match self {
            SurfaceType::Plaster => "plaster",
            SurfaceType::Pebble => "pebble",
            SurfaceType::Vinyl => "vinyl",
            SurfaceType::Fiberglass => "fiberglass",
            SurfaceType::Painted => "painted",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SurfaceType::Plaster => "Plaster",
            SurfaceType::Pebble => "Pebble",
            SurfaceType::Vinyl => "Vinyl",
            SurfaceType::Fiberglass => "Fiberglass",
            SurfaceType::Painted => "Painted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcidType {
    #[serde(rename = "muriatic_14_5")]
    Muriatic14_5,
    #[serde(rename = "muriatic_28_3")]
    Muriatic28_3,
    #[default]
    #[serde(rename = "muriatic_31_45")]
    Muriatic31_45,
    #[serde(rename = "muriatic_34_6")]
    Muriatic34_6,
    #[serde(rename = "dry_acid")]
    DryAcid,
}

impl AcidType {
    pub fn chemical(&self) -> ChemicalType {
        match self {
            AcidType::Muriatic14_5 => ChemicalType::MuriaticAcid14_5,
            AcidType::Muriatic28_3 => ChemicalType::MuriaticAcid28_3,
            AcidType::Muriatic31_45 => ChemicalType::MuriaticAcid31_45,
            AcidType::Muriatic34_6 => ChemicalType::MuriaticAcid34_6,
            AcidType::DryAcid => ChemicalType::DryAcid,
        }
    }
}

impl Choice for AcidType {
    const ALL: &'static [Self] = &[
        AcidType::Muriatic14_5,
        AcidType::Muriatic28_3,
        AcidType::Muriatic31_45,
        AcidType::Muriatic34_6,
        AcidType::DryAcid,
    ];

    fn value(&self) -> &'static str {
        match self {
            AcidType::Muriatic14_5 => "muriatic_14_5",
            AcidType::Muriatic28_3 => "muriatic_28_3",
            AcidType::Muriatic31_45 => "muriatic_31_45",
            AcidType::Muriatic34_6 => "muriatic_34_6",
            AcidType::DryAcid => "dry_acid",
        }
    }

    fn label(&self) -> &'static str {
        self.chemical().display_name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChlorineType {
    #[serde(rename = "bleach_6")]
    Bleach6,
    #[serde(rename = "bleach_8_25")]
    Bleach8_25,
    #[serde(rename = "bleach_10")]
    Bleach10,
    #[default]
    #[serde(rename = "bleach_12_5")]
    Bleach12_5,
    #[serde(rename = "cal_hypo_65")]
    CalHypo65,
    #[serde(rename = "cal_hypo_73")]
    CalHypo73,
    #[serde(rename = "dichlor")]
    Dichlor,
    #[serde(rename = "trichlor")]
    Trichlor,
}

impl ChlorineType {
    pub fn chemical(&self) -> ChemicalType {
        match self {
            ChlorineType::Bleach6 => ChemicalType::Bleach6,
            ChlorineType::Bleach8_25 => ChemicalType::Bleach8_25,
            ChlorineType::Bleach10 => ChemicalType::Bleach10,
            ChlorineType::Bleach12_5 => ChemicalType::Bleach12_5,
            ChlorineType::CalHypo65 => ChemicalType::CalHypo65,
            ChlorineType::CalHypo73 => ChemicalType::CalHypo73,
            ChlorineType::Dichlor => ChemicalType::Dichlor,
            ChlorineType::Trichlor => ChemicalType::Trichlor,
        }
    }
}

impl Choice for ChlorineType {
    const ALL: &'static [Self] = &[
        ChlorineType::Bleach6,
        ChlorineType::Bleach8_25,
        ChlorineType::Bleach10,
        ChlorineType::Bleach12_5,
        ChlorineType::CalHypo65,
        ChlorineType::CalHypo73,
        ChlorineType::Dichlor,
        ChlorineType::Trichlor,
    ];

    fn value(&self) -> &'static str {
        match self {
            ChlorineType::Bleach6 => "bleach_6",
            ChlorineType::Bleach8_25 => "bleach_8_25",
            ChlorineType::Bleach10 => "bleach_10",
            ChlorineType::Bleach12_5 => "bleach_12_5",
            ChlorineType::CalHypo65 => "cal_hypo_65",
            ChlorineType::CalHypo73 => "cal_hypo_73",
            ChlorineType::Dichlor => "dichlor",
            ChlorineType::Trichlor => "trichlor",
        }
    }

    fn label(&self) -> &'static str {
        self.chemical().display_name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhUpType {
    #[default]
    SodaAsh,
    Borax,
}

impl PhUpType {
    pub fn chemical(&self) -> ChemicalType {
        match self {
            PhUpType::SodaAsh => ChemicalType::SodaAsh,
            PhUpType::Borax => ChemicalType::Borax,
        }
    }
}

impl Choice for PhUpType {
    const ALL: &'static [Self] = &[PhUpType::SodaAsh, PhUpType::Borax];

    fn value(&self) -> &'static str {
        match self {
            PhUpType::SodaAsh => "soda_ash",
            PhUpType::Borax => "borax",
        }
    }

    fn label(&self) -> &'static str {
        self.chemical().display_name()
    }
}

/// Qualitative water balance, banded on CSI
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterBalanceState {
    SeverelyCorrosive,
    SlightlyCorrosive,
    Balanced,
    SlightlyScaling,
    SeverelyScaling,
}

impl WaterBalanceState {
    pub const ALL: [WaterBalanceState; 5] = [
        WaterBalanceState::SeverelyCorrosive,
        WaterBalanceState::SlightlyCorrosive,
        WaterBalanceState::Balanced,
        WaterBalanceState::SlightlyScaling,
        WaterBalanceState::SeverelyScaling,
    ];

    /// Band a CSI value; the balanced band includes both edges
    pub fn from_csi(csi: f64) -> Self {
        if csi < CSI_SEVERELY_CORROSIVE {
            WaterBalanceState::SeverelyCorrosive
        } else if csi < CSI_BALANCED_LOW {
            WaterBalanceState::SlightlyCorrosive
        } else if csi <= CSI_BALANCED_HIGH {
            WaterBalanceState::Balanced
        } else if csi <= CSI_SLIGHTLY_SCALING {
            WaterBalanceState::SlightlyScaling
        } else {
            WaterBalanceState::SeverelyScaling
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaterBalanceState::SeverelyCorrosive => "severely_corrosive",
            WaterBalanceState::SlightlyCorrosive => "slightly_corrosive",
            WaterBalanceState::Balanced => "balanced",
            WaterBalanceState::SlightlyScaling => "slightly_scaling",
            WaterBalanceState::SeverelyScaling => "severely_scaling",
        }
    }
}

impl fmt::Display for WaterBalanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical reading fed by one source sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    Temperature,
    Ph,
    FreeChlorine,
    TotalAlkalinity,
    CalciumHardness,
    CyanuricAcid,
    Salt,
    Tds,
    Borates,
}

impl Measurement {
    pub const ALL: [Measurement; 9] = [
        Measurement::Temperature,
        Measurement::Ph,
        Measurement::FreeChlorine,
        Measurement::TotalAlkalinity,
        Measurement::CalciumHardness,
        Measurement::CyanuricAcid,
        Measurement::Salt,
        Measurement::Tds,
        Measurement::Borates,
    ];

    /// Setup data key holding the source entity id
    pub fn conf_key(&self) -> &'static str {
        match self {
            Measurement::Temperature => CONF_TEMP_ENTITY,
            Measurement::Ph => CONF_PH_ENTITY,
            Measurement::FreeChlorine => CONF_FC_ENTITY,
            Measurement::TotalAlkalinity => CONF_TA_ENTITY,
            Measurement::CalciumHardness => CONF_CH_ENTITY,
            Measurement::CyanuricAcid => CONF_CYA_ENTITY,
            Measurement::Salt => CONF_SALT_ENTITY,
            Measurement::Tds => CONF_TDS_ENTITY,
            Measurement::Borates => CONF_BORATES_ENTITY,
        }
    }

    /// Short name used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            Measurement::Temperature => "temperature",
            Measurement::Ph => "pH",
            Measurement::FreeChlorine => "FC",
            Measurement::TotalAlkalinity => "TA",
            Measurement::CalciumHardness => "CH",
            Measurement::CyanuricAcid => "CYA",
            Measurement::Salt => "salt",
            Measurement::Tds => "TDS",
            Measurement::Borates => "borates",
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Measurement::Temperature
                | Measurement::Ph
                | Measurement::FreeChlorine
                | Measurement::TotalAlkalinity
                | Measurement::CalciumHardness
        )
    }
}

/// A user-adjustable chemistry target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    Ph,
    Fc,
    Ta,
    Ch,
    Cya,
    Salt,
    Borates,
}

impl TargetField {
    pub const ALL: [TargetField; 7] = [
        TargetField::Ph,
        TargetField::Fc,
        TargetField::Ta,
        TargetField::Ch,
        TargetField::Cya,
        TargetField::Salt,
        TargetField::Borates,
    ];

    /// Options key, also the entity key of the matching number
    pub fn key(&self) -> &'static str {
        match self {
            TargetField::Ph => CONF_TARGET_PH,
            TargetField::Fc => CONF_TARGET_FC,
            TargetField::Ta => CONF_TARGET_TA,
            TargetField::Ch => CONF_TARGET_CH,
            TargetField::Cya => CONF_TARGET_CYA,
            TargetField::Salt => CONF_TARGET_SALT,
            TargetField::Borates => CONF_TARGET_BORATES,
        }
    }

    pub fn default_value(&self) -> f64 {
        match self {
            TargetField::Ph => DEFAULT_TARGET_PH,
            TargetField::Fc => DEFAULT_TARGET_FC,
            TargetField::Ta => DEFAULT_TARGET_TA,
            TargetField::Ch => DEFAULT_TARGET_CH,
            TargetField::Cya => DEFAULT_TARGET_CYA,
            TargetField::Salt => DEFAULT_TARGET_SALT,
            TargetField::Borates => DEFAULT_TARGET_BORATES,
        }
    }
}

/// A dosing recommendation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseKind {
    Acid,
    Chlorine,
    Alkalinity,
    Calcium,
    Cya,
    Salt,
    Borates,
}

impl DoseKind {
    pub const ALL: [DoseKind; 7] = [
        DoseKind::Acid,
        DoseKind::Chlorine,
        DoseKind::Alkalinity,
        DoseKind::Calcium,
        DoseKind::Cya,
        DoseKind::Salt,
        DoseKind::Borates,
    ];

    /// Sensor key of the dosing sensor
    pub fn key(&self) -> &'static str {
        match self {
            DoseKind::Acid => "dose_acid",
            DoseKind::Chlorine => "dose_chlorine",
            DoseKind::Alkalinity => "dose_alkalinity",
            DoseKind::Calcium => "dose_calcium",
            DoseKind::Cya => "dose_cya",
            DoseKind::Salt => "dose_salt",
            DoseKind::Borates => "dose_borates",
        }
    }

    /// Options key of the toggle enabling this category
    pub fn enable_key(&self) -> &'static str {
        match self {
            DoseKind::Acid => CONF_ENABLE_DOSE_ACID,
            DoseKind::Chlorine => CONF_ENABLE_DOSE_CHLORINE,
            DoseKind::Alkalinity => CONF_ENABLE_DOSE_ALKALINITY,
            DoseKind::Calcium => CONF_ENABLE_DOSE_CALCIUM,
            DoseKind::Cya => CONF_ENABLE_DOSE_CYA,
            DoseKind::Salt => CONF_ENABLE_DOSE_SALT,
            DoseKind::Borates => CONF_ENABLE_DOSE_BORATES,
        }
    }

    /// Salt and borates are opt-in
    pub fn enabled_by_default(&self) -> bool {
        !matches!(self, DoseKind::Salt | DoseKind::Borates)
    }

    /// Salt dosing only applies to saltwater pools
    pub fn applies_to(&self, pool_type: PoolType) -> bool {
        *self != DoseKind::Salt || pool_type == PoolType::Saltwater
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Drop keys whose value means "not set"
fn present(record: &HashMap<String, Value>) -> serde_json::Map<String, Value> {
    record
        .iter()
        .filter(|(_, v)| !is_blank(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct PoolMetadata {
    #[serde(default = "default_pool_name")]
    pool_name: String,
    #[serde(default = "default_volume")]
    volume_gallons: f64,
    #[serde(default)]
    pool_type: PoolType,
    #[serde(default)]
    surface_type: SurfaceType,
}

fn default_pool_name() -> String {
    DEFAULT_POOL_NAME.to_string()
}

fn default_volume() -> f64 {
    DEFAULT_VOLUME_GALLONS
}

/// Setup data: pool metadata and source sensor mapping
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub pool_name: String,
    pub volume_gallons: f64,
    pub pool_type: PoolType,
    pub surface_type: SurfaceType,
    pub sensors: BTreeMap<Measurement, EntityId>,
}

impl PoolConfig {
    pub fn from_data(data: &HashMap<String, Value>) -> Result<Self> {
        let record = present(data);

        let mut sensors = BTreeMap::new();
        for measurement in Measurement::ALL {
            let Some(value) = record.get(measurement.conf_key()) else {
                continue;
            };
            let entity_id = value
                .as_str()
                .ok_or_else(|| PoolChemError::InvalidSource {
                    key: measurement.conf_key(),
                    value: value.to_string(),
                })?
                .parse::<EntityId>()?;
            sensors.insert(measurement, entity_id);
        }

        let meta: PoolMetadata =
            serde_json::from_value(Value::Object(record)).map_err(PoolChemError::InvalidConfig)?;

        Ok(Self {
            pool_name: meta.pool_name,
            volume_gallons: meta.volume_gallons,
            pool_type: meta.pool_type,
            surface_type: meta.surface_type,
            sensors,
        })
    }

    pub fn is_saltwater(&self) -> bool {
        self.pool_type == PoolType::Saltwater
    }

    pub fn source(&self, measurement: Measurement) -> Option<&EntityId> {
        self.sensors.get(&measurement)
    }

    /// Every configured source entity
    pub fn source_entities(&self) -> Vec<EntityId> {
        self.sensors.values().cloned().collect()
    }
}

/// Options: targets, products and dosing toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolOptions {
    #[serde(default = "target::ph")]
    pub target_ph: f64,
    #[serde(default = "target::fc")]
    pub target_fc: f64,
    #[serde(default = "target::ta")]
    pub target_ta: f64,
    #[serde(default = "target::ch")]
    pub target_ch: f64,
    #[serde(default = "target::cya")]
    pub target_cya: f64,
    #[serde(default = "target::salt")]
    pub target_salt: f64,
    #[serde(default = "target::borates")]
    pub target_borates: f64,

    #[serde(default)]
    pub acid_type: AcidType,
    #[serde(default)]
    pub chlorine_type: ChlorineType,
    #[serde(default)]
    pub ph_up_type: PhUpType,

    #[serde(default = "enabled")]
    pub enable_dose_acid: bool,
    #[serde(default = "enabled")]
    pub enable_dose_chlorine: bool,
    #[serde(default = "enabled")]
    pub enable_dose_alkalinity: bool,
    #[serde(default = "enabled")]
    pub enable_dose_calcium: bool,
    #[serde(default = "enabled")]
    pub enable_dose_cya: bool,
    #[serde(default)]
    pub enable_dose_salt: bool,
    #[serde(default)]
    pub enable_dose_borates: bool,
}

mod target {
    use crate::consts::*;

    pub fn ph() -> f64 {
        DEFAULT_TARGET_PH
    }
    pub fn fc() -> f64 {
        DEFAULT_TARGET_FC
    }
    pub fn ta() -> f64 {
        DEFAULT_TARGET_TA
    }
    pub fn ch() -> f64 {
        DEFAULT_TARGET_CH
    }
    pub fn cya() -> f64 {
        DEFAULT_TARGET_CYA
    }
    pub fn salt() -> f64 {
        DEFAULT_TARGET_SALT
    }
    pub fn borates() -> f64 {
        DEFAULT_TARGET_BORATES
    }
}

fn enabled() -> bool {
    true
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            target_ph: DEFAULT_TARGET_PH,
            target_fc: DEFAULT_TARGET_FC,
            target_ta: DEFAULT_TARGET_TA,
            target_ch: DEFAULT_TARGET_CH,
            target_cya: DEFAULT_TARGET_CYA,
            target_salt: DEFAULT_TARGET_SALT,
            target_borates: DEFAULT_TARGET_BORATES,
            acid_type: AcidType::default(),
            chlorine_type: ChlorineType::default(),
            ph_up_type: PhUpType::default(),
            enable_dose_acid: true,
            enable_dose_chlorine: true,
            enable_dose_alkalinity: true,
            enable_dose_calcium: true,
            enable_dose_cya: true,
            enable_dose_salt: false,
            enable_dose_borates: false,
        }
    }
}

impl PoolOptions {
    pub fn from_options(options: &HashMap<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(present(options))).map_err(PoolChemError::InvalidOptions)
    }

    pub fn target(&self, field: TargetField) -> f64 {
        match field {
            TargetField::Ph => self.target_ph,
            TargetField::Fc => self.target_fc,
            TargetField::Ta => self.target_ta,
            TargetField::Ch => self.target_ch,
            TargetField::Cya => self.target_cya,
            TargetField::Salt => self.target_salt,
            TargetField::Borates => self.target_borates,
        }
    }

    pub fn dose_enabled(&self, kind: DoseKind) -> bool {
        match kind {
            DoseKind::Acid => self.enable_dose_acid,
            DoseKind::Chlorine => self.enable_dose_chlorine,
            DoseKind::Alkalinity => self.enable_dose_alkalinity,
            DoseKind::Calcium => self.enable_dose_calcium,
            DoseKind::Cya => self.enable_dose_cya,
            DoseKind::Salt => self.enable_dose_salt,
            DoseKind::Borates => self.enable_dose_borates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_balance_bands() {
        assert_eq!(WaterBalanceState::from_csi(-0.7), WaterBalanceState::SeverelyCorrosive);
        assert_eq!(WaterBalanceState::from_csi(-0.6), WaterBalanceState::SlightlyCorrosive);
        assert_eq!(WaterBalanceState::from_csi(-0.3), WaterBalanceState::Balanced);
        assert_eq!(WaterBalanceState::from_csi(0.3), WaterBalanceState::Balanced);
        assert_eq!(WaterBalanceState::from_csi(0.6), WaterBalanceState::SlightlyScaling);
        assert_eq!(WaterBalanceState::from_csi(0.61), WaterBalanceState::SeverelyScaling);
        assert!(WaterBalanceState::SeverelyCorrosive < WaterBalanceState::SeverelyScaling);
    }

    #[test]
    fn test_pool_config_from_data() {
        let config = PoolConfig::from_data(&record(&[
            (CONF_POOL_NAME, json!("Backyard")),
            (CONF_VOLUME_GALLONS, json!(20000)),
            (CONF_POOL_TYPE, json!("saltwater")),
            (CONF_TEMP_ENTITY, json!("sensor.pool_temp")),
            (CONF_PH_ENTITY, json!("sensor.pool_ph")),
            (CONF_CYA_ENTITY, json!("")),
        ]))
        .unwrap();

        assert_eq!(config.pool_name, "Backyard");
        assert_eq!(config.volume_gallons, 20000.0);
        assert!(config.is_saltwater());
        assert_eq!(config.surface_type, SurfaceType::Plaster);
        assert_eq!(config.sensors.len(), 2);
        assert_eq!(
            config.source(Measurement::Ph).map(|e| e.to_string()),
            Some("sensor.pool_ph".to_string())
        );
        assert!(config.source(Measurement::CyanuricAcid).is_none());
    }

    #[test]
    fn test_pool_config_rejects_bad_values() {
        let bad_entity = record(&[(CONF_PH_ENTITY, json!("not an entity"))]);
        assert!(PoolConfig::from_data(&bad_entity).is_err());

        let bad_type = record(&[(CONF_POOL_TYPE, json!("lake"))]);
        assert!(matches!(
            PoolConfig::from_data(&bad_type),
            Err(PoolChemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_options_defaults_and_overrides() {
        let options = PoolOptions::from_options(&HashMap::new()).unwrap();
        assert_eq!(options, PoolOptions::default());
        assert!(options.dose_enabled(DoseKind::Acid));
        assert!(!options.dose_enabled(DoseKind::Salt));

        let options = PoolOptions::from_options(&record(&[
            (CONF_TARGET_PH, json!(7.6)),
            (CONF_TARGET_TA, json!(90)),
            (CONF_ACID_TYPE, json!("dry_acid")),
            (CONF_CHLORINE_TYPE, json!("cal_hypo_73")),
            (CONF_ENABLE_DOSE_BORATES, json!(true)),
        ]))
        .unwrap();
        assert_eq!(options.target(TargetField::Ph), 7.6);
        assert_eq!(options.target(TargetField::Ta), 90.0);
        assert_eq!(options.target(TargetField::Ch), DEFAULT_TARGET_CH);
        assert_eq!(options.acid_type.chemical(), ChemicalType::DryAcid);
        assert_eq!(options.chlorine_type, ChlorineType::CalHypo73);
        assert!(options.dose_enabled(DoseKind::Borates));
    }

    #[test]
    fn test_choice_values_match_serde() {
        for acid in AcidType::ALL {
            assert_eq!(serde_json::to_value(acid).unwrap(), json!(acid.value()));
        }
        for chlorine in ChlorineType::ALL {
            assert_eq!(serde_json::to_value(chlorine).unwrap(), json!(chlorine.value()));
        }
        for pool_type in PoolType::ALL {
            assert_eq!(serde_json::to_value(pool_type).unwrap(), json!(pool_type.value()));
        }
        assert_eq!(serde_json::to_value(PhUpType::SodaAsh).unwrap(), json!("soda_ash"));
    }

    #[test]
    fn test_dose_kind_rules() {
        assert!(!DoseKind::Salt.applies_to(PoolType::Chlorine));
        assert!(DoseKind::Salt.applies_to(PoolType::Saltwater));
        assert!(DoseKind::Borates.applies_to(PoolType::Mineral));
        assert!(!DoseKind::Borates.enabled_by_default());
    }
}
