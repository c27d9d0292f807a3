//! Keys, defaults and thresholds shared by the integration

pub const DOMAIN: &str = "poolchem";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const MANUFACTURER: &str = "poolchem";
pub const MODEL: &str = "Virtual Pool";

// Setup data: pool metadata
pub const CONF_POOL_NAME: &str = "pool_name";
pub const CONF_VOLUME_GALLONS: &str = "volume_gallons";
pub const CONF_POOL_TYPE: &str = "pool_type";
pub const CONF_SURFACE_TYPE: &str = "surface_type";

// Setup data: source sensors
pub const CONF_TEMP_ENTITY: &str = "temp_entity";
pub const CONF_PH_ENTITY: &str = "ph_entity";
pub const CONF_FC_ENTITY: &str = "fc_entity";
pub const CONF_TA_ENTITY: &str = "ta_entity";
pub const CONF_CH_ENTITY: &str = "ch_entity";
pub const CONF_CYA_ENTITY: &str = "cya_entity";
pub const CONF_SALT_ENTITY: &str = "salt_entity";
pub const CONF_TDS_ENTITY: &str = "tds_entity";
pub const CONF_BORATES_ENTITY: &str = "borates_entity";

pub const REQUIRED_ENTITIES: [&str; 5] = [
    CONF_TEMP_ENTITY,
    CONF_PH_ENTITY,
    CONF_FC_ENTITY,
    CONF_TA_ENTITY,
    CONF_CH_ENTITY,
];

pub const OPTIONAL_ENTITIES: [&str; 4] = [
    CONF_CYA_ENTITY,
    CONF_SALT_ENTITY,
    CONF_TDS_ENTITY,
    CONF_BORATES_ENTITY,
];

// Options: targets
pub const CONF_TARGET_PH: &str = "target_ph";
pub const CONF_TARGET_FC: &str = "target_fc";
pub const CONF_TARGET_TA: &str = "target_ta";
pub const CONF_TARGET_CH: &str = "target_ch";
pub const CONF_TARGET_CYA: &str = "target_cya";
pub const CONF_TARGET_SALT: &str = "target_salt";
pub const CONF_TARGET_BORATES: &str = "target_borates";

// Options: products
pub const CONF_ACID_TYPE: &str = "acid_type";
pub const CONF_CHLORINE_TYPE: &str = "chlorine_type";
pub const CONF_PH_UP_TYPE: &str = "ph_up_type";

// Options: dosing toggles
pub const CONF_ENABLE_DOSE_ACID: &str = "enable_dose_acid";
pub const CONF_ENABLE_DOSE_CHLORINE: &str = "enable_dose_chlorine";
pub const CONF_ENABLE_DOSE_ALKALINITY: &str = "enable_dose_alkalinity";
pub const CONF_ENABLE_DOSE_CALCIUM: &str = "enable_dose_calcium";
pub const CONF_ENABLE_DOSE_CYA: &str = "enable_dose_cya";
pub const CONF_ENABLE_DOSE_SALT: &str = "enable_dose_salt";
pub const CONF_ENABLE_DOSE_BORATES: &str = "enable_dose_borates";

pub const DEFAULT_POOL_NAME: &str = "Pool";
pub const DEFAULT_VOLUME_GALLONS: f64 = 15_000.0;

pub const DEFAULT_TARGET_PH: f64 = 7.5;
pub const DEFAULT_TARGET_FC: f64 = 5.0;
pub const DEFAULT_TARGET_TA: f64 = 80.0;
pub const DEFAULT_TARGET_CH: f64 = 350.0;
pub const DEFAULT_TARGET_CYA: f64 = 40.0;
pub const DEFAULT_TARGET_SALT: f64 = 3200.0;
pub const DEFAULT_TARGET_BORATES: f64 = 50.0;

// Stand-ins for optional readings without a sensor
pub const DEFAULT_CYA: f64 = 0.0;
pub const DEFAULT_SALT: f64 = 0.0;
pub const DEFAULT_TDS: f64 = 1000.0;
pub const DEFAULT_BORATES: f64 = 0.0;

/// Temperature assumed for the acid dose when the sensor is unreadable
pub const DEFAULT_DOSE_TEMPERATURE_F: f64 = 80.0;

// CSI band edges
pub const CSI_SEVERELY_CORROSIVE: f64 = -0.6;
pub const CSI_BALANCED_LOW: f64 = -0.3;
pub const CSI_BALANCED_HIGH: f64 = 0.3;
pub const CSI_SLIGHTLY_SCALING: f64 = 0.6;

// Minimum FC as a percentage of CYA
pub const MIN_FC_CYA_RATIO: f64 = 7.5;
pub const MIN_FC_CYA_RATIO_SALTWATER: f64 = 5.0;

// Sensor keys
pub const SENSOR_CSI: &str = "csi";
pub const SENSOR_LSI: &str = "lsi";
pub const SENSOR_WATER_BALANCE: &str = "water_balance";
pub const SENSOR_TARGET_CSI: &str = "target_csi";
pub const SENSOR_TARGET_LSI: &str = "target_lsi";
pub const SENSOR_TARGET_WATER_BALANCE: &str = "target_water_balance";
pub const SENSOR_FC_CYA_RATIO: &str = "fc_cya_ratio";

// Flow abort reasons
pub const REASON_RECONFIGURE_FAILED: &str = "reconfigure_failed";
