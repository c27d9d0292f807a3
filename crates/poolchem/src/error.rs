use poolchem_config_entries::ConfigEntriesError;
use poolchem_core::EntityIdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolChemError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(#[source] serde_json::Error),

    #[error("invalid pool options: {0}")]
    InvalidOptions(#[source] serde_json::Error),

    #[error("invalid source sensor for {key}: {value}")]
    InvalidSource { key: &'static str, value: String },

    #[error(transparent)]
    EntityId(#[from] EntityIdError),

    #[error("{key} must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("config entry not found: {0}")]
    EntryNotFound(String),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

pub type Result<T> = std::result::Result<T, PoolChemError>;
