//! Runner configuration
//!
//! ```yaml
//! config_dir: ./config
//! log_level: info
//! readings:
//!   sensor.water_temp: { state: 28.5, unit: "°C" }
//!   sensor.pool_ph: { state: 7.6 }
//! pools:
//!   - unique_id: backyard
//!     title: Backyard
//!     data:
//!       pool_name: Backyard
//!       volume_gallons: 15000
//!       temp_entity: sensor.water_temp
//!       ph_entity: sensor.pool_ph
//!     options:
//!       target_ph: 7.4
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use poolchem::DOMAIN;
use poolchem_config_entries::{ConfigEntries, ConfigEntriesError, ConfigEntry, ConfigEntrySource};
use poolchem_core::{Context, EntityId, EntityIdError, ATTR_UNIT_OF_MEASUREMENT};
use poolchem_state_machine::StateMachine;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid reading entity '{entity_id}': {source}")]
    InvalidReading {
        entity_id: String,
        #[source]
        source: EntityIdError,
    },

    #[error("pool '{0}' is listed more than once")]
    DuplicatePool(String),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

pub type ServerConfigResult<T> = Result<T, ServerConfigError>;

fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Directory holding `.storage/`
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Default tracing filter; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Source sensor states to publish at startup
    #[serde(default)]
    pub readings: BTreeMap<String, Reading>,

    /// Pools to import as config entries
    #[serde(default)]
    pub pools: Vec<PoolImport>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            log_level: default_log_level(),
            readings: BTreeMap::new(),
            pools: Vec::new(),
        }
    }
}

/// A simulated sensor state
#[derive(Debug, Clone, Deserialize)]
pub struct Reading {
    pub state: Value,
    #[serde(default)]
    pub unit: Option<String>,
}

impl Reading {
    fn state_string(&self) -> String {
        match &self.state {
            Value::String(s) => s.clone(),
            Value::Null => poolchem_core::STATE_UNKNOWN.to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolImport {
    pub unique_id: String,
    pub title: String,
    #[serde(default)]
    pub data: HashMap<String, Value>,
    #[serde(default)]
    pub options: HashMap<String, Value>,
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> ServerConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ServerConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ServerConfigError::ParseYaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Reject duplicate pools and unparsable reading ids
    pub fn validate(&self) -> ServerConfigResult<()> {
        let mut seen = HashSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.unique_id.as_str()) {
                return Err(ServerConfigError::DuplicatePool(pool.unique_id.clone()));
            }
        }
        for entity_id in self.readings.keys() {
            parse_entity_id(entity_id)?;
        }
        Ok(())
    }

    /// Publish every configured reading, returning how many were set
    pub fn apply_readings(&self, states: &StateMachine) -> ServerConfigResult<usize> {
        for (entity_id, reading) in &self.readings {
            let mut attributes = HashMap::new();
            if let Some(unit) = &reading.unit {
                attributes.insert(ATTR_UNIT_OF_MEASUREMENT.to_string(), Value::from(unit.as_str()));
            }
            states.set(
                parse_entity_id(entity_id)?,
                reading.state_string(),
                attributes,
                Context::new(),
            );
        }
        Ok(self.readings.len())
    }

    /// Add pools not yet present, matched by unique id
    pub async fn import_pools(&self, entries: &ConfigEntries) -> ServerConfigResult<usize> {
        let mut imported = 0;
        for pool in &self.pools {
            if entries.get_by_unique_id(DOMAIN, &pool.unique_id).is_some() {
                debug!(unique_id = %pool.unique_id, "Pool already imported");
                continue;
            }
            let entry = entries
                .add(
                    ConfigEntry::new(DOMAIN, &pool.title)
                        .with_data(pool.data.clone())
                        .with_options(pool.options.clone())
                        .with_unique_id(&pool.unique_id)
                        .with_source(ConfigEntrySource::Import),
                )
                .await?;
            info!("Imported pool {} ({})", pool.title, entry.entry_id);
            imported += 1;
        }
        Ok(imported)
    }
}

fn parse_entity_id(entity_id: &str) -> ServerConfigResult<EntityId> {
    entity_id
        .parse()
        .map_err(|source| ServerConfigError::InvalidReading {
            entity_id: entity_id.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolchem_config_entries::Storage;
    use poolchem_event_bus::EventBus;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
config_dir: /tmp/pool
log_level: debug
readings:
  sensor.water_temp: { state: 28.5, unit: "°C" }
  sensor.pool_ph: { state: "7.6" }
pools:
  - unique_id: backyard
    title: Backyard
    data:
      pool_name: Backyard
      volume_gallons: 15000
      ph_entity: sensor.pool_ph
    options:
      target_ph: 7.4
"#;

    #[test]
    fn test_parse() {
        let config = ServerConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(config.config_dir, PathBuf::from("/tmp/pool"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.readings.len(), 2);
        assert_eq!(config.readings["sensor.water_temp"].unit.as_deref(), Some("°C"));
        assert_eq!(config.readings["sensor.water_temp"].state_string(), "28.5");
        assert_eq!(config.pools[0].data["volume_gallons"], json!(15000));
        assert_eq!(config.pools[0].options["target_ph"], json!(7.4));
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_yaml("").unwrap();
        assert_eq!(config.config_dir, PathBuf::from("config"));
        assert_eq!(config.log_level, "info");
        assert!(config.pools.is_empty());

        let config = ServerConfig::from_yaml("log_level: warn").unwrap();
        assert_eq!(config.log_level, "warn");
        assert!(config.readings.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let config = ServerConfig::from_yaml(
            "pools:\n  - { unique_id: a, title: A }\n  - { unique_id: a, title: B }\n",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ServerConfigError::DuplicatePool(id)) if id == "a"
        ));

        let config = ServerConfig::from_yaml("readings:\n  not an id: { state: 1 }\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ServerConfigError::InvalidReading { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ServerConfig::load("/nonexistent/poolchem.yaml").unwrap_err();
        assert!(matches!(err, ServerConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_apply_readings() {
        let states = StateMachine::new(Arc::new(EventBus::new()));
        let config = ServerConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(config.apply_readings(&states).unwrap(), 2);

        let temp = states.get(&"sensor.water_temp".parse().unwrap()).unwrap();
        assert_eq!(temp.state, "28.5");
        assert_eq!(temp.unit_of_measurement(), Some("°C"));
        assert_eq!(
            states.get_state(&"sensor.pool_ph".parse().unwrap()).as_deref(),
            Some("7.6")
        );
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let entries = ConfigEntries::new(Arc::new(Storage::new(temp_dir.path())));
        let config = ServerConfig::from_yaml(CONFIG).unwrap();

        assert_eq!(config.import_pools(&entries).await.unwrap(), 1);
        assert_eq!(config.import_pools(&entries).await.unwrap(), 0);

        let entry = entries.get_by_unique_id(DOMAIN, "backyard").unwrap();
        assert_eq!(entry.title, "Backyard");
        assert_eq!(entry.source, ConfigEntrySource::Import);
        assert_eq!(entry.options["target_ph"], json!(7.4));
        assert_eq!(entries.len(), 1);
    }
}
