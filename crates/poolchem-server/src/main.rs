//! Pool chemistry runner
//!
//! Hosts the integration on an in-process event bus and state machine:
//! restores config entries from `<config_dir>/.storage`, imports pools
//! from the YAML file, publishes the simulated readings and keeps every
//! pool live until Ctrl-C.
//!
//! Usage: `poolchem [config.yaml]` (defaults to `poolchem.yaml` when present)

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use poolchem::PoolChemIntegration;
use poolchem_config_entries::{ConfigEntries, FlowManager, Storage};
use poolchem_core::events::{RUNTIME_STARTED, RUNTIME_STOP};
use poolchem_core::{Context, Event};
use poolchem_event_bus::EventBus;
use poolchem_state_machine::StateMachine;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

const DEFAULT_CONFIG_FILE: &str = "poolchem.yaml";

/// The running host
struct Runtime {
    bus: Arc<EventBus>,
    states: Arc<StateMachine>,
    entries: Arc<ConfigEntries>,
    integration: Arc<PoolChemIntegration>,
    // Kept alive so flows could be driven while running
    _flows: FlowManager,
}

impl Runtime {
    fn new(config: &ServerConfig) -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        let entries = Arc::new(ConfigEntries::new(Arc::new(Storage::new(&config.config_dir))));
        let flows = FlowManager::new(entries.clone());
        let integration = Arc::new(PoolChemIntegration::new(
            states.clone(),
            bus.clone(),
            entries.clone(),
        ));
        integration.register(&entries, &flows);

        Self {
            bus,
            states,
            entries,
            integration,
            _flows: flows,
        }
    }

    fn fire(&self, event_type: &str) {
        self.bus.fire(Event::new(
            event_type,
            serde_json::json!({}),
            Context::new(),
        ));
    }

    fn log_pools(&self) {
        for entry in self.entries.iter().filter(|e| e.is_loaded()) {
            let Some(data) = self
                .integration
                .coordinator(&entry.entry_id)
                .and_then(|c| c.data())
            else {
                info!("{}: waiting for source sensors", entry.title);
                continue;
            };
            info!(
                csi = ?data.csi,
                lsi = ?data.lsi,
                balance = ?data.balance_state.map(|s| s.as_str()),
                fc_cya_ratio = ?data.fc_cya_ratio,
                doses = data.doses.len(),
                "{}: {} errors",
                entry.title,
                data.errors.len()
            );
        }
    }
}

fn load_config() -> Result<ServerConfig> {
    let path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() => {
            PathBuf::from(DEFAULT_CONFIG_FILE)
        }
        None => return Ok(ServerConfig::default()),
    };
    let config = ServerConfig::load(&path)?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_level)?;

    info!("Starting pool chemistry runner");
    let runtime = Runtime::new(&config);

    runtime
        .entries
        .load()
        .await
        .context("failed to load config entries")?;
    let imported = config.import_pools(&runtime.entries).await?;
    let readings = config.apply_readings(&runtime.states)?;
    info!(
        entries = runtime.entries.len(),
        imported, readings, "Configuration loaded"
    );

    for (entry_id, result) in runtime.entries.setup_all().await {
        if let Err(err) = result {
            warn!("Setup failed for {}: {}", entry_id, err);
        }
    }
    runtime.fire(RUNTIME_STARTED);
    runtime.log_pools();

    info!("Pool chemistry runner is running");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    runtime.fire(RUNTIME_STOP);
    runtime.entries.unload_all().await;
    runtime.entries.save().await?;

    Ok(())
}
