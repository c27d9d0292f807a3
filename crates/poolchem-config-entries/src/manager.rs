//! Config Entries Manager
//!
//! Owns every config entry, persists them, and drives setup/unload through
//! the [`EntryHandler`] registered for the entry's domain.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::state_machine::InvalidTransition;
use crate::storage::{Storable, Storage, StorageError};

pub const STORAGE_KEY: &str = "core.config_entries";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Unload failed: {0}")]
    UnloadFailed(String),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Integration callbacks for an entry's lifecycle
#[async_trait]
pub trait EntryHandler: Send + Sync {
    /// Bring the entry up; an `Err` leaves it in `SetupError`
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), String>;

    /// Tear down everything `setup_entry` created
    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<(), String>;

    /// Options changed on a loaded entry without a reload
    async fn options_updated(&self, _entry: &ConfigEntry) {}
}

pub struct ConfigEntries {
    storage: Arc<Storage>,
    entries: DashMap<String, ConfigEntry>,
    /// Serializes setup and unload
    setup_lock: Mutex<()>,
    /// Serializes writes to storage
    save_lock: Mutex<()>,
    handlers: DashMap<String, Arc<dyn EntryHandler>>,
}

impl ConfigEntries {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            setup_lock: Mutex::new(()),
            save_lock: Mutex::new(()),
            handlers: DashMap::new(),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> ConfigEntriesResult<()> {
        if let Some(data) = self.storage.load::<ConfigEntriesData>().await? {
            info!("Loading {} config entries from storage", data.entries.len());
            for entry in data.entries {
                self.entries.insert(entry.entry_id.clone(), entry);
            }
        }
        Ok(())
    }

    /// Persist every entry
    ///
    /// Saves run one at a time and each snapshots the entries only once it
    /// holds the lock, so the last save to finish carries the latest state.
    pub async fn save(&self) -> ConfigEntriesResult<()> {
        let _guard = self.save_lock.lock().await;
        let mut entries: Vec<ConfigEntry> = self.iter().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.storage.save(&ConfigEntriesData { entries }).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let mut entries: Vec<ConfigEntry> =
            self.iter().filter(|e| e.domain == domain).collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        entries
    }

    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.iter()
            .find(|e| e.domain == domain && e.unique_id.as_deref() == Some(unique_id))
    }

    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(unique_id) = &entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.entries.insert(entry.entry_id.clone(), entry.clone());
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Apply a partial update and persist it
    ///
    /// Does not reload the entry or notify its handler.
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let updated = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
            if let Some(title) = update.title {
                entry.title = title;
            }
            if let Some(data) = update.data {
                entry.data = data;
            }
            if let Some(options) = update.options {
                entry.options = options;
            }
            entry.modified_at = Utc::now();
            entry.clone()
        };

        self.save().await?;
        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Merge `options` into the entry's existing options
    pub async fn merge_options(
        &self,
        entry_id: &str,
        options: HashMap<String, serde_json::Value>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let updated = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
            entry.options.extend(options);
            entry.modified_at = Utc::now();
            entry.clone()
        };

        self.save().await?;
        debug!("Merged options into config entry: {}", entry_id);
        Ok(updated)
    }

    /// Unload (if loaded) and delete an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        if entry.is_loaded() {
            self.unload(entry_id).await?;
        }

        self.entries.remove(entry_id);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    pub fn register_handler(&self, domain: &str, handler: Arc<dyn EntryHandler>) {
        self.handlers.insert(domain.to_string(), handler);
        debug!("Registered entry handler for domain: {}", domain);
    }

    fn handler(&self, domain: &str) -> Option<Arc<dyn EntryHandler>> {
        self.handlers.get(domain).map(|h| h.value().clone())
    }

    /// Set up an entry through its domain's handler
    #[instrument(skip(self))]
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        let result = match self.handler(&entry.domain) {
            Some(handler) => handler.setup_entry(&entry).await,
            None => {
                debug!("No handler for domain {}, marking as loaded", entry.domain);
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(reason) => {
                warn!("Setup failed for entry {}: {}", entry_id, reason);
                self.transition(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                Err(ConfigEntriesError::SetupFailed(reason))
            }
        }
    }

    /// Unload an entry through its domain's handler
    #[instrument(skip(self))]
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        match entry.state {
            ConfigEntryState::NotLoaded => return Ok(()),
            state if !state.is_recoverable() => {
                return Err(ConfigEntriesError::CannotUnload(state))
            }
            _ => {}
        }

        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let result = match (entry.state, self.handler(&entry.domain)) {
            (ConfigEntryState::Loaded, Some(handler)) => handler.unload_entry(&entry).await,
            _ => Ok(()),
        };

        match result {
            Ok(()) => {
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(reason) => {
                warn!("Unload failed for entry {}: {}", entry_id, reason);
                self.transition(entry_id, ConfigEntryState::FailedUnload, Some(reason.clone()))?;
                Err(ConfigEntriesError::UnloadFailed(reason))
            }
        }
    }

    /// Unload then set up again
    pub async fn reload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup(entry_id).await
    }

    /// Tell a loaded entry's handler that its options were replaced
    pub async fn notify_options_updated(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        if !entry.is_loaded() {
            debug!("Entry {} not loaded, skipping options notification", entry_id);
            return Ok(());
        }
        if let Some(handler) = self.handler(&entry.domain) {
            handler.options_updated(&entry).await;
        }
        Ok(())
    }

    /// Set up every entry, collecting per-entry results
    pub async fn setup_all(&self) -> Vec<(String, ConfigEntriesResult<()>)> {
        let mut ids: Vec<ConfigEntry> = self.iter().collect();
        ids.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut results = Vec::with_capacity(ids.len());
        for entry in ids {
            let result = self.setup(&entry.entry_id).await;
            results.push((entry.entry_id, result));
        }
        results
    }

    /// Unload every loaded entry
    pub async fn unload_all(&self) {
        let loaded: Vec<String> = self
            .iter()
            .filter(|e| e.is_loaded())
            .map(|e| e.entry_id)
            .collect();
        for entry_id in loaded {
            if let Err(err) = self.unload(&entry_id).await {
                warn!("Failed to unload entry {}: {}", entry_id, err);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        self.entries.iter().map(|r| r.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConfigEntrySource;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn create_test_manager() -> (TempDir, ConfigEntries) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let manager = ConfigEntries::new(storage);
        (temp_dir, manager)
    }

    #[derive(Default)]
    struct CountingHandler {
        setups: AtomicUsize,
        unloads: AtomicUsize,
        option_updates: AtomicUsize,
        fail_setup: bool,
    }

    #[async_trait]
    impl EntryHandler for CountingHandler {
        async fn setup_entry(&self, _entry: &ConfigEntry) -> Result<(), String> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            if self.fail_setup {
                Err("no source entities".to_string())
            } else {
                Ok(())
            }
        }

        async fn unload_entry(&self, _entry: &ConfigEntry) -> Result<(), String> {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn options_updated(&self, _entry: &ConfigEntry) {
            self.option_updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_add_and_duplicate_unique_id() {
        let (_dir, manager) = create_test_manager();

        manager
            .add(ConfigEntry::new("poolchem", "Pool").with_unique_id("pool"))
            .await
            .unwrap();
        let result = manager
            .add(ConfigEntry::new("poolchem", "Pool 2").with_unique_id("pool"))
            .await;

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_merge_options() {
        let (_dir, manager) = create_test_manager();
        let entry = manager
            .add(
                ConfigEntry::new("poolchem", "Pool")
                    .with_options(HashMap::from([("target_ph".into(), json!(7.5))])),
            )
            .await
            .unwrap();

        let updated = manager
            .merge_options(
                &entry.entry_id,
                HashMap::from([("target_fc".into(), json!(6.0))]),
            )
            .await
            .unwrap();
        assert_eq!(updated.options["target_ph"], json!(7.5));
        assert_eq!(updated.options["target_fc"], json!(6.0));

        let renamed = manager
            .update(&entry.entry_id, ConfigEntryUpdate::new().title("Spa"))
            .await
            .unwrap();
        assert_eq!(renamed.title, "Spa");

        assert!(matches!(
            manager.update("missing", ConfigEntryUpdate::new()).await,
            Err(ConfigEntriesError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_merges_keep_every_option() {
        let (dir, manager) = create_test_manager();
        let manager = Arc::new(manager);
        let entry = manager
            .add(ConfigEntry::new("poolchem", "Pool"))
            .await
            .unwrap();

        for round in 0..20 {
            let tasks: Vec<_> = (0..8)
                .map(|k| {
                    let manager = manager.clone();
                    let entry_id = entry.entry_id.clone();
                    tokio::spawn(async move {
                        manager
                            .merge_options(
                                &entry_id,
                                HashMap::from([(format!("target_{round}_{k}"), json!(k))]),
                            )
                            .await
                    })
                })
                .collect();
            for task in tasks {
                tokio_test::assert_ok!(task.await.unwrap());
            }
        }

        let options = manager.get(&entry.entry_id).unwrap().options;
        assert_eq!(options.len(), 20 * 8);

        let reloaded = ConfigEntries::new(Arc::new(Storage::new(dir.path())));
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.get(&entry.entry_id).unwrap().options, options);
    }

    #[tokio::test]
    async fn test_setup_unload_reload_with_handler() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(CountingHandler::default());
        manager.register_handler("poolchem", handler.clone());

        let entry = manager
            .add(ConfigEntry::new("poolchem", "Pool"))
            .await
            .unwrap();

        tokio_test::assert_ok!(manager.setup(&entry.entry_id).await);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());

        tokio_test::assert_ok!(manager.reload(&entry.entry_id).await);
        assert_eq!(handler.setups.load(Ordering::SeqCst), 2);
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);

        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
    }

    #[tokio::test]
    async fn test_setup_failure_then_unload() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(CountingHandler {
            fail_setup: true,
            ..Default::default()
        });
        manager.register_handler("poolchem", handler.clone());

        let entry = manager
            .add(ConfigEntry::new("poolchem", "Pool"))
            .await
            .unwrap();
        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));
        let stored = manager.get(&entry.entry_id).unwrap();
        assert_eq!(stored.state, ConfigEntryState::SetupError);
        assert_eq!(stored.reason.as_deref(), Some("no source entities"));

        // An entry that never loaded has nothing for the handler to unload
        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_options_notification_only_when_loaded() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(CountingHandler::default());
        manager.register_handler("poolchem", handler.clone());
        let entry = manager
            .add(ConfigEntry::new("poolchem", "Pool"))
            .await
            .unwrap();

        manager.notify_options_updated(&entry.entry_id).await.unwrap();
        assert_eq!(handler.option_updates.load(Ordering::SeqCst), 0);

        manager.setup(&entry.entry_id).await.unwrap();
        manager.notify_options_updated(&entry.entry_id).await.unwrap();
        assert_eq!(handler.option_updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_unloads_first() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(CountingHandler::default());
        manager.register_handler("poolchem", handler.clone());
        let entry = manager
            .add(ConfigEntry::new("poolchem", "Pool"))
            .await
            .unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        manager.remove(&entry.entry_id).await.unwrap();
        assert!(manager.is_empty());
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        {
            let manager = ConfigEntries::new(storage.clone());
            manager
                .add(
                    ConfigEntry::new("poolchem", "Back Yard")
                        .with_unique_id("back_yard")
                        .with_source(ConfigEntrySource::Import)
                        .with_data(HashMap::from([("pool_type".into(), json!("saltwater"))])),
                )
                .await
                .unwrap();
        }

        let manager = ConfigEntries::new(storage);
        manager.load().await.unwrap();

        assert_eq!(manager.len(), 1);
        let entry = manager.get_by_unique_id("poolchem", "back_yard").unwrap();
        assert_eq!(entry.title, "Back Yard");
        assert_eq!(entry.source, ConfigEntrySource::Import);
        assert_eq!(entry.data["pool_type"], json!("saltwater"));
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
        assert_eq!(manager.get_by_domain("poolchem").len(), 1);
    }
}
