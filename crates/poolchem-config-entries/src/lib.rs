//! Config Entries
//!
//! A config entry is one configured instance of an integration: an
//! immutable `data` record written by the setup wizard and a mutable
//! `options` record. This crate persists entries, drives their lifecycle
//! (setup, unload, reload) through registered [`EntryHandler`]s, and runs
//! the multi-step data entry flows that create and edit them.
//!
//! # Storage
//!
//! Entries are persisted in `.storage/core.config_entries` with version
//! tracking.

pub mod entry;
pub mod flow;
pub mod flow_manager;
pub mod manager;
pub mod state_machine;
pub mod storage;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate};
pub use flow::{
    FieldErrors, FlowContext, FlowError, FlowHandler, FlowHandlerFactory, FlowResult,
    FlowResultType, FlowSource, FormField, NumberMode, Schema, SelectOption, Selector, StepResult, UserInput,
};
pub use flow_manager::FlowManager;
pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, EntryHandler,
    STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};
pub use state_machine::InvalidTransition;
pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};
