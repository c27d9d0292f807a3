//! Entity state store
//!
//! The StateMachine holds the current [`State`] of every entity and fires a
//! `state_changed` event on the bus whenever a write changes the value or
//! the attributes. Writes that repeat the current value and attributes are
//! absorbed without an event.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use poolchem_core::events::StateChangedData;
use poolchem_core::{Context, EntityId, State};
use poolchem_event_bus::EventBus;
use tracing::{debug, instrument, trace};

pub struct StateMachine {
    states: DashMap<EntityId, State>,
    event_bus: Arc<EventBus>,
}

impl StateMachine {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            event_bus,
        }
    }

    /// Set the state of an entity
    ///
    /// Fires STATE_CHANGED with the old and new state unless nothing
    /// observable changed.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let state = state.into();
        let old_state = self.states.get(&entity_id).map(|s| s.clone());

        if let Some(existing) = &old_state {
            if existing.state == state && existing.attributes == attributes {
                trace!("State unchanged");
                return existing.clone();
            }
        }

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context.clone()),
            None => State::new(entity_id.clone(), state, attributes, context.clone()),
        };

        debug!(
            state = %new_state.state,
            old = old_state.as_ref().map(|s| s.state.as_str()).unwrap_or("<none>"),
            "Setting entity state"
        );

        self.states.insert(entity_id.clone(), new_state.clone());
        self.event_bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state,
                new_state: Some(new_state.clone()),
            },
            context,
        );

        new_state
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value as a string, or None if the entity doesn't exist
    pub fn get_state(&self, entity_id: &EntityId) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// All entity ids in a domain, sorted
    pub fn entity_ids(&self, domain: &str) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .states
            .iter()
            .filter(|r| r.key().domain() == domain)
            .map(|r| r.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn all(&self) -> Vec<State> {
        self.states.iter().map(|r| r.value().clone()).collect()
    }

    /// Remove an entity's state
    ///
    /// Fires STATE_CHANGED with `new_state: None`.
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let old_state = self.states.remove(entity_id).map(|(_, s)| s);

        if let Some(state) = &old_state {
            debug!("Removing entity state");
            self.event_bus.fire_typed(
                StateChangedData {
                    entity_id: entity_id.clone(),
                    old_state: Some(state.clone()),
                    new_state: None,
                },
                context,
            );
        }

        old_state
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

/// Thread-safe wrapper for StateMachine
pub type SharedStateMachine = Arc<StateMachine>;
