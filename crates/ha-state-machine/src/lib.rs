//! State machine and entity platform registration for Home Assistant
//!
//! This crate provides the StateMachine, which tracks the published state of
//! every entity and fires STATE_CHANGED events on the event bus. It also
//! assigns entity ids: integrations register entities by a stable unique id
//! and get back the same [`EntityId`] every time the config entry is set up.

use dashmap::DashMap;
use ha_core::events::StateChangedData;
use ha_core::{Context, EntityId, EntityIdError, State};
use ha_event_bus::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Key identifying one entity across setups: (platform, domain, unique_id)
type RegistrationKey = (String, String, String);

/// The state machine tracks all entity states
pub struct StateMachine {
    /// All entity states keyed by entity_id string
    states: DashMap<String, State>,
    /// Unique id registrations
    registrations: DashMap<RegistrationKey, EntityId>,
    /// Entity ids handed out, to keep generated ids distinct
    claimed: DashMap<String, RegistrationKey>,
    /// Event bus for firing state change events
    event_bus: Arc<EventBus>,
}

impl StateMachine {
    /// Create a new state machine with the given event bus
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            registrations: DashMap::new(),
            claimed: DashMap::new(),
            event_bus,
        }
    }

    /// Register an entity and return its entity id.
    ///
    /// The same (platform, domain, unique_id) always maps to the same id.
    /// New ids are derived from `suggested_object_id` and suffixed with
    /// `_2`, `_3`, … when already taken.
    pub fn register_entity(
        &self,
        platform: &str,
        domain: &str,
        unique_id: &str,
        suggested_object_id: &str,
    ) -> Result<EntityId, EntityIdError> {
        let key = (
            platform.to_string(),
            domain.to_string(),
            unique_id.to_string(),
        );
        if let Some(existing) = self.registrations.get(&key) {
            return Ok(existing.clone());
        }

        let preferred = EntityId::new(domain, slugify(suggested_object_id))?;
        let mut candidate = preferred.clone();
        let mut tries = 1;
        while self.claimed.contains_key(&candidate.to_string()) {
            tries += 1;
            candidate = preferred.with_suffix(tries);
        }

        self.claimed.insert(candidate.to_string(), key.clone());
        self.registrations.insert(key, candidate.clone());
        debug!(entity_id = %candidate, platform, unique_id, "Registered entity");
        Ok(candidate)
    }

    /// Look up the entity id registered for a unique id
    pub fn entity_id_for(&self, platform: &str, domain: &str, unique_id: &str) -> Option<EntityId> {
        self.registrations
            .get(&(
                platform.to_string(),
                domain.to_string(),
                unique_id.to_string(),
            ))
            .map(|id| id.clone())
    }

    /// Set the state of an entity
    ///
    /// Fires a STATE_CHANGED event with the old and new state.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let key = entity_id.to_string();
        let old_state = self.states.get(&key).map(|s| s.clone());

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context.clone()),
            None => State::new(entity_id.clone(), state, attributes, context.clone()),
        };

        trace!(state = %new_state.state, "Setting entity state");
        self.states.insert(key, new_state.clone());

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

    /// Get the current state of an entity
    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value, or None if the entity has no state
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// Check if an entity is in a specific state
    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.get_state(entity_id).as_deref() == Some(state)
    }

    /// Entity ids with a state in `domain`
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        let prefix = format!("{domain}.");
        self.states
            .iter()
            .filter(|r| r.key().starts_with(&prefix))
            .map(|r| r.key().clone())
            .collect()
    }

    /// Remove an entity's state
    ///
    /// The unique id registration is kept so a later setup reuses the id.
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let old_state = self.states.remove(&entity_id.to_string()).map(|(_, s)| s);

        if let Some(state) = &old_state {
            trace!("Removing entity state");
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

    /// Number of entities with a state
    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

/// Slugify a display name into an object id
fn slugify(name: &str) -> String {
    let slugged = slug::slugify(name).replace('-', "_");
    if slugged.is_empty() {
        "unnamed".to_string()
    } else {
        slugged
    }
}

/// Thread-safe wrapper for StateMachine
pub type SharedStateMachine = Arc<StateMachine>;
