//! Core types for Home Assistant
//!
//! This crate provides the fundamental types shared by the host crates and
//! the integrations built on them: EntityId, State, Event, Context, the
//! static entity metadata vocabulary, and unsubscribe callbacks.

mod callback;
mod context;
pub mod entity;
mod entity_id;
mod event;
mod state;

pub use callback::{OnUnload, Unsubscribe};
pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use state::State;

/// State value used when an entity has no value to report
pub const STATE_UNKNOWN: &str = "unknown";

/// State value used when an entity cannot be reached
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Binary states
pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";

/// Lock entity states
pub mod lock_states {
    pub const LOCKED: &str = "locked";
    pub const UNLOCKED: &str = "unlocked";
    pub const LOCKING: &str = "locking";
    pub const UNLOCKING: &str = "unlocking";
    pub const JAMMED: &str = "jammed";
}

/// Standard event types used by Home Assistant
pub mod events {
    use super::*;

    /// Event type for state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Event type for Home Assistant stop
    pub const HOMEASSISTANT_STOP: &str = "homeassistant_stop";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }

    /// Data for HOMEASSISTANT_STOP events
    #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
    pub struct HomeAssistantStopData {}

    impl EventData for HomeAssistantStopData {
        fn event_type() -> &'static str {
            HOMEASSISTANT_STOP
        }
    }
}
