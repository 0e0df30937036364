//! State type representing an entity's published state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, STATE_UNAVAILABLE, STATE_UNKNOWN};

/// The state of an entity at a point in time
///
/// The value is always a string ("locked", "on", "87", "unavailable"); the
/// attributes carry the static metadata the entity declared (device class,
/// unit, friendly name) next to dynamic extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,

    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last differed from the previous one
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, changed or not
    pub last_updated: DateTime<Utc>,

    pub context: Context,
}

impl State {
    /// Create a new state with current timestamp
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Create an updated state, preserving last_changed if the value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    pub fn is_unknown(&self) -> bool {
        self.state == STATE_UNKNOWN
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_keeps_last_changed_for_same_value() {
        let id = EntityId::new("lock", "front_door").unwrap();
        let first = State::new(id, "locked", HashMap::new(), Context::new());
        let same = first.with_update("locked", HashMap::new(), Context::new());
        assert_eq!(same.last_changed, first.last_changed);

        let changed = same.with_update("unlocked", HashMap::new(), Context::new());
        assert!(changed.last_changed >= same.last_updated);
        assert_eq!(changed.state, "unlocked");
    }

    #[test]
    fn test_attribute_lookup() {
        let id = EntityId::new("sensor", "front_door_battery").unwrap();
        let state = State::new(
            id,
            "87",
            HashMap::from([("unit_of_measurement".to_string(), json!("%"))]),
            Context::new(),
        );
        assert_eq!(
            state.attribute::<String>("unit_of_measurement").as_deref(),
            Some("%")
        );
        assert!(state.attribute::<String>("device_class").is_none());
        assert!(!state.is_unknown());
    }
}
