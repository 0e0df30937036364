//! Config entry builders for the lock integration

use ha_components::blueconnect::{
    CONF_ADDRESS, CONF_ALWAYS_CONNECTED, CONF_KEY, CONF_LOCAL_NAME, CONF_SLOT, DOMAIN,
};
use ha_config_entries::ConfigEntry;
use serde_json::{json, Value};
use std::collections::HashMap;

pub const FRONT_DOOR_ADDRESS: &str = "AA:BB:CC:DD:EE:01";
pub const FRONT_DOOR_NAME: &str = "BC-4F21A9";
pub const FRONT_DOOR_KEY: &str = "0123456789abcdef";

/// A lock config entry, mirroring a user-created BlueConnect entry
#[derive(Debug, Clone)]
pub struct MockConfigEntry {
    pub title: String,
    pub data: HashMap<String, Value>,
    pub options: HashMap<String, Value>,
    pub unique_id: Option<String>,
}

impl MockConfigEntry {
    pub fn new(address: &str) -> Self {
        let mut data = HashMap::new();
        data.insert(CONF_LOCAL_NAME.to_string(), json!(FRONT_DOOR_NAME));
        data.insert(CONF_ADDRESS.to_string(), json!(address));
        data.insert(CONF_KEY.to_string(), json!(FRONT_DOOR_KEY));
        data.insert(CONF_SLOT.to_string(), json!(1));
        Self {
            title: "Front Door".to_string(),
            data,
            options: HashMap::new(),
            unique_id: Some(address.to_string()),
        }
    }

    pub fn front_door() -> Self {
        Self::new(FRONT_DOOR_ADDRESS)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_data_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn always_connected(self) -> Self {
        self.with_option(CONF_ALWAYS_CONNECTED, json!(true))
    }

    pub fn build(self) -> ConfigEntry {
        let entry = ConfigEntry::new(DOMAIN, self.title)
            .with_data(self.data)
            .with_options(self.options);
        match self.unique_id {
            Some(unique_id) => entry.with_unique_id(unique_id),
            None => entry,
        }
    }
}
