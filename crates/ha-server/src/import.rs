//! YAML lock configuration to config entries

use ha_components::blueconnect::{
    CONF_ADDRESS, CONF_ALWAYS_CONNECTED, CONF_KEY, CONF_LOCAL_NAME, CONF_SLOT, DOMAIN,
};
use ha_bluetooth::normalize_address;
use ha_config::BlueConnectDeviceConfig;
use ha_config_entries::{ConfigEntry, ConfigEntrySource};
use serde_json::json;
use std::collections::HashMap;

/// Config entry for one configured lock, keyed by its normalized address
pub fn lock_entry(lock: &BlueConnectDeviceConfig) -> ConfigEntry {
    let address = normalize_address(&lock.address);
    let data = HashMap::from([
        (CONF_LOCAL_NAME.to_string(), json!(lock.local_name)),
        (CONF_ADDRESS.to_string(), json!(address)),
        (CONF_KEY.to_string(), json!(lock.key)),
        (CONF_SLOT.to_string(), json!(lock.slot)),
    ]);
    let options = HashMap::from([(
        CONF_ALWAYS_CONNECTED.to_string(),
        json!(lock.always_connected),
    )]);

    ConfigEntry::new(DOMAIN, lock.display_title())
        .with_data(data)
        .with_options(options)
        .with_unique_id(address)
        .with_source(ConfigEntrySource::Import)
}
