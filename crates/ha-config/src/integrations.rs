//! Typed integration sections of configuration.yaml
//!
//! ```yaml
//! bluetooth:
//!   unavailable_timeout: 900
//!
//! blueconnectha_ble:
//!   - title: Front Door
//!     local_name: L123ABC
//!     address: AA:BB:CC:DD:EE:FF
//!     key: !secret front_door_key
//!     slot: 1
//!     always_connected: true
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// Section key of the lock integration
pub const BLUECONNECT_DOMAIN: &str = "blueconnectha_ble";

/// Section key of the Bluetooth host
pub const BLUETOOTH_DOMAIN: &str = "bluetooth";

/// The `bluetooth:` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BluetoothConfig {
    /// Seconds without an advertisement before a device is unavailable
    #[serde(default = "default_unavailable_timeout")]
    pub unavailable_timeout: u64,
}

fn default_unavailable_timeout() -> u64 {
    900
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            unavailable_timeout: default_unavailable_timeout(),
        }
    }
}

impl BluetoothConfig {
    pub fn unavailable_timeout(&self) -> Duration {
        Duration::from_secs(self.unavailable_timeout)
    }
}

/// One lock in the `blueconnectha_ble:` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlueConnectDeviceConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub local_name: String,
    pub address: String,
    /// Offline key of the lock
    pub key: String,
    /// Key slot the offline key is registered in
    #[serde(default)]
    pub slot: u8,
    #[serde(default)]
    pub always_connected: bool,
}

impl BlueConnectDeviceConfig {
    /// Title shown for the device, defaulting to its local name or address
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title,
            _ if !self.local_name.is_empty() => &self.local_name,
            _ => &self.address,
        }
    }

    fn validate(&self, index: usize) -> ConfigResult<()> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("{BLUECONNECT_DOMAIN}[{index}].address"),
                reason: "address must not be empty".to_string(),
            });
        }
        if self.key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("{BLUECONNECT_DOMAIN}[{index}].key"),
                reason: "key must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// The sections of configuration.yaml this server understands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationsConfig {
    pub bluetooth: BluetoothConfig,
    pub blueconnect: Vec<BlueConnectDeviceConfig>,
}

impl IntegrationsConfig {
    /// Extract and validate the known sections from a loaded document.
    /// Unknown top-level sections are ignored.
    pub fn from_value(root: &Value) -> ConfigResult<Self> {
        let bluetooth = match section(root, BLUETOOTH_DOMAIN) {
            Some(Value::Null) | None => BluetoothConfig::default(),
            Some(value) => parse_section(BLUETOOTH_DOMAIN, value)?,
        };

        let blueconnect: Vec<BlueConnectDeviceConfig> = match section(root, BLUECONNECT_DOMAIN) {
            Some(Value::Null) | None => Vec::new(),
            Some(value) => parse_section(BLUECONNECT_DOMAIN, value)?,
        };

        for (index, device) in blueconnect.iter().enumerate() {
            device.validate(index)?;
        }
        for (index, device) in blueconnect.iter().enumerate() {
            let duplicate = blueconnect[..index]
                .iter()
                .any(|other| other.address.eq_ignore_ascii_case(&device.address));
            if duplicate {
                return Err(ConfigError::InvalidValue {
                    key: format!("{BLUECONNECT_DOMAIN}[{index}].address"),
                    reason: format!("{} is configured more than once", device.address),
                });
            }
        }

        Ok(Self {
            bluetooth,
            blueconnect,
        })
    }

    /// Load `configuration.yaml` from `config_dir`
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let root = load_yaml(config_dir, "configuration.yaml")?;
        let config = Self::from_value(&root)?;
        info!(
            locks = config.blueconnect.len(),
            unavailable_timeout = config.bluetooth.unavailable_timeout,
            "Loaded configuration"
        );
        Ok(config)
    }
}

fn section<'a>(root: &'a Value, domain: &str) -> Option<&'a Value> {
    root.as_mapping()?.get(&Value::String(domain.to_string()))
}

fn parse_section<T: serde::de::DeserializeOwned>(domain: &str, value: &Value) -> ConfigResult<T> {
    serde_yaml::from_value(value.clone()).map_err(|source| ConfigError::InvalidSection {
        domain: domain.to_string(),
        source,
    })
}
