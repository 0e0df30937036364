//! YAML configuration loading for Home Assistant
//!
//! This crate loads `configuration.yaml` with Home Assistant's custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! and extracts the typed integration sections the server sets up.
//!
//! # Example
//!
//! ```ignore
//! use ha_config::IntegrationsConfig;
//!
//! let config = IntegrationsConfig::load(Path::new("/config"))?;
//! for lock in &config.blueconnect {
//!     println!("{}", lock.display_title());
//! }
//! ```

mod error;
mod integrations;
mod loader;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use integrations::{
    BlueConnectDeviceConfig, BluetoothConfig, IntegrationsConfig, BLUECONNECT_DOMAIN,
    BLUETOOTH_DOMAIN,
};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};
pub use secrets::Secrets;

pub use serde_yaml::Value;
