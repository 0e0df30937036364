//! Config entry entry point

use ha_bluetooth::normalize_address;
use ha_config_entries::{ConfigEntry, EntryRuntime, Integration, SetupError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::client::{LockParams, PushLockConnector};
use super::coordinator::{CoordinatorHost, LifecycleCoordinator};
use super::{
    BlueConnectError, BlueConnectResult, CONF_ADDRESS, CONF_ALWAYS_CONNECTED, CONF_KEY,
    CONF_LOCAL_NAME, CONF_SLOT, DEVICE_TIMEOUT, DOMAIN,
};

/// Creates one [`LifecycleCoordinator`] per config entry
pub struct BlueConnectIntegration {
    host: CoordinatorHost,
    connector: Arc<dyn PushLockConnector>,
    first_update_timeout: Duration,
}

impl BlueConnectIntegration {
    pub fn new(host: CoordinatorHost, connector: Arc<dyn PushLockConnector>) -> Self {
        Self {
            host,
            connector,
            first_update_timeout: DEVICE_TIMEOUT,
        }
    }

    pub fn with_first_update_timeout(mut self, timeout: Duration) -> Self {
        self.first_update_timeout = timeout;
        self
    }

    /// Connection parameters stored in an entry
    pub fn lock_params(entry: &ConfigEntry) -> BlueConnectResult<LockParams> {
        let required = |key: &'static str| {
            entry
                .data_str(key)
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string)
                .ok_or(BlueConnectError::MissingData(key))
        };
        let address = normalize_address(&required(CONF_ADDRESS)?);
        let key = required(CONF_KEY)?;
        let local_name = entry
            .data_str(CONF_LOCAL_NAME)
            .unwrap_or_default()
            .trim()
            .to_string();
        let slot = match entry.data.get(CONF_SLOT) {
            None => 0,
            Some(_) => entry
                .data_u64(CONF_SLOT)
                .and_then(|slot| u8::try_from(slot).ok())
                .ok_or(BlueConnectError::InvalidData(CONF_SLOT))?,
        };

        Ok(LockParams {
            local_name,
            address,
            key,
            slot,
            always_connected: entry.option_bool(CONF_ALWAYS_CONNECTED, false),
            name: entry.title.clone(),
        })
    }
}

impl Integration for BlueConnectIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn create_runtime(&self, entry: &ConfigEntry) -> Result<Arc<dyn EntryRuntime>, SetupError> {
        let params =
            Self::lock_params(entry).map_err(|err| SetupError::Failed(err.to_string()))?;
        debug!(entry_id = %entry.entry_id, address = %params.address, "Creating lock coordinator");
        Ok(LifecycleCoordinator::new(
            entry,
            params,
            self.host.clone(),
            self.connector.clone(),
            self.first_update_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn entry(data: serde_json::Value) -> ConfigEntry {
        let data: HashMap<String, serde_json::Value> = serde_json::from_value(data).unwrap();
        ConfigEntry::new(DOMAIN, "Front Door").with_data(data)
    }

    #[test]
    fn test_lock_params_from_entry() {
        let mut options = HashMap::new();
        options.insert(CONF_ALWAYS_CONNECTED.to_string(), json!(true));
        let entry = entry(json!({
            "local_name": "BC-4F21A9",
            "address": "AA:BB:CC:DD:EE:01",
            "key": "0123456789abcdef",
            "slot": 2,
        }))
        .with_options(options);

        let params = BlueConnectIntegration::lock_params(&entry).unwrap();
        assert_eq!(params.slot, 2);
        assert!(params.always_connected);
        assert_eq!(params.name, "Front Door");
    }

    #[test]
    fn test_lock_params_normalizes_address() {
        let params = BlueConnectIntegration::lock_params(&entry(json!({
            "local_name": " BC-4F21A9 ",
            "address": " aa:bb:cc:dd:ee:01\n",
            "key": "0123456789abcdef",
        })))
        .unwrap();
        assert_eq!(params.address, "AA:BB:CC:DD:EE:01");
        assert_eq!(params.local_name, "BC-4F21A9");
        assert_eq!(params.slot, 0);

        let err = BlueConnectIntegration::lock_params(&entry(json!({
            "address": "   ",
            "key": "k",
        })))
        .unwrap_err();
        assert!(matches!(err, BlueConnectError::MissingData("address")));
    }

    #[test]
    fn test_lock_params_rejects_missing_key() {
        let err = BlueConnectIntegration::lock_params(&entry(json!({
            "address": "AA:BB:CC:DD:EE:01",
            "key": "",
        })))
        .unwrap_err();
        assert!(matches!(err, BlueConnectError::MissingData("key")));

        let err = BlueConnectIntegration::lock_params(&entry(json!({
            "address": "AA:BB:CC:DD:EE:01",
            "key": "k",
            "slot": 300,
        })))
        .unwrap_err();
        assert!(matches!(err, BlueConnectError::InvalidData("slot")));
    }
}
