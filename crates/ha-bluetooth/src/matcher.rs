//! Callback matchers

use crate::models::{normalize_address, BluetoothServiceInfo};

/// Selects which advertisements a registered callback receives.
///
/// Every field that is set must match. A `local_name` ending in `*` matches
/// by prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BluetoothCallbackMatcher {
    pub address: Option<String>,
    pub local_name: Option<String>,
    pub manufacturer_id: Option<u16>,
    pub connectable: Option<bool>,
}

impl BluetoothCallbackMatcher {
    /// Matches every advertisement
    pub fn any() -> Self {
        Self::default()
    }

    pub fn address(address: &str) -> Self {
        Self {
            address: Some(normalize_address(address)),
            ..Self::default()
        }
    }

    pub fn local_name(local_name: impl Into<String>) -> Self {
        Self {
            local_name: Some(local_name.into()),
            ..Self::default()
        }
    }

    pub fn with_manufacturer_id(mut self, manufacturer_id: u16) -> Self {
        self.manufacturer_id = Some(manufacturer_id);
        self
    }

    pub fn with_connectable(mut self, connectable: bool) -> Self {
        self.connectable = Some(connectable);
        self
    }

    pub fn matches(&self, info: &BluetoothServiceInfo) -> bool {
        if let Some(address) = &self.address {
            if !address.eq_ignore_ascii_case(info.address()) {
                return false;
            }
        }
        if let Some(pattern) = &self.local_name {
            let Some(name) = info.advertisement.local_name.as_deref() else {
                return false;
            };
            let matched = match pattern.strip_suffix('*') {
                Some(prefix) => name.starts_with(prefix),
                None => name == pattern,
            };
            if !matched {
                return false;
            }
        }
        if let Some(id) = self.manufacturer_id {
            if !info.manufacturer_data().contains_key(&id) {
                return false;
            }
        }
        if let Some(connectable) = self.connectable {
            if connectable && !info.connectable {
                return false;
            }
        }
        true
    }
}
