//! Advertisement data model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::time::Instant;

/// The peripheral an advertisement came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleDevice {
    /// MAC address (upper case, colon separated) or platform UUID
    pub address: String,
    /// Name reported by the platform, may differ from the advertised local name
    pub name: Option<String>,
}

impl BleDevice {
    pub fn new(address: impl Into<String>, name: Option<String>) -> Self {
        Self {
            address: normalize_address(&address.into()),
            name,
        }
    }
}

/// Decoded advertisement payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvertisementData {
    pub local_name: Option<String>,
    #[serde(default)]
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    #[serde(default)]
    pub service_data: HashMap<String, Vec<u8>>,
    #[serde(default)]
    pub service_uuids: Vec<String>,
    pub rssi: i16,
    pub tx_power: Option<i16>,
}

/// One advertisement as seen by the host
#[derive(Debug, Clone, PartialEq)]
pub struct BluetoothServiceInfo {
    pub device: BleDevice,
    pub advertisement: AdvertisementData,
    /// Adapter or proxy that heard the advertisement
    pub source: String,
    pub connectable: bool,
    /// When the advertisement was received
    pub time: Instant,
}

impl BluetoothServiceInfo {
    pub fn new(device: BleDevice, advertisement: AdvertisementData) -> Self {
        Self {
            device,
            advertisement,
            source: "local".to_string(),
            connectable: true,
            time: Instant::now(),
        }
    }

    pub fn address(&self) -> &str {
        &self.device.address
    }

    /// Advertised local name, falling back to the platform device name
    pub fn name(&self) -> Option<&str> {
        self.advertisement
            .local_name
            .as_deref()
            .or(self.device.name.as_deref())
    }

    pub fn rssi(&self) -> i16 {
        self.advertisement.rssi
    }

    pub fn manufacturer_data(&self) -> &HashMap<u16, Vec<u8>> {
        &self.advertisement.manufacturer_data
    }
}

/// Why a callback is being invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BluetoothChange {
    Advertisement,
}

/// Scanning mode requested by a callback registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BluetoothScanningMode {
    #[default]
    Passive,
    Active,
}

/// Trim and upper-case an address so lookups are case-insensitive
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}
