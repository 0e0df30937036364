//! Bluetooth for Home Assistant
//!
//! This crate is the host side of BLE: it receives advertisements from the
//! scanner, keeps the most recent one per address, dispatches them to the
//! callbacks integrations registered, and reports devices that stopped
//! advertising.
//!
//! # Key Types
//!
//! - [`BluetoothManager`] - Callback registration, dispatch and availability
//! - [`BluetoothServiceInfo`] - One received advertisement
//! - [`BluetoothCallbackMatcher`] - Which advertisements a callback wants

mod manager;
mod matcher;
mod models;

pub use manager::{
    AdvertisementCallback, BluetoothManager, UnavailableCallback,
    DEFAULT_UNAVAILABLE_TIMEOUT,
};
pub use matcher::BluetoothCallbackMatcher;
pub use models::{
    normalize_address, AdvertisementData, BleDevice, BluetoothChange, BluetoothScanningMode,
    BluetoothServiceInfo,
};
