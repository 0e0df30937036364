//! BlueConnect Bluetooth push locks
//!
//! One config entry is one lock. Its [`LifecycleCoordinator`] opens a
//! [`DeviceHandle`] on the lock, feeds it advertisements through an
//! [`AdvertisementRouter`], and fans every decoded notification out to the
//! entity adapters through an [`ObserverRegistry`]:
//!
//! ```text
//! BluetoothManager ──► AdvertisementRouter ──► DeviceHandle ──► PushLockClient
//!                                                   │
//!                                            ObserverRegistry
//!                                     ┌─────────┬───┴──────┬──────────┐
//!                                   lock     door      sensors    reauth
//! ```
//!
//! The BLE session itself sits behind [`PushLockClient`]; [`emulator`]
//! provides an in-memory lock for tests and the demo server.

mod binary_sensor;
mod client;
mod coordinator;
mod device;
pub mod emulator;
mod entity;
mod integration;
mod lock;
mod models;
mod observer;
mod router;
mod sensor;
mod util;

use std::time::Duration;

pub use binary_sensor::DoorSensor;
pub use client::{LockError, LockEvent, LockParams, PushLockClient, PushLockConnector};
pub use coordinator::{CoordinatorHost, LifecyclePhase, LifecycleCoordinator};
pub use device::DeviceHandle;
pub use entity::{BlueConnectEntity, EntityAdapter};
pub use integration::BlueConnectIntegration;
pub use lock::LockEntity;
pub use models::{
    AuthState, BatteryState, ConnectionInfo, DoorStatus, LockInfo, LockState, LockStatus,
};
pub use observer::{LockCallback, ObserverRegistry, ObserverToken};
pub use router::AdvertisementRouter;
pub use sensor::{SensorDescription, SensorEntity, SensorValue, SENSORS};
pub use util::{bluetooth_callback_matcher, find_existing_service_info, local_name_is_unique};

/// Integration domain
pub const DOMAIN: &str = "blueconnectha_ble";

pub const CONF_LOCAL_NAME: &str = "local_name";
pub const CONF_ADDRESS: &str = "address";
pub const CONF_KEY: &str = "key";
pub const CONF_SLOT: &str = "slot";
pub const CONF_ALWAYS_CONNECTED: &str = "always_connected";

/// How long setup waits for the lock's first notification
pub const DEVICE_TIMEOUT: Duration = Duration::from_secs(55);

/// Invalid config entry contents
#[derive(Debug, thiserror::Error)]
pub enum BlueConnectError {
    #[error("config entry is missing '{0}'")]
    MissingData(&'static str),

    #[error("config entry has an invalid '{0}'")]
    InvalidData(&'static str),
}

pub type BlueConnectResult<T> = Result<T, BlueConnectError>;
