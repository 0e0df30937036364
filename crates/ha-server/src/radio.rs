//! Emulated Bluetooth radio
//!
//! Without an adapter the server hears nothing, so every configured lock
//! re-advertises on a fixed interval with a wandering signal strength.

use ha_bluetooth::{AdvertisementData, BleDevice, BluetoothManager, BluetoothServiceInfo};
use ha_components::blueconnect::emulator::EmulatedConnector;
use ha_components::blueconnect::LockInfo;
use ha_config::BlueConnectDeviceConfig;
use ha_core::Unsubscribe;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Manufacturer id BlueConnect locks advertise with
const MANUFACTURER_ID: u16 = 0x0BC1;

fn advertisement(lock: &BlueConnectDeviceConfig, rssi: i16) -> BluetoothServiceInfo {
    let local_name = Some(lock.local_name.clone()).filter(|name| !name.is_empty());
    let mut data = AdvertisementData {
        local_name: local_name.clone(),
        rssi,
        ..Default::default()
    };
    data.manufacturer_data.insert(MANUFACTURER_ID, vec![0x01]);
    BluetoothServiceInfo::new(BleDevice::new(lock.address.as_str(), local_name), data)
}

/// Register an emulated lock per entry and advertise them until the
/// returned [`Unsubscribe`] is called
pub fn spawn(
    bluetooth: Arc<BluetoothManager>,
    connector: Arc<EmulatedConnector>,
    locks: Vec<BlueConnectDeviceConfig>,
    interval: Duration,
) -> Unsubscribe {
    for lock in &locks {
        connector.add_lock(
            &lock.address,
            LockInfo {
                manufacturer: "BlueConnect".to_string(),
                model: "Emulated".to_string(),
                door_sense: true,
                ..Default::default()
            },
        );
    }

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for lock in &locks {
                let rssi = rand::thread_rng().gen_range(-85..=-45);
                let delivered = bluetooth.process_advertisement(advertisement(lock, rssi));
                trace!(address = %lock.address, rssi, delivered, "Emulated advertisement");
            }
        }
    });
    Unsubscribe::new(move || task.abort())
}
