//! Advertisement fixtures

use ha_bluetooth::{AdvertisementData, BleDevice, BluetoothServiceInfo};

/// Manufacturer id in BlueConnect advertisements
pub const BLUECONNECT_MANUFACTURER_ID: u16 = 0x0BC1;

/// An advertisement from a lock
pub fn lock_service_info(address: &str, local_name: &str, rssi: i16) -> BluetoothServiceInfo {
    let mut advertisement = AdvertisementData {
        local_name: Some(local_name.to_string()),
        rssi,
        ..Default::default()
    };
    advertisement
        .manufacturer_data
        .insert(BLUECONNECT_MANUFACTURER_ID, vec![0x01, 0x02, 0x03]);
    BluetoothServiceInfo::new(
        BleDevice::new(address, Some(local_name.to_string())),
        advertisement,
    )
}

/// An advertisement from an unrelated device
pub fn other_service_info(rssi: i16) -> BluetoothServiceInfo {
    BluetoothServiceInfo::new(
        BleDevice::new("11:22:33:44:55:66", Some("Thermometer".to_string())),
        AdvertisementData {
            local_name: Some("Thermometer".to_string()),
            rssi,
            ..Default::default()
        },
    )
}
