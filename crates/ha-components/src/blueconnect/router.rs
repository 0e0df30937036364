//! Routes host advertisements to a device handle

use ha_bluetooth::{
    AdvertisementCallback, BluetoothCallbackMatcher, BluetoothChange, BluetoothManager,
    BluetoothServiceInfo, UnavailableCallback,
};
use std::sync::Arc;
use tracing::trace;

use super::device::DeviceHandle;
use super::util::{bluetooth_callback_matcher, find_existing_service_info, local_name_is_unique};

/// Filters advertisements down to one lock.
///
/// The host matcher already narrows delivery, but the router re-checks
/// every advertisement so a broad registration never reaches the device.
pub struct AdvertisementRouter {
    device: Arc<DeviceHandle>,
    address: String,
    /// Set only when the configured name identifies a single lock
    local_name: Option<String>,
}

impl AdvertisementRouter {
    pub fn new(device: Arc<DeviceHandle>) -> Self {
        let address = device.address().to_string();
        let local_name = Some(device.local_name().to_string())
            .filter(|name| local_name_is_unique(Some(name.as_str()), &address));
        Self {
            device,
            address,
            local_name,
        }
    }

    /// Whether an advertisement belongs to this lock
    pub fn matches(&self, info: &BluetoothServiceInfo) -> bool {
        if info.address().eq_ignore_ascii_case(&self.address) {
            return true;
        }
        match (&self.local_name, info.advertisement.local_name.as_deref()) {
            (Some(expected), Some(name)) => expected == name,
            _ => false,
        }
    }

    /// Forward a matching advertisement. Returns `false` if it was ignored.
    pub fn handle_advertisement(&self, info: &BluetoothServiceInfo) -> bool {
        if !self.matches(info) {
            trace!(address = %info.address(), "Ignoring advertisement for another device");
            return false;
        }
        self.device.update_advertisement(info);
        true
    }

    pub fn handle_unavailable(&self, _info: &BluetoothServiceInfo) {
        self.device.reset_state();
    }

    /// Feed the advertisement the host already holds, if any.
    ///
    /// Covers an advertisement that arrived before the callback was
    /// registered.
    pub fn replay_existing(&self, manager: &BluetoothManager) -> bool {
        let local_name = self.device.local_name();
        match find_existing_service_info(manager, local_name, &self.address) {
            Some(info) => self.handle_advertisement(&info),
            None => false,
        }
    }

    /// Host matcher for this lock's advertisements
    pub fn matcher(&self) -> BluetoothCallbackMatcher {
        bluetooth_callback_matcher(self.device.local_name(), &self.address)
    }

    pub fn advertisement_callback(self: &Arc<Self>) -> AdvertisementCallback {
        let router = self.clone();
        Arc::new(move |info: &BluetoothServiceInfo, _change: BluetoothChange| {
            router.handle_advertisement(info);
        })
    }

    pub fn unavailable_callback(self: &Arc<Self>) -> UnavailableCallback {
        let router = self.clone();
        Arc::new(move |info: &BluetoothServiceInfo| router.handle_unavailable(info))
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueconnect::emulator::EmulatedConnector;
    use crate::blueconnect::{LockParams, PushLockConnector};
    use ha_bluetooth::{AdvertisementData, BleDevice, BluetoothScanningMode};

    const ADDRESS: &str = "AA:BB:CC:DD:EE:01";

    fn router(local_name: &str) -> Arc<AdvertisementRouter> {
        let params = LockParams {
            local_name: local_name.to_string(),
            address: ADDRESS.to_string(),
            key: "0123456789abcdef".to_string(),
            slot: 1,
            always_connected: false,
            name: "Front Door".to_string(),
        };
        let client = EmulatedConnector::new().connect(&params);
        let device = Arc::new(DeviceHandle::new(client, &params, "Front Door"));
        Arc::new(AdvertisementRouter::new(device))
    }

    fn adv(address: &str, name: &str, rssi: i16) -> BluetoothServiceInfo {
        BluetoothServiceInfo::new(
            BleDevice::new(address, None),
            AdvertisementData {
                local_name: Some(name.to_string()),
                rssi,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_non_matching_advertisement_does_not_mutate() {
        let router = router("BC-4F21A9");
        assert!(!router.handle_advertisement(&adv("11:22:33:44:55:66", "Other", -40)));
        assert!(router.device.advertisement().is_none());
        assert_eq!(router.device.connection_info().rssi, None);
    }

    #[test]
    fn test_matches_by_unique_name_or_address() {
        let unique = router("BC-4F21A9");
        assert!(unique.matches(&adv("11:22:33:44:55:66", "BC-4F21A9", -40)));
        assert!(unique.matches(&adv("aa:bb:cc:dd:ee:01", "Other", -40)));

        let generic = router("BlueConnect");
        assert!(!generic.matches(&adv("11:22:33:44:55:66", "BlueConnect", -40)));
        assert!(generic.matches(&adv(ADDRESS, "BlueConnect", -40)));
    }

    #[test]
    fn test_identical_advertisements_are_forwarded() {
        let router = router("BC-4F21A9");
        let info = adv(ADDRESS, "BC-4F21A9", -61);
        assert!(router.handle_advertisement(&info));
        assert!(router.handle_advertisement(&info));
        assert_eq!(router.device.advertisement(), Some(info));
    }

    #[test]
    fn test_host_dispatch_and_unavailable() {
        let manager = BluetoothManager::new();
        let router = router("BC-4F21A9");
        let unsub = manager.register_callback(
            router.advertisement_callback(),
            router.matcher(),
            BluetoothScanningMode::Passive,
        );
        let tracker = manager.track_unavailable(router.unavailable_callback(), router.address());

        assert_eq!(manager.process_advertisement(adv(ADDRESS, "BC-4F21A9", -50)), 1);
        assert_eq!(router.device.connection_info().rssi, Some(-50));

        assert!(manager.mark_unavailable(ADDRESS));
        assert!(router.device.advertisement().is_none());

        unsub.call();
        tracker.call();
        assert_eq!(manager.callback_count(), 0);
        assert_eq!(manager.tracker_count(), 0);
    }

    #[test]
    fn test_padded_address_receives_host_dispatch() {
        let params = LockParams {
            local_name: "BlueConnect".to_string(),
            address: " aa:bb:cc:dd:ee:01 ".to_string(),
            key: "0123456789abcdef".to_string(),
            slot: 1,
            always_connected: false,
            name: "Front Door".to_string(),
        };
        let client = EmulatedConnector::new().connect(&params);
        let device = Arc::new(DeviceHandle::new(client, &params, "Front Door"));
        let router = Arc::new(AdvertisementRouter::new(device));
        assert_eq!(router.address(), ADDRESS);
        assert_eq!(router.device.name(), format!("Front Door ({ADDRESS})"));

        let manager = BluetoothManager::new();
        let _unsub = manager.register_callback(
            router.advertisement_callback(),
            router.matcher(),
            BluetoothScanningMode::Passive,
        );
        assert_eq!(manager.process_advertisement(adv(ADDRESS, "BlueConnect", -47)), 1);
        assert!(router.device.advertisement().is_some());
    }

    #[test]
    fn test_platform_name_is_not_a_local_name() {
        let router = router("BC-4F21A9");
        let info = BluetoothServiceInfo::new(
            BleDevice::new("11:22:33:44:55:66", Some("BC-4F21A9".to_string())),
            AdvertisementData {
                rssi: -40,
                ..Default::default()
            },
        );
        assert!(!router.matches(&info));
        assert!(!router.matcher().matches(&info));
    }

    #[test]
    fn test_replay_existing() {
        let manager = BluetoothManager::new();
        let router = router("BC-4F21A9");
        assert!(!router.replay_existing(&manager));

        manager.process_advertisement(adv(ADDRESS, "BC-4F21A9", -58));
        assert!(router.replay_existing(&manager));
        assert_eq!(router.device.connection_info().rssi, Some(-58));
    }
}
