//! Advertisement matching helpers

use ha_bluetooth::{BluetoothCallbackMatcher, BluetoothManager, BluetoothServiceInfo};

/// Names many locks advertise with out of the box
const GENERIC_LOCAL_NAMES: &[&str] = &["blueconnect", "bc lock", "lock", "smart lock"];

/// Whether `local_name` identifies a single lock.
///
/// Empty names, factory default names and names that are just the address
/// do not.
pub fn local_name_is_unique(local_name: Option<&str>, address: &str) -> bool {
    let Some(name) = local_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return false;
    };
    if name.eq_ignore_ascii_case(address) {
        return false;
    }
    !GENERIC_LOCAL_NAMES
        .iter()
        .any(|generic| name.eq_ignore_ascii_case(generic))
}

/// Matcher for the advertisements of one lock
pub fn bluetooth_callback_matcher(local_name: &str, address: &str) -> BluetoothCallbackMatcher {
    if local_name_is_unique(Some(local_name), address) {
        BluetoothCallbackMatcher::local_name(local_name)
    } else {
        BluetoothCallbackMatcher::address(address)
    }
}

/// Advertisement the host already holds for this lock, if any
pub fn find_existing_service_info(
    manager: &BluetoothManager,
    local_name: &str,
    address: &str,
) -> Option<BluetoothServiceInfo> {
    if let Some(info) = manager.service_info(address) {
        return Some(info);
    }
    if !local_name_is_unique(Some(local_name), address) {
        return None;
    }
    manager
        .discovered_service_info()
        .into_iter()
        .find(|info| info.advertisement.local_name.as_deref() == Some(local_name))
}
