//! Advertisement dispatch and device availability

use crate::matcher::BluetoothCallbackMatcher;
use crate::models::{normalize_address, BluetoothChange, BluetoothScanningMode, BluetoothServiceInfo};
use dashmap::DashMap;
use ha_core::Unsubscribe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Called for every matching advertisement
pub type AdvertisementCallback = Arc<dyn Fn(&BluetoothServiceInfo, BluetoothChange) + Send + Sync>;

/// Called with the last advertisement of a device that went away
pub type UnavailableCallback = Arc<dyn Fn(&BluetoothServiceInfo) + Send + Sync>;

/// A device is unavailable once it has not advertised for this long
pub const DEFAULT_UNAVAILABLE_TIMEOUT: Duration = Duration::from_secs(900);

struct CallbackRegistration {
    matcher: BluetoothCallbackMatcher,
    mode: BluetoothScanningMode,
    callback: AdvertisementCallback,
}

struct UnavailableTracker {
    address: String,
    callback: UnavailableCallback,
}

/// Host-side Bluetooth manager.
///
/// Callbacks are copied out of the registries before they run, so a
/// callback may register or unsubscribe other callbacks.
pub struct BluetoothManager {
    /// Latest advertisement per address
    discovered: DashMap<String, BluetoothServiceInfo>,
    callbacks: Arc<DashMap<u64, CallbackRegistration>>,
    trackers: Arc<DashMap<u64, UnavailableTracker>>,
    next_id: AtomicU64,
    unavailable_timeout: Duration,
}

impl BluetoothManager {
    pub fn new() -> Self {
        Self::with_unavailable_timeout(DEFAULT_UNAVAILABLE_TIMEOUT)
    }

    pub fn with_unavailable_timeout(unavailable_timeout: Duration) -> Self {
        Self {
            discovered: DashMap::new(),
            callbacks: Arc::new(DashMap::new()),
            trackers: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            unavailable_timeout,
        }
    }

    pub fn unavailable_timeout(&self) -> Duration {
        self.unavailable_timeout
    }

    /// Register a callback for advertisements selected by `matcher`
    pub fn register_callback(
        &self,
        callback: AdvertisementCallback,
        matcher: BluetoothCallbackMatcher,
        mode: BluetoothScanningMode,
    ) -> Unsubscribe {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!(id, ?matcher, ?mode, "Registered bluetooth callback");
        self.callbacks.insert(
            id,
            CallbackRegistration {
                matcher,
                mode,
                callback,
            },
        );

        let callbacks = Arc::downgrade(&self.callbacks);
        Unsubscribe::new(move || {
            if let Some(callbacks) = callbacks.upgrade() {
                callbacks.remove(&id);
            }
        })
    }

    /// Call `callback` when the device at `address` stops advertising
    pub fn track_unavailable(&self, callback: UnavailableCallback, address: &str) -> Unsubscribe {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let address = normalize_address(address);
        debug!(id, %address, "Tracking bluetooth device availability");
        self.trackers
            .insert(id, UnavailableTracker { address, callback });

        let trackers = Arc::downgrade(&self.trackers);
        Unsubscribe::new(move || {
            if let Some(trackers) = trackers.upgrade() {
                trackers.remove(&id);
            }
        })
    }

    /// Latest advertisement of every device currently considered present
    pub fn discovered_service_info(&self) -> Vec<BluetoothServiceInfo> {
        self.discovered.iter().map(|r| r.value().clone()).collect()
    }

    /// Latest advertisement for one address
    pub fn service_info(&self, address: &str) -> Option<BluetoothServiceInfo> {
        self.discovered
            .get(&normalize_address(address))
            .map(|r| r.value().clone())
    }

    /// Record an advertisement and deliver it to every matching callback.
    ///
    /// Returns the number of callbacks invoked.
    pub fn process_advertisement(&self, info: BluetoothServiceInfo) -> usize {
        self.discovered
            .insert(info.address().to_string(), info.clone());

        let matching: Vec<AdvertisementCallback> = self
            .callbacks
            .iter()
            .filter(|r| r.matcher.matches(&info))
            .map(|r| r.callback.clone())
            .collect();

        trace!(
            address = %info.address(),
            rssi = info.rssi(),
            callbacks = matching.len(),
            "Dispatching advertisement"
        );
        for callback in &matching {
            callback(&info, BluetoothChange::Advertisement);
        }
        matching.len()
    }

    /// Forget a device and notify its availability trackers.
    ///
    /// Returns `false` if the device was not known.
    pub fn mark_unavailable(&self, address: &str) -> bool {
        match self.discovered.remove(&normalize_address(address)) {
            Some((_, info)) => {
                self.notify_unavailable(&info);
                true
            }
            None => false,
        }
    }

    /// Drop devices that have not advertised within the unavailable
    /// timeout. Returns the expired addresses.
    pub fn expire_stale(&self) -> Vec<String> {
        let now = Instant::now();
        let stale: Vec<String> = self
            .discovered
            .iter()
            .filter(|r| now.saturating_duration_since(r.time) >= self.unavailable_timeout)
            .map(|r| r.key().clone())
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for address in stale {
            // Re-check under removal: a fresh advertisement may have landed
            let removed = self.discovered.remove_if(&address, |_, info| {
                now.saturating_duration_since(info.time) >= self.unavailable_timeout
            });
            if let Some((_, info)) = removed {
                debug!(%address, "Bluetooth device is no longer advertising");
                self.notify_unavailable(&info);
                expired.push(address);
            }
        }
        expired
    }

    /// Periodically expire stale devices until the returned
    /// [`Unsubscribe`] is called or the manager is dropped.
    pub fn spawn_unavailable_tracker(self: &Arc<Self>, interval: Duration) -> Unsubscribe {
        let manager: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                manager.expire_stale();
            }
        });
        Unsubscribe::new(move || task.abort())
    }

    /// Number of registered advertisement callbacks
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Number of registered availability trackers
    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    fn notify_unavailable(&self, info: &BluetoothServiceInfo) {
        let matching: Vec<UnavailableCallback> = self
            .trackers
            .iter()
            .filter(|r| r.address.eq_ignore_ascii_case(info.address()))
            .map(|r| r.callback.clone())
            .collect();
        for callback in &matching {
            callback(info);
        }
    }
}

impl Default for BluetoothManager {
    fn default() -> Self {
        Self::new()
    }
}
