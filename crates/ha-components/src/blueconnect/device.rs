//! Shared connection to one lock

use ha_bluetooth::{normalize_address, BluetoothServiceInfo};
use ha_core::Unsubscribe;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use super::client::{LockError, LockEvent, LockParams, PushLockClient};
use super::models::{ConnectionInfo, LockInfo, LockState};
use super::observer::{LockCallback, ObserverRegistry};
use super::util::local_name_is_unique;

/// Last known view of the lock
#[derive(Debug, Default)]
struct Snapshot {
    advertisement: Option<BluetoothServiceInfo>,
    lock_state: LockState,
    lock_info: LockInfo,
    connection_info: ConnectionInfo,
}

/// Outcome of the wait for the first notification
#[derive(Debug, Clone, PartialEq)]
enum FirstUpdate {
    Pending,
    Received,
    Failed(LockError),
}

/// The single connection object for one configured lock.
///
/// Holds the last decoded state and fans notifications out to the
/// registered observers. Only the device handle starts and stops the
/// underlying client.
pub struct DeviceHandle {
    client: Arc<dyn PushLockClient>,
    address: String,
    local_name: String,
    name: String,
    snapshot: RwLock<Snapshot>,
    observers: ObserverRegistry,
    first_update: watch::Sender<FirstUpdate>,
}

impl DeviceHandle {
    pub fn new(client: Arc<dyn PushLockClient>, params: &LockParams, title: &str) -> Self {
        let address = normalize_address(&params.address);
        let id = if local_name_is_unique(Some(&params.local_name), &address) {
            params.local_name.as_str()
        } else {
            address.as_str()
        };
        let name = format!("{title} ({id})");
        let (first_update, _) = watch::channel(FirstUpdate::Pending);
        Self {
            client,
            address,
            local_name: params.local_name.clone(),
            name,
            snapshot: RwLock::new(Snapshot::default()),
            observers: ObserverRegistry::new(),
            first_update,
        }
    }

    /// Start the client and the task that feeds its events to this handle.
    ///
    /// The returned [`Unsubscribe`] stops both.
    pub async fn start(self: &Arc<Self>) -> Result<Unsubscribe, LockError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let device = Arc::downgrade(self);
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(device) = device.upgrade() else {
                    return;
                };
                device.handle_event(event);
            }
        });

        if let Err(err) = self.client.start(tx).await {
            pump.abort();
            return Err(err);
        }
        debug!(address = %self.address, name = %self.name, "Lock connection started");

        let client = self.client.clone();
        let address = self.address.clone();
        Ok(Unsubscribe::new(move || {
            debug!(%address, "Stopping lock connection");
            client.stop();
            pump.abort();
        }))
    }

    /// Apply one event from the client
    pub fn handle_event(&self, event: LockEvent) {
        match event {
            LockEvent::State {
                state,
                info,
                connection,
            } => {
                trace!(address = %self.address, lock = ?state.lock, door = ?state.door, "Lock state update");
                {
                    let mut snapshot = self.write();
                    snapshot.lock_state = state.clone();
                    snapshot.lock_info = info.clone();
                    snapshot.connection_info = connection;
                }
                let auth_failed = state.auth_failed();
                self.first_update.send_if_modified(|outcome| {
                    if *outcome != FirstUpdate::Pending {
                        return false;
                    }
                    *outcome = if auth_failed {
                        FirstUpdate::Failed(LockError::Auth("key rejected by lock".to_string()))
                    } else {
                        FirstUpdate::Received
                    };
                    true
                });
                self.observers.notify(&state, &info, &connection);
            }
            LockEvent::Error(err) => {
                let first = self.first_update.send_if_modified(|outcome| {
                    if *outcome != FirstUpdate::Pending {
                        return false;
                    }
                    *outcome = FirstUpdate::Failed(err.clone());
                    true
                });
                if !first {
                    warn!(address = %self.address, error = %err, "Lock reported an error");
                }
            }
        }
    }

    /// Wait until the first notification arrives.
    ///
    /// Fails with [`LockError::Timeout`] after `timeout`, or with the error
    /// the client reported before any notification.
    pub async fn wait_for_first_update(&self, timeout: Duration) -> Result<(), LockError> {
        let mut rx = self.first_update.subscribe();
        let outcome = tokio::time::timeout(timeout, async {
            rx.wait_for(|outcome| *outcome != FirstUpdate::Pending)
                .await
                .map(|outcome| outcome.clone())
        })
        .await;

        match outcome {
            Err(_elapsed) => Err(LockError::Timeout),
            Ok(Err(_closed)) => Err(LockError::Connection("device handle dropped".to_string())),
            Ok(Ok(FirstUpdate::Failed(err))) => Err(err),
            Ok(Ok(_)) => Ok(()),
        }
    }

    /// Whether a notification has been received since the handle was created
    pub fn has_update(&self) -> bool {
        *self.first_update.borrow() == FirstUpdate::Received
    }

    /// Store a new advertisement and pass it to the client
    pub fn update_advertisement(&self, info: &BluetoothServiceInfo) {
        {
            let mut snapshot = self.write();
            snapshot.connection_info.rssi = Some(info.rssi());
            snapshot.advertisement = Some(info.clone());
        }
        self.client.update_advertisement(info);
    }

    /// Forget the advertisement after the lock stopped advertising
    pub fn reset_state(&self) {
        {
            let mut snapshot = self.write();
            snapshot.advertisement = None;
            snapshot.connection_info = ConnectionInfo::default();
        }
        debug!(address = %self.address, "Lock is no longer advertising");
        self.client.reset_advertisement_state();
    }

    /// Register a notification observer
    pub fn register_callback(&self, callback: LockCallback) -> Unsubscribe {
        let token = self.observers.register(callback);
        let observers = self.observers.clone();
        Unsubscribe::new(move || {
            observers.unregister(token);
        })
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub async fn lock(&self) -> Result<(), LockError> {
        debug!(address = %self.address, "Locking");
        self.client.lock().await
    }

    pub async fn unlock(&self) -> Result<(), LockError> {
        debug!(address = %self.address, "Unlocking");
        self.client.unlock().await
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Display name, `"{title} ({local name or address})"`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lock_state(&self) -> LockState {
        self.read().lock_state.clone()
    }

    pub fn lock_info(&self) -> LockInfo {
        self.read().lock_info.clone()
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        self.read().connection_info
    }

    pub fn advertisement(&self) -> Option<BluetoothServiceInfo> {
        self.read().advertisement.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("observers", &self.observers.len())
            .finish()
    }
}
