//! Per-entry lifecycle of one lock

use async_trait::async_trait;
use ha_bluetooth::{BluetoothManager, BluetoothScanningMode};
use ha_config_entries::{ConfigEntry, EntryRuntime, ReauthFlows, SetupError};
use ha_core::events::HOMEASSISTANT_STOP;
use ha_core::{EntityId, EntityIdError, OnUnload};
use ha_event_bus::EventBus;
use ha_state_machine::StateMachine;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::binary_sensor::DoorSensor;
use super::client::{LockError, LockParams, PushLockConnector};
use super::device::DeviceHandle;
use super::entity::{attach, EntityAdapter};
use super::lock::LockEntity;
use super::models::LockState;
use super::router::AdvertisementRouter;
use super::sensor::{SensorEntity, SENSORS};
use super::CONF_ALWAYS_CONNECTED;

/// Host services a coordinator registers with
#[derive(Clone)]
pub struct CoordinatorHost {
    pub bus: Arc<EventBus>,
    pub states: Arc<StateMachine>,
    pub bluetooth: Arc<BluetoothManager>,
    pub reauth: ReauthFlows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Created,
    Connecting,
    AwaitingFirstUpdate,
    Ready,
    /// The lock rejected our key after setup
    ReauthRequired,
    Unloading,
    Closed,
}

const SETUP_CANCELLED: &str = "setup cancelled";

/// Owns the device handle and every registration made for one entry.
///
/// Everything registered during setup goes into one [`OnUnload`] arena,
/// drained exactly once by whichever of unload, the stop event or a failed
/// setup gets there first.
pub struct LifecycleCoordinator {
    this: Weak<Self>,
    entry: ConfigEntry,
    params: LockParams,
    host: CoordinatorHost,
    connector: Arc<dyn PushLockConnector>,
    first_update_timeout: Duration,
    phase: Mutex<LifecyclePhase>,
    shutdown: watch::Sender<bool>,
    /// Held for a whole teardown
    teardown: Mutex<()>,
    on_unload: OnUnload,
    device: Mutex<Option<Arc<DeviceHandle>>>,
    lock_entity: Mutex<Option<Arc<LockEntity>>>,
    adapters: Mutex<Vec<Arc<dyn EntityAdapter>>>,
}

impl LifecycleCoordinator {
    pub fn new(
        entry: &ConfigEntry,
        params: LockParams,
        host: CoordinatorHost,
        connector: Arc<dyn PushLockConnector>,
        first_update_timeout: Duration,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            entry: entry.clone(),
            params,
            host,
            connector,
            first_update_timeout,
            phase: Mutex::new(LifecyclePhase::Created),
            shutdown,
            teardown: Mutex::new(()),
            on_unload: OnUnload::new(),
            device: Mutex::new(None),
            lock_entity: Mutex::new(None),
            adapters: Mutex::new(Vec::new()),
        })
    }

    pub fn phase(&self) -> LifecyclePhase {
        *guard(&self.phase)
    }

    pub fn title(&self) -> &str {
        &self.entry.title
    }

    pub fn params(&self) -> &LockParams {
        &self.params
    }

    pub fn device(&self) -> Option<Arc<DeviceHandle>> {
        guard(&self.device).clone()
    }

    pub fn lock_entity(&self) -> Option<Arc<LockEntity>> {
        guard(&self.lock_entity).clone()
    }

    /// Entity ids of every adapter created at setup, enabled or not
    pub fn entity_ids(&self) -> Vec<EntityId> {
        guard(&self.adapters)
            .iter()
            .map(|adapter| adapter.entity().entity_id().clone())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.phase() == LifecyclePhase::Closed
    }

    #[instrument(skip(self), fields(entry_id = %self.entry.entry_id, address = %self.params.address))]
    async fn run_setup(&self) -> Result<(), SetupError> {
        if self.phase() != LifecyclePhase::Created {
            return Err(SetupError::Failed("coordinator already used".to_string()));
        }

        if let Err(err) = self
            .connector
            .close_stale_connections_by_address(&self.params.address)
            .await
        {
            warn!(error = %err, "Failed to close stale connections");
        }
        if !self.advance(LifecyclePhase::Created, LifecyclePhase::Connecting) {
            return Err(SetupError::Failed(SETUP_CANCELLED.to_string()));
        }

        let client = self.connector.connect(&self.params);
        let device = Arc::new(DeviceHandle::new(client, &self.params, &self.entry.title));
        *guard(&self.device) = Some(device.clone());

        let bluetooth = &self.host.bluetooth;
        let router = Arc::new(AdvertisementRouter::new(device.clone()));
        self.on_unload.push(bluetooth.register_callback(
            router.advertisement_callback(),
            router.matcher(),
            BluetoothScanningMode::Passive,
        ));
        self.on_unload.push(
            bluetooth.track_unavailable(router.unavailable_callback(), device.address()),
        );

        match device.start().await {
            Ok(stop) => self.on_unload.push(stop),
            Err(err) => return Err(self.fail(err)),
        }
        router.replay_existing(bluetooth);

        if !self.advance(LifecyclePhase::Connecting, LifecyclePhase::AwaitingFirstUpdate) {
            return Err(SetupError::Failed(SETUP_CANCELLED.to_string()));
        }
        debug!(timeout = ?self.first_update_timeout, "Waiting for first lock update");

        let outcome = tokio::select! {
            result = device.wait_for_first_update(self.first_update_timeout) => Some(result),
            _ = cancelled(self.shutdown.subscribe()) => None,
        };
        match outcome {
            None => return Err(SetupError::Failed(SETUP_CANCELLED.to_string())),
            Some(Err(err)) => return Err(self.fail(err)),
            Some(Ok(())) => {}
        }

        let this = self.this.clone();
        self.on_unload
            .push(device.register_callback(Arc::new(move |state, _, _| {
                if let Some(coordinator) = this.upgrade() {
                    coordinator.handle_auth(state);
                }
            })));

        if let Err(err) = self.add_entities(&device) {
            warn!(error = %err, "Failed to create entities");
            self.shutdown();
            return Err(SetupError::Failed(err.to_string()));
        }

        let this = self.this.clone();
        self.on_unload
            .push(self.host.bus.listen_once(HOMEASSISTANT_STOP, move |_event| {
                if let Some(coordinator) = this.upgrade() {
                    debug!(entry_id = %coordinator.entry.entry_id, "Stopping lock on shutdown");
                    coordinator.shutdown();
                }
            }));

        if !self.advance(LifecyclePhase::AwaitingFirstUpdate, LifecyclePhase::Ready) {
            return Err(SetupError::Failed(SETUP_CANCELLED.to_string()));
        }
        info!(name = %device.name(), "Lock ready");
        Ok(())
    }

    fn add_entities(&self, device: &Arc<DeviceHandle>) -> Result<(), EntityIdError> {
        let states = &self.host.states;
        let title = self.entry.title.as_str();

        let lock = Arc::new(LockEntity::new(states.clone(), device.clone(), title)?);
        *guard(&self.lock_entity) = Some(lock.clone());

        let mut adapters: Vec<Arc<dyn EntityAdapter>> = Vec::new();
        adapters.push(lock);
        if device.lock_info().door_sense {
            adapters.push(Arc::new(DoorSensor::new(states.clone(), device, title)?));
        }
        for description in SENSORS {
            adapters.push(Arc::new(SensorEntity::new(
                states.clone(),
                device,
                title,
                description,
            )?));
        }

        let mut attached = 0;
        for adapter in &adapters {
            if attach(adapter.clone(), device, &self.host.bluetooth, &self.on_unload) {
                attached += 1;
            }
        }
        debug!(entities = adapters.len(), attached, "Added lock entities");
        *guard(&self.adapters) = adapters;
        Ok(())
    }

    /// Raise or clear the reauth requirement from a notification
    fn handle_auth(&self, state: &LockState) {
        if state.auth_failed() {
            warn!(entry_id = %self.entry.entry_id, "Lock rejected the key, requesting reauthentication");
            self.host.reauth.start(&self.entry);
            self.advance(LifecyclePhase::Ready, LifecyclePhase::ReauthRequired);
        } else if state.auth.is_some()
            && self.advance(LifecyclePhase::ReauthRequired, LifecyclePhase::Ready)
        {
            info!(entry_id = %self.entry.entry_id, "Lock accepted the key again");
        }
    }

    /// Tear down after a failed setup and map the error for the host
    fn fail(&self, err: LockError) -> SetupError {
        self.shutdown();
        match err {
            LockError::Auth(reason) => SetupError::AuthFailed(reason),
            LockError::Timeout => SetupError::NotReady(format!(
                "{} did not report its state within {:?}",
                self.params.address, self.first_update_timeout
            )),
            LockError::Connection(reason) | LockError::Protocol(reason) => {
                SetupError::NotReady(reason)
            }
        }
    }

    /// Release everything registered for this entry.
    ///
    /// Returns `false` if another caller already shut the coordinator down.
    /// A concurrent caller returns only once that release has finished.
    pub fn shutdown(&self) -> bool {
        let _teardown = guard(&self.teardown);
        {
            let mut phase = guard(&self.phase);
            if matches!(*phase, LifecyclePhase::Unloading | LifecyclePhase::Closed) {
                return false;
            }
            *phase = LifecyclePhase::Unloading;
        }

        self.shutdown.send_replace(true);
        let released = self.on_unload.run();
        guard(&self.adapters).clear();
        *guard(&self.phase) = LifecyclePhase::Closed;
        debug!(entry_id = %self.entry.entry_id, released, "Lock coordinator closed");
        true
    }

    /// Move from `from` to `to`; `false` if the phase was something else
    fn advance(&self, from: LifecyclePhase, to: LifecyclePhase) -> bool {
        let mut phase = guard(&self.phase);
        if *phase != from {
            return false;
        }
        *phase = to;
        true
    }
}

#[async_trait]
impl EntryRuntime for LifecycleCoordinator {
    async fn setup(&self) -> Result<(), SetupError> {
        self.run_setup().await
    }

    async fn unload(&self) -> bool {
        self.shutdown();
        true
    }

    fn reload_required(&self, entry: &ConfigEntry) -> bool {
        entry.title != self.entry.title
            || entry.option_bool(CONF_ALWAYS_CONNECTED, false) != self.params.always_connected
    }
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("entry_id", &self.entry.entry_id)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Resolves once shutdown has been signalled
async fn cancelled(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueconnect::emulator::EmulatedConnector;
    use crate::blueconnect::models::{DoorStatus, LockInfo, LockStatus};
    use crate::blueconnect::DOMAIN;

    const ADDRESS: &str = "AA:BB:CC:DD:EE:01";

    fn host() -> CoordinatorHost {
        let bus = Arc::new(EventBus::new());
        CoordinatorHost {
            states: Arc::new(StateMachine::new(bus.clone())),
            bus,
            bluetooth: Arc::new(BluetoothManager::new()),
            reauth: ReauthFlows::new(),
        }
    }

    fn params() -> LockParams {
        LockParams {
            local_name: "BC-4F21A9".to_string(),
            address: ADDRESS.to_string(),
            key: "0123456789abcdef".to_string(),
            slot: 1,
            always_connected: false,
            name: "Front Door".to_string(),
        }
    }

    fn coordinator(
        host: &CoordinatorHost,
        connector: &Arc<EmulatedConnector>,
    ) -> Arc<LifecycleCoordinator> {
        let entry = ConfigEntry::new(DOMAIN, "Front Door");
        LifecycleCoordinator::new(
            &entry,
            params(),
            host.clone(),
            connector.clone(),
            Duration::from_secs(55),
        )
    }

    #[tokio::test]
    async fn test_setup_reaches_ready() {
        let host = host();
        let connector = Arc::new(EmulatedConnector::new());
        connector.add_lock(
            ADDRESS,
            LockInfo {
                door_sense: true,
                ..Default::default()
            },
        );
        let coordinator = coordinator(&host, &connector);

        coordinator.setup().await.unwrap();
        assert_eq!(coordinator.phase(), LifecyclePhase::Ready);
        assert_eq!(connector.stale_close_count(), 1);
        assert_eq!(host.bluetooth.callback_count(), 1);
        // Router tracker plus one per enabled entity: lock, door, battery
        assert_eq!(host.bluetooth.tracker_count(), 4);
        assert_eq!(coordinator.entity_ids().len(), 5);
        assert!(host.states.is_state("lock.front_door", "locked"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_not_ready() {
        let host = host();
        let connector = Arc::new(EmulatedConnector::new());
        connector
            .add_lock(ADDRESS, LockInfo::default())
            .set_silent(true);
        let coordinator = coordinator(&host, &connector);

        let err = coordinator.setup().await.unwrap_err();
        assert!(matches!(err, SetupError::NotReady(_)));
        assert!(err.is_retryable());
        assert!(!err.is_auth());
        assert!(coordinator.is_closed());
        assert_eq!(host.bluetooth.callback_count(), 0);
        assert_eq!(host.bluetooth.tracker_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_during_wait() {
        let host = host();
        let connector = Arc::new(EmulatedConnector::new());
        connector
            .add_lock(ADDRESS, LockInfo::default())
            .set_accepted_key(Some("another key"));
        let coordinator = coordinator(&host, &connector);

        let err = coordinator.setup().await.unwrap_err();
        assert!(matches!(err, SetupError::AuthFailed(_)));
        assert!(err.is_auth());
        assert_eq!(connector.handle(ADDRESS).unwrap().stop_count(), 1);
    }

    #[tokio::test]
    async fn test_reauth_required_and_recovered() {
        let host = host();
        let connector = Arc::new(EmulatedConnector::new());
        let lock = connector.add_lock(ADDRESS, LockInfo::default());
        let coordinator = coordinator(&host, &connector);
        coordinator.setup().await.unwrap();

        let device = coordinator.device().unwrap();
        let rejected = LockState::new(LockStatus::Locked, DoorStatus::Closed).with_auth(false);
        device.handle_event(crate::blueconnect::LockEvent::State {
            state: rejected.clone(),
            info: LockInfo::default(),
            connection: Default::default(),
        });
        assert_eq!(coordinator.phase(), LifecyclePhase::ReauthRequired);
        assert_eq!(host.reauth.requests(&coordinator.entry.entry_id), 1);

        device.handle_event(crate::blueconnect::LockEvent::State {
            state: rejected.with_auth(true),
            info: LockInfo::default(),
            connection: Default::default(),
        });
        assert_eq!(coordinator.phase(), LifecyclePhase::Ready);
        assert_eq!(host.reauth.requests(&coordinator.entry.entry_id), 1);
        assert!(lock.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_twice_releases_once() {
        let host = host();
        let connector = Arc::new(EmulatedConnector::new());
        let lock = connector.add_lock(ADDRESS, LockInfo::default());
        let coordinator = coordinator(&host, &connector);
        coordinator.setup().await.unwrap();
        assert!(host.states.entity_count() > 0);

        assert!(coordinator.shutdown());
        assert!(!coordinator.shutdown());
        assert!(coordinator.unload().await);
        assert_eq!(lock.stop_count(), 1);
        assert_eq!(host.bluetooth.callback_count(), 0);
        assert_eq!(host.bluetooth.tracker_count(), 0);
        assert_eq!(host.states.entity_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_shutdown_releases_once() {
        let host = host();
        let connector = Arc::new(EmulatedConnector::new());
        let lock = connector.add_lock(ADDRESS, LockInfo::default());
        let coordinator = coordinator(&host, &connector);
        coordinator.setup().await.unwrap();

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let callers: Vec<_> = (0..2)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = barrier.clone();
                tokio::task::spawn_blocking(move || {
                    barrier.wait();
                    let released = coordinator.shutdown();
                    // Whichever caller lost the race still sees the release done
                    (released, coordinator.is_closed())
                })
            })
            .collect();

        let mut outcomes = Vec::new();
        for caller in callers {
            outcomes.push(caller.await.unwrap());
        }
        assert_eq!(outcomes.iter().filter(|(released, _)| *released).count(), 1);
        assert!(outcomes.iter().all(|(_, closed)| *closed));
        assert_eq!(lock.stop_count(), 1);
        assert_eq!(host.bluetooth.callback_count(), 0);
        assert_eq!(host.bluetooth.tracker_count(), 0);
        assert_eq!(host.states.entity_count(), 0);
    }

    #[test]
    fn test_reload_required_on_title_or_flag() {
        let host = host();
        let connector = Arc::new(EmulatedConnector::new());
        let coordinator = coordinator(&host, &connector);

        let same = ConfigEntry::new(DOMAIN, "Front Door");
        assert!(!coordinator.reload_required(&same));

        let renamed = ConfigEntry::new(DOMAIN, "Garage");
        assert!(coordinator.reload_required(&renamed));

        let mut options = std::collections::HashMap::new();
        options.insert(CONF_ALWAYS_CONNECTED.to_string(), serde_json::json!(true));
        let flagged = ConfigEntry::new(DOMAIN, "Front Door").with_options(options);
        assert!(coordinator.reload_required(&flagged));
    }
}
