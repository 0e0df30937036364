//! In-memory push lock
//!
//! [`EmulatedConnector`] hands out clients backed by an
//! [`EmulatedLockHandle`]. Tests and the demo server keep the handle to move
//! the bolt, open the door, drain the battery, reject the key or go silent,
//! and to count what the integration asked of the client.

use async_trait::async_trait;
use dashmap::DashMap;
use ha_bluetooth::{normalize_address, BluetoothServiceInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

use super::client::{LockError, LockEvent, LockParams, PushLockClient, PushLockConnector};
use super::models::{
    AuthState, BatteryState, ConnectionInfo, DoorStatus, LockInfo, LockState, LockStatus,
};

/// Command sent to an emulated lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCommand {
    Lock,
    Unlock,
}

#[derive(Default)]
struct Emulated {
    events: Option<mpsc::UnboundedSender<LockEvent>>,
    state: LockState,
    info: LockInfo,
    rssi: Option<i16>,
    /// Key the lock accepts; `None` accepts any key
    accepted_key: Option<String>,
    /// Key the current client presented
    presented_key: Option<String>,
    /// Do not answer `start` with a notification
    silent: bool,
    start_error: Option<LockError>,
    commands: Vec<LockCommand>,
}

impl Emulated {
    fn key_rejected(&self) -> bool {
        match (&self.accepted_key, &self.presented_key) {
            (Some(accepted), Some(presented)) => accepted != presented,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Build the current notification, if a client is listening
    fn event(&self) -> Option<(mpsc::UnboundedSender<LockEvent>, LockEvent)> {
        let events = self.events.clone()?;
        let mut state = self.state.clone();
        if self.key_rejected() {
            state.auth = Some(AuthState { successful: false });
        }
        Some((
            events,
            LockEvent::State {
                state,
                info: self.info.clone(),
                connection: ConnectionInfo { rssi: self.rssi },
            },
        ))
    }
}

#[derive(Default)]
struct Counters {
    starts: AtomicUsize,
    stops: AtomicUsize,
    advertisements: AtomicUsize,
    resets: AtomicUsize,
}

/// Script and inspect one emulated lock
#[derive(Clone)]
pub struct EmulatedLockHandle {
    address: String,
    inner: Arc<Mutex<Emulated>>,
    counters: Arc<Counters>,
}

impl EmulatedLockHandle {
    fn new(address: &str, info: LockInfo) -> Self {
        Self {
            address: normalize_address(address),
            inner: Arc::new(Mutex::new(Emulated {
                state: LockState::new(LockStatus::Locked, DoorStatus::Closed).with_battery(6.0, 100),
                info,
                ..Default::default()
            })),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Replace the lock state and notify the client. Returns `false` if no
    /// client is listening.
    pub fn push_state(&self, state: LockState) -> bool {
        self.update(|lock| lock.state = state)
    }

    /// Report an error on the event channel
    pub fn push_error(&self, err: LockError) -> bool {
        let events = self.guard().events.clone();
        match events {
            Some(events) => events.send(LockEvent::Error(err)).is_ok(),
            None => false,
        }
    }

    pub fn set_lock(&self, status: LockStatus) -> bool {
        self.update(|lock| lock.state.lock = status)
    }

    pub fn set_door(&self, door: DoorStatus) -> bool {
        self.update(|lock| lock.state.door = door)
    }

    pub fn set_battery(&self, voltage: f64, percentage: u8) -> bool {
        self.update(|lock| {
            lock.state.battery = Some(BatteryState {
                voltage,
                percentage,
            })
        })
    }

    pub fn set_rssi(&self, rssi: Option<i16>) -> bool {
        self.update(|lock| lock.rssi = rssi)
    }

    /// Only accept `key` from now on; the next notification reports the result
    pub fn set_accepted_key(&self, key: Option<&str>) -> bool {
        self.update(|lock| lock.accepted_key = key.map(str::to_string))
    }

    /// Stop answering `start` with a notification
    pub fn set_silent(&self, silent: bool) {
        self.guard().silent = silent;
    }

    /// Fail the next `start` calls with `err`
    pub fn set_start_error(&self, err: Option<LockError>) {
        self.guard().start_error = err;
    }

    pub fn set_info(&self, info: LockInfo) {
        self.guard().info = info;
    }

    pub fn commands(&self) -> Vec<LockCommand> {
        self.guard().commands.clone()
    }

    /// A client is started and not stopped
    pub fn is_running(&self) -> bool {
        self.guard().events.is_some()
    }

    pub fn start_count(&self) -> usize {
        self.counters.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    pub fn advertisement_count(&self) -> usize {
        self.counters.advertisements.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.counters.resets.load(Ordering::SeqCst)
    }

    fn update(&self, apply: impl FnOnce(&mut Emulated)) -> bool {
        let event = {
            let mut lock = self.guard();
            apply(&mut *lock);
            lock.event()
        };
        match event {
            Some((events, event)) => events.send(event).is_ok(),
            None => false,
        }
    }

    fn guard(&self) -> MutexGuard<'_, Emulated> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Client side of an emulated lock
pub struct EmulatedLock {
    params: LockParams,
    handle: EmulatedLockHandle,
}

impl EmulatedLock {
    async fn command(
        &self,
        command: LockCommand,
        moving: LockStatus,
        done: LockStatus,
    ) -> Result<(), LockError> {
        if !self.handle.is_running() {
            return Err(LockError::Connection("not connected".to_string()));
        }
        if self.handle.guard().key_rejected() {
            return Err(LockError::Auth("key rejected by lock".to_string()));
        }
        self.handle.guard().commands.push(command);
        self.handle.set_lock(moving);
        tokio::task::yield_now().await;
        self.handle.set_lock(done);
        Ok(())
    }
}

#[async_trait]
impl PushLockClient for EmulatedLock {
    fn address(&self) -> &str {
        &self.params.address
    }

    async fn start(&self, events: mpsc::UnboundedSender<LockEvent>) -> Result<(), LockError> {
        self.handle.counters.starts.fetch_add(1, Ordering::SeqCst);
        let event = {
            let mut lock = self.handle.guard();
            if let Some(err) = lock.start_error.clone() {
                return Err(err);
            }
            lock.presented_key = Some(self.params.key.clone());
            lock.events = Some(events);
            if lock.silent {
                None
            } else {
                lock.event()
            }
        };
        debug!(address = %self.params.address, name = %self.params.name, "Emulated lock started");
        if let Some((events, event)) = event {
            let _ = events.send(event);
        }
        Ok(())
    }

    fn stop(&self) {
        self.handle.counters.stops.fetch_add(1, Ordering::SeqCst);
        self.handle.guard().events = None;
    }

    fn update_advertisement(&self, info: &BluetoothServiceInfo) {
        self.handle
            .counters
            .advertisements
            .fetch_add(1, Ordering::SeqCst);
        self.handle.guard().rssi = Some(info.rssi());
    }

    fn reset_advertisement_state(&self) {
        self.handle.counters.resets.fetch_add(1, Ordering::SeqCst);
        self.handle.guard().rssi = None;
    }

    async fn lock(&self) -> Result<(), LockError> {
        self.command(LockCommand::Lock, LockStatus::Locking, LockStatus::Locked)
            .await
    }

    async fn unlock(&self) -> Result<(), LockError> {
        self.command(LockCommand::Unlock, LockStatus::Unlocking, LockStatus::Unlocked)
            .await
    }
}

/// Connector over a set of emulated locks
#[derive(Default)]
pub struct EmulatedConnector {
    locks: DashMap<String, EmulatedLockHandle>,
    connects: AtomicUsize,
    stale_closes: AtomicUsize,
}

impl EmulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lock, or return the handle of the one already at `address`
    pub fn add_lock(&self, address: &str, info: LockInfo) -> EmulatedLockHandle {
        let address = normalize_address(address);
        self.locks
            .entry(address.clone())
            .or_insert_with(|| EmulatedLockHandle::new(&address, info))
            .clone()
    }

    pub fn handle(&self, address: &str) -> Option<EmulatedLockHandle> {
        self.locks
            .get(&normalize_address(address))
            .map(|h| h.clone())
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn stale_close_count(&self) -> usize {
        self.stale_closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushLockConnector for EmulatedConnector {
    fn connect(&self, params: &LockParams) -> Arc<dyn PushLockClient> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let handle = self.add_lock(&params.address, LockInfo::default());
        Arc::new(EmulatedLock {
            params: params.clone(),
            handle,
        })
    }

    async fn close_stale_connections_by_address(&self, address: &str) -> Result<(), LockError> {
        self.stale_closes.fetch_add(1, Ordering::SeqCst);
        debug!(%address, "Closing stale emulated connections");
        Ok(())
    }
}
