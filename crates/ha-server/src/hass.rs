//! The central Home Assistant instance

use anyhow::Result;
use ha_bluetooth::BluetoothManager;
use ha_components::blueconnect::emulator::EmulatedConnector;
use ha_components::blueconnect::{BlueConnectIntegration, CoordinatorHost};
use ha_config::{BlueConnectDeviceConfig, IntegrationsConfig};
use ha_config_entries::{ConfigEntries, ReauthFlows};
use ha_core::events::HomeAssistantStopData;
use ha_core::{Context, Unsubscribe};
use ha_event_bus::EventBus;
use ha_state_machine::StateMachine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::import::lock_entry;

/// Interval of the Bluetooth unavailable check
const UNAVAILABLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

pub struct HomeAssistant {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// State machine for entity states
    pub states: Arc<StateMachine>,
    pub bluetooth: Arc<BluetoothManager>,
    pub entries: Arc<ConfigEntries>,
    /// Backend every lock connection goes through
    pub connector: Arc<EmulatedConnector>,
    unavailable_tracker: Unsubscribe,
}

impl HomeAssistant {
    /// Wire up the core services and register the lock integration.
    /// Must be called inside a Tokio runtime.
    pub fn new(config: &IntegrationsConfig) -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        let bluetooth = Arc::new(BluetoothManager::with_unavailable_timeout(
            config.bluetooth.unavailable_timeout(),
        ));
        let unavailable_tracker = bluetooth.spawn_unavailable_tracker(UNAVAILABLE_CHECK_INTERVAL);

        let reauth = ReauthFlows::new();
        let entries = Arc::new(ConfigEntries::with_reauth_flows(reauth.clone()));
        let connector = Arc::new(EmulatedConnector::new());

        let host = CoordinatorHost {
            bus: bus.clone(),
            states: states.clone(),
            bluetooth: bluetooth.clone(),
            reauth,
        };
        entries.register_integration(Arc::new(BlueConnectIntegration::new(
            host,
            connector.clone(),
        )));

        Self {
            bus,
            states,
            bluetooth,
            entries,
            connector,
            unavailable_tracker,
        }
    }

    /// Add one config entry per configured lock, skipping locks already
    /// imported. Returns the ids of the added entries.
    pub fn import_locks(&self, locks: &[BlueConnectDeviceConfig]) -> Result<Vec<String>> {
        let mut added = Vec::with_capacity(locks.len());
        for lock in locks {
            let entry = lock_entry(lock);
            if let Some(unique_id) = entry.unique_id.as_deref() {
                if self.entries.get_by_unique_id(&entry.domain, unique_id).is_some() {
                    debug!(address = %lock.address, "Lock already imported");
                    continue;
                }
            }
            added.push(self.entries.add(entry)?.entry_id);
        }
        Ok(added)
    }

    /// Fire the stop event and unload every entry
    pub async fn stop(&self) {
        self.bus.fire_typed(HomeAssistantStopData {}, Context::new());
        self.entries.shutdown_all().await;
        self.unavailable_tracker.call();
        info!("Home Assistant stopped");
    }
}
