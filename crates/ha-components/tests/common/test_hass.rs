//! Test Home Assistant instance
//!
//! An isolated host with the Bluetooth manager, state machine and config
//! entry manager wired to the BlueConnect integration over emulated locks.

use ha_bluetooth::BluetoothManager;
use ha_components::blueconnect::emulator::{EmulatedConnector, EmulatedLockHandle};
use ha_components::blueconnect::{
    BlueConnectIntegration, CoordinatorHost, LockInfo, DEVICE_TIMEOUT,
};
use ha_config_entries::{ConfigEntries, ConfigEntry, ConfigEntryState, ReauthFlows};
use ha_core::events::HomeAssistantStopData;
use ha_core::{Context, State};
use ha_event_bus::EventBus;
use ha_state_machine::StateMachine;
use std::sync::Arc;
use std::time::Duration;

/// A test instance of Home Assistant running the lock integration
pub struct TestHomeAssistant {
    pub bus: Arc<EventBus>,
    pub states: Arc<StateMachine>,
    pub bluetooth: Arc<BluetoothManager>,
    pub entries: Arc<ConfigEntries>,
    pub reauth: ReauthFlows,
    /// Backend every lock connection goes through
    pub connector: Arc<EmulatedConnector>,
}

impl TestHomeAssistant {
    pub fn new() -> Self {
        Self::with_first_update_timeout(DEVICE_TIMEOUT)
    }

    pub fn with_first_update_timeout(timeout: Duration) -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        let bluetooth = Arc::new(BluetoothManager::new());
        let reauth = ReauthFlows::new();
        let entries = Arc::new(ConfigEntries::with_reauth_flows(reauth.clone()));
        let connector = Arc::new(EmulatedConnector::new());

        let hass = Self {
            bus,
            states,
            bluetooth,
            entries,
            reauth,
            connector,
        };
        hass.entries.register_integration(Arc::new(
            BlueConnectIntegration::new(hass.host(), hass.connector.clone())
                .with_first_update_timeout(timeout),
        ));
        hass
    }

    /// Host services as the integration sees them
    pub fn host(&self) -> CoordinatorHost {
        CoordinatorHost {
            bus: self.bus.clone(),
            states: self.states.clone(),
            bluetooth: self.bluetooth.clone(),
            reauth: self.reauth.clone(),
        }
    }

    /// Add an emulated lock the integration can connect to
    pub fn add_lock(&self, address: &str, door_sense: bool) -> EmulatedLockHandle {
        self.connector.add_lock(
            address,
            LockInfo {
                manufacturer: "BlueConnect".to_string(),
                model: "BC-100".to_string(),
                serial: "SN123456".to_string(),
                firmware: "2.1.0".to_string(),
                door_sense,
            },
        )
    }

    /// Add a config entry and return its id
    pub fn add_entry(&self, entry: ConfigEntry) -> String {
        self.entries.add(entry).expect("entry added").entry_id
    }

    pub fn entry_state(&self, entry_id: &str) -> Option<ConfigEntryState> {
        self.entries.state(entry_id)
    }

    pub fn fire_stop(&self) {
        self.bus.fire_typed(HomeAssistantStopData {}, Context::new());
    }

    pub fn get_state(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id)
    }

    /// Entity ids with a published state in `domain`, sorted
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        let mut ids = self.states.entity_ids(domain);
        ids.sort();
        ids
    }

    /// Assert that an entity is in a specific state
    pub fn assert_state(&self, entity_id: &str, expected: &str) {
        let state = self.states.get_state(entity_id);
        assert_eq!(
            state.as_deref(),
            Some(expected),
            "Expected entity {} to be in state '{}', but was {:?}",
            entity_id,
            expected,
            state
        );
    }
}

impl Default for TestHomeAssistant {
    fn default() -> Self {
        Self::new()
    }
}

/// Let spawned tasks (update pump, stop listener) run
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
