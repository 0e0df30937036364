//! Base for the lock's entities

use ha_bluetooth::BluetoothManager;
use ha_core::entity::{DeviceInfo, EntityAttributes};
use ha_core::{Context, EntityId, EntityIdError, OnUnload, Unsubscribe, STATE_UNAVAILABLE, STATE_UNKNOWN};
use ha_state_machine::StateMachine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::device::DeviceHandle;
use super::models::{ConnectionInfo, LockInfo, LockState};
use super::DOMAIN;

/// Static description of an entity before it is registered
pub(crate) struct EntitySpec<'a> {
    /// Entity domain, e.g. `sensor`
    pub domain: &'a str,
    /// Suffix of the unique id, empty for the primary entity of a domain
    pub key: &'a str,
    /// Appended to the entry title; `None` names the entity after the device
    pub name: Option<&'a str>,
    pub attributes: EntityAttributes,
    pub enabled: bool,
}

/// Identity and published state of one entity
pub struct BlueConnectEntity {
    entity_id: EntityId,
    unique_id: String,
    attributes: HashMap<String, serde_json::Value>,
    available: AtomicBool,
    enabled: bool,
    states: Arc<StateMachine>,
}

impl BlueConnectEntity {
    pub(crate) fn new(
        states: Arc<StateMachine>,
        device: &DeviceHandle,
        title: &str,
        spec: EntitySpec<'_>,
    ) -> Result<Self, EntityIdError> {
        let unique_id = format!("{}{}", device.address(), spec.key);
        let friendly_name = match spec.name {
            Some(name) => format!("{title} {name}"),
            None => title.to_string(),
        };
        let entity_id = states.register_entity(DOMAIN, spec.domain, &unique_id, &friendly_name)?;

        let mut attributes = EntityAttributes {
            friendly_name: Some(friendly_name),
            ..spec.attributes
        }
        .to_map();
        attributes.insert("device".to_string(), device_info(device, title));

        Ok(Self {
            entity_id,
            unique_id,
            attributes,
            available: AtomicBool::new(false),
            enabled: spec.enabled,
            states,
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Disabled entities keep their id but never publish a state
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Publish `value`, or `unavailable`/`unknown` when there is none to show
    pub fn write_state(&self, value: Option<String>) {
        if !self.enabled {
            return;
        }
        let state = match (self.available(), value) {
            (false, _) => STATE_UNAVAILABLE.to_string(),
            (true, Some(value)) => value,
            (true, None) => STATE_UNKNOWN.to_string(),
        };
        self.states.set(
            self.entity_id.clone(),
            state,
            self.attributes.clone(),
            Context::new(),
        );
    }

    /// Drop the published state; the entity id stays registered
    pub fn remove(&self) {
        self.states.remove(&self.entity_id, Context::new());
    }
}

impl std::fmt::Debug for BlueConnectEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueConnectEntity")
            .field("entity_id", &self.entity_id)
            .field("unique_id", &self.unique_id)
            .field("available", &self.available())
            .finish()
    }
}

fn device_info(device: &DeviceHandle, title: &str) -> serde_json::Value {
    let info = device.lock_info();
    let non_empty = |s: String| Some(s).filter(|s| !s.is_empty());
    let device_info = DeviceInfo {
        name: title.to_string(),
        manufacturer: non_empty(info.manufacturer),
        model: non_empty(info.model),
        serial_number: non_empty(info.serial),
        sw_version: non_empty(info.firmware),
        connections: vec![("bluetooth".to_string(), device.address().to_string())],
    };
    serde_json::to_value(device_info).unwrap_or_default()
}

/// Projects lock notifications onto one entity
pub trait EntityAdapter: Send + Sync {
    fn entity(&self) -> &BlueConnectEntity;

    /// Take this entity's value out of a notification
    fn update_value(&self, state: &LockState, info: &LockInfo, connection: &ConnectionInfo);

    /// Current value, `None` when unknown
    fn native_value(&self) -> Option<String>;

    fn handle_update(&self, state: &LockState, info: &LockInfo, connection: &ConnectionInfo) {
        self.update_value(state, info, connection);
        self.entity().set_available(true);
        self.entity().write_state(self.native_value());
    }

    fn handle_unavailable(&self) {
        self.entity().set_available(false);
        self.entity().write_state(self.native_value());
    }
}

/// Connect an adapter to its device.
///
/// Publishes the current state right away and collects the observer, the
/// availability tracker and the state removal in `on_unload`. Disabled
/// adapters are left detached.
pub(crate) fn attach(
    adapter: Arc<dyn EntityAdapter>,
    device: &DeviceHandle,
    bluetooth: &BluetoothManager,
    on_unload: &OnUnload,
) -> bool {
    let entity = adapter.entity();
    if !entity.enabled() {
        debug!(entity_id = %entity.entity_id(), "Entity is disabled by default");
        return false;
    }

    if device.has_update() {
        adapter.handle_update(
            &device.lock_state(),
            &device.lock_info(),
            &device.connection_info(),
        );
    } else {
        adapter.handle_unavailable();
    }

    let observer = adapter.clone();
    on_unload.push(device.register_callback(Arc::new(move |state, info, connection| {
        observer.handle_update(state, info, connection)
    })));

    let tracker = adapter.clone();
    on_unload.push(bluetooth.track_unavailable(
        Arc::new(move |_info| tracker.handle_unavailable()),
        device.address(),
    ));

    on_unload.push(Unsubscribe::new(move || adapter.entity().remove()));
    true
}
