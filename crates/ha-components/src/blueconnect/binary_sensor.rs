//! Door binary sensor

use ha_core::entity::{BinarySensorDeviceClass, EntityAttributes};
use ha_core::{EntityIdError, STATE_OFF, STATE_ON};
use ha_state_machine::StateMachine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::device::DeviceHandle;
use super::entity::{BlueConnectEntity, EntityAdapter, EntitySpec};
use super::models::{ConnectionInfo, DoorStatus, LockInfo, LockState};

/// `on` while the door is open. Only locks with a door sensor get one.
pub struct DoorSensor {
    entity: BlueConnectEntity,
    is_on: AtomicBool,
}

impl DoorSensor {
    pub fn new(
        states: Arc<StateMachine>,
        device: &DeviceHandle,
        title: &str,
    ) -> Result<Self, EntityIdError> {
        let entity = BlueConnectEntity::new(
            states,
            device,
            title,
            EntitySpec {
                domain: "binary_sensor",
                key: "",
                name: Some("Door"),
                attributes: EntityAttributes {
                    device_class: Some(BinarySensorDeviceClass::Door.as_str()),
                    ..Default::default()
                },
                enabled: true,
            },
        )?;
        Ok(Self {
            entity,
            is_on: AtomicBool::new(false),
        })
    }

    pub fn is_on(&self) -> bool {
        self.is_on.load(Ordering::SeqCst)
    }
}

impl EntityAdapter for DoorSensor {
    fn entity(&self) -> &BlueConnectEntity {
        &self.entity
    }

    fn update_value(&self, state: &LockState, _info: &LockInfo, _connection: &ConnectionInfo) {
        self.is_on
            .store(state.door == DoorStatus::Opened, Ordering::SeqCst);
    }

    fn native_value(&self) -> Option<String> {
        let value = if self.is_on() { STATE_ON } else { STATE_OFF };
        Some(value.to_string())
    }
}
