//! Lock entity

use ha_core::entity::EntityAttributes;
use ha_core::EntityIdError;
use ha_state_machine::StateMachine;
use std::sync::{Arc, Mutex, MutexGuard};

use super::client::LockError;
use super::device::DeviceHandle;
use super::entity::{BlueConnectEntity, EntityAdapter, EntitySpec};
use super::models::{ConnectionInfo, LockInfo, LockState, LockStatus};

pub struct LockEntity {
    entity: BlueConnectEntity,
    device: Arc<DeviceHandle>,
    status: Mutex<LockStatus>,
}

impl LockEntity {
    pub fn new(
        states: Arc<StateMachine>,
        device: Arc<DeviceHandle>,
        title: &str,
    ) -> Result<Self, EntityIdError> {
        let entity = BlueConnectEntity::new(
            states,
            &device,
            title,
            EntitySpec {
                domain: "lock",
                key: "",
                name: None,
                attributes: EntityAttributes::default(),
                enabled: true,
            },
        )?;
        Ok(Self {
            entity,
            device,
            status: Mutex::new(LockStatus::Unknown),
        })
    }

    pub fn status(&self) -> LockStatus {
        *self.status_guard()
    }

    pub async fn lock(&self) -> Result<(), LockError> {
        self.device.lock().await
    }

    pub async fn unlock(&self) -> Result<(), LockError> {
        self.device.unlock().await
    }

    fn status_guard(&self) -> MutexGuard<'_, LockStatus> {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EntityAdapter for LockEntity {
    fn entity(&self) -> &BlueConnectEntity {
        &self.entity
    }

    fn update_value(&self, state: &LockState, _info: &LockInfo, _connection: &ConnectionInfo) {
        *self.status_guard() = state.lock;
    }

    fn native_value(&self) -> Option<String> {
        self.status().as_state().map(str::to_string)
    }
}
