//! Diagnostic sensors

use ha_core::entity::{units, EntityAttributes, EntityCategory, SensorDeviceClass, SensorStateClass};
use ha_core::EntityIdError;
use ha_state_machine::StateMachine;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::device::DeviceHandle;
use super::entity::{BlueConnectEntity, EntityAdapter, EntitySpec};
use super::models::{ConnectionInfo, LockInfo, LockState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One row of the sensor table
pub struct SensorDescription {
    /// Unique id suffix
    pub key: &'static str,
    pub name: &'static str,
    pub device_class: SensorDeviceClass,
    pub unit: &'static str,
    pub entity_category: EntityCategory,
    pub state_class: SensorStateClass,
    pub enabled_by_default: bool,
    pub value_fn: fn(&LockState, &LockInfo, &ConnectionInfo) -> Option<SensorValue>,
}

impl fmt::Debug for SensorDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorDescription")
            .field("key", &self.key)
            .field("device_class", &self.device_class)
            .field("enabled_by_default", &self.enabled_by_default)
            .finish_non_exhaustive()
    }
}

pub static SENSORS: &[SensorDescription] = &[
    SensorDescription {
        // Empty key keeps the unique id of the first RSSI sensor
        key: "",
        name: "Signal strength",
        device_class: SensorDeviceClass::SignalStrength,
        unit: units::SIGNAL_STRENGTH_DECIBELS_MILLIWATT,
        entity_category: EntityCategory::Diagnostic,
        state_class: SensorStateClass::Measurement,
        enabled_by_default: false,
        value_fn: |_, _, connection| connection.rssi.map(|rssi| SensorValue::Int(rssi.into())),
    },
    SensorDescription {
        key: "battery_level",
        name: "Battery",
        device_class: SensorDeviceClass::Battery,
        unit: units::PERCENTAGE,
        entity_category: EntityCategory::Diagnostic,
        state_class: SensorStateClass::Measurement,
        enabled_by_default: true,
        value_fn: |state, _, _| {
            state
                .battery
                .map(|battery| SensorValue::Int(battery.percentage.into()))
        },
    },
    SensorDescription {
        key: "battery_voltage",
        name: "Battery voltage",
        device_class: SensorDeviceClass::Voltage,
        unit: units::ELECTRIC_POTENTIAL_VOLT,
        entity_category: EntityCategory::Diagnostic,
        state_class: SensorStateClass::Measurement,
        enabled_by_default: false,
        value_fn: |state, _, _| state.battery.map(|battery| SensorValue::Float(battery.voltage)),
    },
];

pub struct SensorEntity {
    entity: BlueConnectEntity,
    description: &'static SensorDescription,
    value: Mutex<Option<SensorValue>>,
}

impl SensorEntity {
    pub fn new(
        states: Arc<StateMachine>,
        device: &DeviceHandle,
        title: &str,
        description: &'static SensorDescription,
    ) -> Result<Self, EntityIdError> {
        let entity = BlueConnectEntity::new(
            states,
            device,
            title,
            EntitySpec {
                domain: "sensor",
                key: description.key,
                name: Some(description.name),
                attributes: EntityAttributes {
                    device_class: Some(description.device_class.as_str()),
                    unit_of_measurement: Some(description.unit),
                    state_class: Some(description.state_class.as_str()),
                    entity_category: Some(description.entity_category.as_str()),
                    ..Default::default()
                },
                enabled: description.enabled_by_default,
            },
        )?;
        Ok(Self {
            entity,
            description,
            value: Mutex::new(None),
        })
    }

    pub fn value(&self) -> Option<SensorValue> {
        *self.value_guard()
    }

    fn value_guard(&self) -> MutexGuard<'_, Option<SensorValue>> {
        self.value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EntityAdapter for SensorEntity {
    fn entity(&self) -> &BlueConnectEntity {
        &self.entity
    }

    fn update_value(&self, state: &LockState, info: &LockInfo, connection: &ConnectionInfo) {
        *self.value_guard() = (self.description.value_fn)(state, info, connection);
    }

    fn native_value(&self) -> Option<String> {
        self.value().map(|value| value.to_string())
    }
}
