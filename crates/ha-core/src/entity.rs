//! Static entity metadata
//!
//! Device classes, categories and units an entity declares once. The host
//! renders them as state attributes; integrations never change them after
//! the entity is created.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Unit constants
pub mod units {
    pub const PERCENTAGE: &str = "%";
    pub const SIGNAL_STRENGTH_DECIBELS_MILLIWATT: &str = "dBm";
    pub const ELECTRIC_POTENTIAL_VOLT: &str = "V";
}

/// Sensor device classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorDeviceClass {
    Battery,
    SignalStrength,
    Voltage,
}

/// Binary sensor device classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinarySensorDeviceClass {
    Door,
}

/// Sensor state classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStateClass {
    Measurement,
}

/// Entity category for non-primary entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

impl SensorDeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::SignalStrength => "signal_strength",
            Self::Voltage => "voltage",
        }
    }
}

impl BinarySensorDeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Door => "door",
        }
    }
}

impl SensorStateClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
        }
    }
}

impl EntityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Diagnostic => "diagnostic",
        }
    }
}

/// Device a set of entities belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    /// (connection type, identifier) pairs, e.g. ("bluetooth", address)
    #[serde(default)]
    pub connections: Vec<(String, String)>,
}

/// Attributes every entity carries regardless of its current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityAttributes {
    pub friendly_name: Option<String>,
    pub device_class: Option<&'static str>,
    pub unit_of_measurement: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub entity_category: Option<&'static str>,
}

impl EntityAttributes {
    /// Render as the attribute map written next to the state value
    pub fn to_map(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        if let Some(name) = &self.friendly_name {
            map.insert("friendly_name".to_string(), json!(name));
        }
        if let Some(class) = self.device_class {
            map.insert("device_class".to_string(), json!(class));
        }
        if let Some(unit) = self.unit_of_measurement {
            map.insert("unit_of_measurement".to_string(), json!(unit));
        }
        if let Some(class) = self.state_class {
            map.insert("state_class".to_string(), json!(class));
        }
        if let Some(category) = self.entity_category {
            map.insert("entity_category".to_string(), json!(category));
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_skip_unset_fields() {
        let attrs = EntityAttributes {
            friendly_name: Some("Front Door Battery".to_string()),
            device_class: Some(SensorDeviceClass::Battery.as_str()),
            unit_of_measurement: Some(units::PERCENTAGE),
            ..Default::default()
        };
        let map = attrs.to_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map["device_class"], json!("battery"));
        assert!(!map.contains_key("state_class"));
    }

    #[test]
    fn test_device_class_serde_matches_as_str() {
        let json = serde_json::to_string(&SensorDeviceClass::SignalStrength).unwrap();
        assert_eq!(json, format!("\"{}\"", SensorDeviceClass::SignalStrength.as_str()));
    }
}
