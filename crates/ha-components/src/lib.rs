//! Home Assistant Integrations
//!
//! This crate contains integrations built on the host crates. Each one
//! lives in its own module and plugs into the config entry manager through
//! [`ha_config_entries::Integration`].
//!
//! - [`blueconnect`] - BlueConnect Bluetooth push locks

pub mod blueconnect;
