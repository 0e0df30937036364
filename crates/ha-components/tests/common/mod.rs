//! Common test utilities for the lock integration
//!
//! A host with every service wired up, config entry builders and
//! advertisement fixtures.

#![allow(dead_code)]

mod fixtures;
mod mock_config_entry;
mod test_hass;

pub use fixtures::*;
pub use mock_config_entry::*;
pub use test_hass::*;
