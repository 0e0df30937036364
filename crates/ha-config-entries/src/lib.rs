//! Config Entries
//!
//! This crate provides the configuration entry system for Home Assistant.
//! Config entries represent individual integration instances and manage
//! their lifecycle (setup, retry, unload, reload, reauthentication).
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`Integration`] / [`EntryRuntime`] - What an integration plugs in
//! - [`ReauthFlows`] - Open reauthentication requests
//!
//! Entries live in memory only.

pub mod entry;
pub mod error;
pub mod manager;
pub mod reauth;
pub mod state_machine;

pub use entry::{
    ConfigEntry, ConfigEntryDisabledBy, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate,
};
pub use error::{ConfigEntriesError, ConfigEntriesResult, SetupError};
pub use manager::{ConfigEntries, EntryRuntime, Integration};
pub use reauth::{ReauthFlow, ReauthFlows};
pub use state_machine::{calculate_retry_delay, InvalidTransition};
