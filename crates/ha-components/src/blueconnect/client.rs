//! Contract of the push-lock library
//!
//! The BLE session, key handshake, reconnection and advertisement decoding
//! all happen behind these traits. A client pushes every decoded
//! notification into the channel it was started with.

use async_trait::async_trait;
use ha_bluetooth::BluetoothServiceInfo;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use super::models::{ConnectionInfo, LockInfo, LockState};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// The lock rejected the key
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("timed out waiting for the lock")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// What the client reports on its event channel
#[derive(Debug, Clone, PartialEq)]
pub enum LockEvent {
    State {
        state: LockState,
        info: LockInfo,
        connection: ConnectionInfo,
    },
    Error(LockError),
}

/// Everything needed to talk to one lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockParams {
    pub local_name: String,
    pub address: String,
    pub key: String,
    pub slot: u8,
    pub always_connected: bool,
    /// Name used in the library's logs
    pub name: String,
}

/// A connection to one lock
#[async_trait]
pub trait PushLockClient: Send + Sync {
    fn address(&self) -> &str;

    /// Start the session. Notifications and errors go to `events` until
    /// [`PushLockClient::stop`] is called.
    async fn start(&self, events: mpsc::UnboundedSender<LockEvent>) -> Result<(), LockError>;

    /// Close the session. Safe to call more than once.
    fn stop(&self);

    /// Feed an advertisement seen for this lock; may trigger a connection
    fn update_advertisement(&self, info: &BluetoothServiceInfo);

    /// Forget the last advertisement after the lock went out of range
    fn reset_advertisement_state(&self);

    async fn lock(&self) -> Result<(), LockError>;

    async fn unlock(&self) -> Result<(), LockError>;
}

/// Creates clients and cleans up connections left behind by other clients
#[async_trait]
pub trait PushLockConnector: Send + Sync {
    fn connect(&self, params: &LockParams) -> Arc<dyn PushLockClient>;

    async fn close_stale_connections_by_address(&self, address: &str) -> Result<(), LockError>;
}
