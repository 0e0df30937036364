//! Lock data decoded by the push-lock library

use ha_core::lock_states;

/// Bolt position reported by the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockStatus {
    #[default]
    Unknown,
    Locked,
    Unlocked,
    Locking,
    Unlocking,
    Jammed,
}

impl LockStatus {
    /// Lock entity state for this status, `None` while unknown
    pub fn as_state(&self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            Self::Locked => Some(lock_states::LOCKED),
            Self::Unlocked => Some(lock_states::UNLOCKED),
            Self::Locking => Some(lock_states::LOCKING),
            Self::Unlocking => Some(lock_states::UNLOCKING),
            Self::Jammed => Some(lock_states::JAMMED),
        }
    }
}

/// Door position from the lock's door sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoorStatus {
    #[default]
    Unknown,
    Opened,
    Closed,
    Ajar,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryState {
    pub voltage: f64,
    pub percentage: u8,
}

/// Result of the lock's key handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthState {
    pub successful: bool,
}

/// One decoded notification
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LockState {
    pub lock: LockStatus,
    pub door: DoorStatus,
    pub battery: Option<BatteryState>,
    pub auth: Option<AuthState>,
}

impl LockState {
    pub fn new(lock: LockStatus, door: DoorStatus) -> Self {
        Self {
            lock,
            door,
            battery: None,
            auth: Some(AuthState { successful: true }),
        }
    }

    pub fn with_battery(mut self, voltage: f64, percentage: u8) -> Self {
        self.battery = Some(BatteryState {
            voltage,
            percentage,
        });
        self
    }

    pub fn with_auth(mut self, successful: bool) -> Self {
        self.auth = Some(AuthState { successful });
        self
    }

    /// The lock reported that it rejected our key
    pub fn auth_failed(&self) -> bool {
        matches!(self.auth, Some(AuthState { successful: false }))
    }
}

/// Static description of the lock hardware
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
    /// The lock has a door position sensor
    pub door_sense: bool,
}

/// Link quality of the current connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionInfo {
    pub rssi: Option<i16>,
}
