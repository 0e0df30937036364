//! Config entry errors

use crate::entry::ConfigEntryState;
use crate::state_machine::InvalidTransition;
use thiserror::Error;

/// Outcome of a failed integration setup.
///
/// The variant decides what the manager does next.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    /// Credentials were rejected; a reauth flow is started and setup is not
    /// retried
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The device could not be reached yet; setup is retried with backoff
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Any other failure; the entry stays in `SetupError`
    #[error("Setup failed: {0}")]
    Failed(String),
}

impl SetupError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SetupError::NotReady(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, SetupError::AuthFailed(_))
    }
}

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("No integration registered for domain {0}")]
    UnknownIntegration(String),

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Unload failed for entry {0}")]
    UnloadFailed(String),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;
