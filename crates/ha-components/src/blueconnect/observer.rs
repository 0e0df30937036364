//! Fan-out of lock notifications to entity observers

use indexmap::IndexMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

use super::models::{ConnectionInfo, LockInfo, LockState};

/// Receives every decoded lock notification
pub type LockCallback = Arc<dyn Fn(&LockState, &LockInfo, &ConnectionInfo) + Send + Sync>;

/// Identifies one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

#[derive(Default)]
struct Observers {
    next: u64,
    callbacks: IndexMap<u64, LockCallback>,
}

/// Ordered set of lock observers.
///
/// `notify` calls every observer in registration order on the caller's
/// thread, over a copy of the list taken before the first call. Observers
/// may unregister themselves or others while being notified. A panicking
/// observer unwinds into the caller of `notify`.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Arc<Mutex<Observers>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callback: LockCallback) -> ObserverToken {
        let mut observers = self.lock();
        observers.next += 1;
        let id = observers.next;
        observers.callbacks.insert(id, callback);
        ObserverToken(id)
    }

    /// Remove an observer. Returns `false` if it was already removed.
    pub fn unregister(&self, token: ObserverToken) -> bool {
        self.lock().callbacks.shift_remove(&token.0).is_some()
    }

    /// Deliver a notification. Returns the number of observers called.
    pub fn notify(&self, state: &LockState, info: &LockInfo, connection: &ConnectionInfo) -> usize {
        let callbacks: Vec<LockCallback> = self.lock().callbacks.values().cloned().collect();
        trace!(observers = callbacks.len(), "Notifying lock observers");
        for callback in &callbacks {
            callback(state, info, connection);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Observers> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
