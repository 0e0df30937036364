//! Unsubscribe callbacks
//!
//! Every registration made against the host (bus listeners, Bluetooth
//! callbacks, entity observers) hands back an [`Unsubscribe`]. Integrations
//! collect them in an [`OnUnload`] and drain it when the entry goes away.

use std::fmt;
use std::sync::{Arc, Mutex};

type Release = Box<dyn FnOnce() + Send + 'static>;

/// A once-only release callback.
///
/// Calling [`Unsubscribe::call`] more than once, or from several threads at
/// the same time, runs the wrapped closure exactly once. Dropping an
/// `Unsubscribe` does not release anything.
#[derive(Clone)]
pub struct Unsubscribe {
    release: Arc<Mutex<Option<Release>>>,
}

impl Unsubscribe {
    /// Wrap a release closure
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Arc::new(Mutex::new(Some(Box::new(release)))),
        }
    }

    /// An unsubscribe that releases nothing
    pub fn noop() -> Self {
        Self {
            release: Arc::new(Mutex::new(None)),
        }
    }

    /// Run the release closure if it has not run yet.
    ///
    /// Returns `true` if this call performed the release.
    pub fn call(&self) -> bool {
        let release = self
            .release
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match release {
            Some(release) => {
                release();
                true
            }
            None => false,
        }
    }

    /// Whether the release closure already ran
    pub fn is_released(&self) -> bool {
        self.release
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("released", &self.is_released())
            .finish()
    }
}

/// An arena of unsubscribe callbacks drained exactly once.
///
/// Cloning shares the arena. Callbacks added after [`OnUnload::run`] are
/// released immediately.
#[derive(Clone, Default)]
pub struct OnUnload {
    inner: Arc<Mutex<OnUnloadInner>>,
}

#[derive(Default)]
struct OnUnloadInner {
    pending: Vec<Unsubscribe>,
    drained: bool,
}

impl OnUnload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback to run at unload
    pub fn push(&self, unsub: Unsubscribe) {
        let mut inner = self.lock();
        if inner.drained {
            drop(inner);
            unsub.call();
            return;
        }
        inner.pending.push(unsub);
    }

    /// Release every collected callback.
    ///
    /// Returns the number of callbacks released by this call; a second call
    /// (or a concurrent one) releases nothing.
    pub fn run(&self) -> usize {
        let pending = {
            let mut inner = self.lock();
            inner.drained = true;
            std::mem::take(&mut inner.pending)
        };
        pending.iter().filter(|unsub| unsub.call()).count()
    }

    /// Whether the arena has been drained
    pub fn is_drained(&self) -> bool {
        self.lock().drained
    }

    /// Number of callbacks waiting to run
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OnUnloadInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for OnUnload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("OnUnload")
            .field("pending", &inner.pending.len())
            .field("drained", &inner.drained)
            .finish()
    }
}
