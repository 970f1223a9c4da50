//! Activity signal for in-flight requests.
//!
//! [`ProgressSignal`] counts overlapping requests and notifies
//! [`ProgressListener`]s when the client becomes busy and when it becomes
//! idle again, which is what a loading indicator needs. It has no effect on
//! request outcomes.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Receives busy/idle transitions of a [`ProgressSignal`].
///
/// Callbacks run while the signal's counter is locked, so transitions are
/// delivered in order. They must not call back into the same signal.
pub trait ProgressListener: Send + Sync {
    /// Called when the first request starts.
    fn on_active(&self);

    /// Called when the last request finishes.
    fn on_idle(&self);
}

/// Counter of active requests with transition notifications.
///
/// # Example
///
/// ```rust
/// use request_layer::ProgressSignal;
///
/// let progress = ProgressSignal::new();
/// progress.start();
/// progress.start();
/// progress.done();
/// assert!(progress.is_active());
///
/// progress.done();
/// progress.done(); // redundant, ignored
/// assert!(!progress.is_active());
/// ```
#[derive(Default)]
pub struct ProgressSignal {
    active: Mutex<usize>,
    listeners: RwLock<Vec<Arc<dyn ProgressListener>>>,
}

impl ProgressSignal {
    /// Creates an idle signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    pub fn subscribe(&self, listener: Arc<dyn ProgressListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Marks one more request as active.
    pub fn start(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active += 1;
        if *active == 1 {
            tracing::trace!("Request activity started");
            self.notify(|listener| listener.on_active());
        }
    }

    /// Marks one request as finished. Ignored when nothing is active.
    pub fn done(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if *active == 0 {
            return;
        }
        *active -= 1;
        if *active == 0 {
            tracing::trace!("Request activity finished");
            self.notify(|listener| listener.on_idle());
        }
    }

    /// Starts a request and returns a guard that finishes it on drop.
    pub fn begin(&self) -> ProgressGuard<'_> {
        self.start();
        ProgressGuard { signal: self }
    }

    /// Returns the number of active requests.
    #[must_use]
    pub fn active_requests(&self) -> usize {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` while at least one request is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_requests() > 0
    }

    fn notify(&self, event: impl Fn(&dyn ProgressListener)) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            event(listener.as_ref());
        }
    }
}

impl fmt::Debug for ProgressSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSignal")
            .field("active", &self.active_requests())
            .finish_non_exhaustive()
    }
}

/// Finishes one request of a [`ProgressSignal`] when dropped.
#[derive(Debug)]
#[must_use = "the request is marked finished as soon as the guard is dropped"]
pub struct ProgressGuard<'a> {
    signal: &'a ProgressSignal,
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.signal.done();
    }
}
