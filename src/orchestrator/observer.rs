//! Bounded registry of snapshot observers.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use crate::record::DownloadRecord;

/// Maximum number of observers a registry accepts by default.
pub const DEFAULT_OBSERVER_CAPACITY: usize = 32;

/// Callback receiving the full, id-ordered snapshot after each coalesced change.
pub type ObserverCallback = Box<dyn Fn(&[DownloadRecord]) + Send>;

/// Handle returned on registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registered observers, in registration order.
pub struct ObserverRegistry {
    observers: Vec<(ObserverId, ObserverCallback)>,
    capacity: usize,
    next_id: u64,
}

impl ObserverRegistry {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            observers: Vec::new(),
            capacity,
            next_id: 1,
        }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.observers.len() >= self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Adds `callback`, or returns `None` when the registry is full.
    pub fn register(&mut self, callback: ObserverCallback) -> Option<ObserverId> {
        if self.is_full() {
            return None;
        }
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, callback));
        Some(id)
    }

    /// Removes the observer; returns whether it was registered.
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(registered, _)| *registered != id);
        self.observers.len() != before
    }

    /// Invokes every observer with `snapshot`, in registration order.
    ///
    /// An observer that panics is unregistered; the others still run.
    pub fn notify(&mut self, snapshot: &[DownloadRecord]) {
        self.observers.retain(|(id, callback)| {
            let delivered = invoke(callback, snapshot);
            if !delivered {
                error!(observer = id.0, "Observer panicked; unregistering it");
            }
            delivered
        });
    }
}

/// Runs `callback`, returning false if it panicked.
pub(crate) fn invoke(callback: &ObserverCallback, snapshot: &[DownloadRecord]) -> bool {
    catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_ok()
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_OBSERVER_CAPACITY)
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
