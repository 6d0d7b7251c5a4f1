//! Network reachability contract.
//!
//! # Invariants
//! - Observation is push-based; the core never polls.
//! - `ManualConnectivity` notifies only on real transitions, one at a time.

use crate::listeners::{Listener, ListenerSet, Subscription};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Reports current and changing network reachability.
pub trait ConnectivityMonitor: Send + Sync {
    /// Point-in-time check used before deciding whether a write is queued.
    fn is_connected(&self) -> bool;

    /// Registers `listener` for every reported change.
    fn subscribe(&self, listener: Listener<bool>) -> Subscription;
}

struct Inner {
    connected: AtomicBool,
    transition: Mutex<()>,
    listeners: ListenerSet<bool>,
}

/// Host-driven monitor: the platform bridge forwards reachability events
/// through `set_connected`.
#[derive(Clone)]
pub struct ManualConnectivity {
    inner: Arc<Inner>,
}

impl ManualConnectivity {
    pub fn new(connected: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                connected: AtomicBool::new(connected),
                transition: Mutex::new(()),
                listeners: ListenerSet::new(),
            }),
        }
    }

    /// Records the new state and notifies listeners if it changed.
    ///
    /// Returns whether a transition happened. Listeners must not call
    /// `set_connected` re-entrantly.
    pub fn set_connected(&self, connected: bool) -> bool {
        let _transition = match self.inner.transition.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = self.inner.connected.swap(connected, Ordering::SeqCst);
        if previous == connected {
            return false;
        }
        info!(
            "event=connectivity_change module=capability status=ok connected={} listeners={}",
            connected,
            self.inner.listeners.len()
        );
        self.inner.listeners.notify(&connected);
        true
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self, listener: Listener<bool>) -> Subscription {
        self.inner.listeners.subscribe(listener)
    }
}
