//! Push-based listener registry.
//!
//! # Responsibility
//! - Hold callbacks for connectivity changes and task snapshot updates.
//! - Hand out `Subscription` guards that unregister on drop.
//!
//! # Invariants
//! - Listeners are invoked outside the registry lock, so a listener may
//!   subscribe or unsubscribe without deadlocking.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Callback shared between the registry and its notifier.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<T>>,
}

/// Ordered set of listeners keyed by registration order.
pub struct ListenerSet<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T: 'static> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }

    /// Registers a listener until the returned guard is dropped.
    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        let id = {
            let mut slots = lock_slots(&self.slots);
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.insert(id, listener);
            id
        };

        let weak: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = weak.upgrade() {
                lock_slots(&slots).listeners.remove(&id);
            }
        })
    }

    /// Calls every registered listener with `value`.
    pub fn notify(&self, value: &T) {
        let listeners: Vec<Listener<T>> = lock_slots(&self.slots)
            .listeners
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        lock_slots(&self.slots).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_slots<T>(slots: &Mutex<Slots<T>>) -> MutexGuard<'_, Slots<T>> {
    match slots.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Unregisters its listener when dropped or on `unsubscribe`.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
