//! Observer registration with explicit unsubscribe handles
//!
//! Consumers subscribe with a callback and receive a [`Subscription`] handle;
//! dropping a consumer without unsubscribing leaks only the closure, never a
//! task or timer. Emission is synchronous and fans out to every live
//! listener.

use parking_lot::Mutex;
use uuid::Uuid;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Opaque handle identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    id: Uuid,
}

/// A list of listeners for one event type.
pub struct EventHub<T> {
    listeners: Mutex<Vec<(Uuid, Callback<T>)>>,
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventHub<T> {
    pub fn new() -> Self {
        Self { listeners: Mutex::new(Vec::new()) }
    }

    /// Register a listener and return its unsubscribe handle.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.listeners.lock().push((id, Box::new(callback)));
        Subscription { id }
    }

    /// Remove a listener. Unknown handles are ignored, so double-unsubscribe
    /// is harmless.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.listeners.lock().retain(|(id, _)| *id != subscription.id);
    }

    /// Invoke every registered listener with the event.
    pub fn emit(&self, event: &T) {
        let listeners = self.listeners.lock();
        for (_, callback) in listeners.iter() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}
