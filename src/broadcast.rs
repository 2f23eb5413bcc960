//! # Listener Fan-out Module
//!
//! Callback registry used for both decoded frames and connection status.
//! Every registered listener is invoked directly, in registration order, on
//! the thread that emits. There is no queue and no backpressure.
//!
//! Dispatch holds the registry lock, so once [`Subscription::unsubscribe`]
//! returns the listener is guaranteed never to run again. Listeners must not
//! subscribe or unsubscribe on the same broadcaster from inside a callback.

use std::sync::{Arc, Mutex, MutexGuard};

/// Boxed listener stored by a [`Broadcaster`].
pub type Listener<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Shared, cloneable set of listeners for values of type `T`.
pub struct Broadcaster<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Broadcaster<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    // A panicking listener must not take the whole fan-out down with it
    fn lock(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
        registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a listener. Keep the returned handle to unsubscribe later.
    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        let id = {
            let mut registry = Self::lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, listener));
            id
        };

        let weak = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                Self::lock(&registry).listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Invoke every listener with `value`.
    pub fn emit(&self, value: &T) {
        let registry = Self::lock(&self.registry);
        for (_, listener) in registry.listeners.iter() {
            listener(value);
        }
    }

    pub fn listener_count(&self) -> usize {
        Self::lock(&self.registry).listeners.len()
    }
}

/// Handle returned by every `subscribe`/`on_data`/`on_status` call.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the listener. No invocation happens after this returns.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(b: &Broadcaster<u32>) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = b.subscribe(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        (count, sub)
    }

    #[test]
    fn test_fan_out_to_all_listeners() {
        let b = Broadcaster::<u32>::new();
        let (first, _s1) = counter(&b);
        let (second, _s2) = counter(&b);

        b.emit(&1);
        b.emit(&2);

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let b = Broadcaster::<u32>::new();
        let (count, sub) = counter(&b);
        let (other, _keep) = counter(&b);

        b.emit(&1);
        sub.unsubscribe();
        b.emit(&2);
        b.emit(&3);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 3);
        assert_eq!(b.listener_count(), 1);
    }

    #[test]
    fn test_unsubscribe_after_broadcaster_dropped() {
        let b = Broadcaster::<u32>::new();
        let (_count, sub) = counter(&b);
        drop(b);
        sub.unsubscribe();
    }
}
