//! Observable value store with explicit subscriptions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: T,
    version: u64,
    next_id: u64,
    listeners: BTreeMap<u64, Listener<T>>,
}

/// A shared value that notifies subscribers on every change.
///
/// Cloning the store yields another handle to the same value. A notification
/// is dropped once a newer value has been set, so a listener that writes to the
/// store never leaves later listeners on a stale value. The store expects one
/// writer at a time; writers on different threads may still interleave.
pub struct Store<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Store<T> {
    /// Create a store holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value,
                version: 0,
                next_id: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).value.clone()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.update(|current| *current = value);
    }

    /// Modify the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        // Listeners run outside the lock so they may read the store.
        let (version, value, listeners) = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut inner.value);
            inner.version += 1;
            let listeners: Vec<Listener<T>> = inner.listeners.values().cloned().collect();
            (inner.version, inner.value.clone(), listeners)
        };
        for listener in listeners {
            if self.version() != version {
                break;
            }
            listener(&value);
        }
    }

    fn version(&self) -> u64 {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).version
    }

    /// Register `listener`. It is called once with the current value, then on every change.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        let listener: Listener<T> = Arc::new(listener);
        let (id, value) = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.insert(id, Arc::clone(&listener));
            (id, inner.value.clone())
        };
        listener(&value);
        Subscription {
            store: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).listeners.len()
    }
}

/// Handle returned by [`Store::subscribe`]; unsubscribes when dropped.
pub struct Subscription<T> {
    store: Weak<Mutex<Inner<T>>>,
    id: Option<u64>,
}

impl<T> Subscription<T> {
    /// Stop receiving notifications.
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        let Some(id) = self.id.take() else { return };
        if let Some(store) = self.store.upgrade() {
            store.lock().unwrap_or_else(PoisonError::into_inner).listeners.remove(&id);
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(&u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &u32| sink.lock().unwrap().push(*value))
    }

    #[test]
    fn test_subscribe_receives_current_then_changes() {
        let store = Store::new(1_u32);
        let (seen, listener) = recorder();

        let _subscription = store.subscribe(listener);
        store.set(2);
        store.update(|v| *v += 10);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 12]);
        assert_eq!(store.get(), 12);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = Store::new(0_u32);
        let (seen, listener) = recorder();

        let subscription = store.subscribe(listener);
        assert_eq!(store.subscriber_count(), 1);
        subscription.unsubscribe();
        store.set(5);

        assert_eq!(*seen.lock().unwrap(), vec![0]);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let store = Store::new(0_u32);
        {
            let (_seen, listener) = recorder();
            let _subscription = store.subscribe(listener);
            assert_eq!(store.subscriber_count(), 1);
        }
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_listener_may_read_store() {
        let store = Store::new(0_u32);
        let reader = store.clone();
        let (seen, _) = recorder();
        let sink = Arc::clone(&seen);

        let _subscription = store.subscribe(move |_| sink.lock().unwrap().push(reader.get()));
        store.set(7);

        assert_eq!(*seen.lock().unwrap(), vec![0, 7]);
    }

    #[test]
    fn test_superseded_value_is_not_delivered() {
        let store = Store::new(0_u32);
        let writer = store.clone();
        let _redirect = store.subscribe(move |value| {
            if *value == 1 {
                writer.set(2);
            }
        });
        let (seen, listener) = recorder();
        let _subscription = store.subscribe(listener);

        store.set(1);

        assert_eq!(*seen.lock().unwrap(), vec![0, 2]);
        assert_eq!(store.get(), 2);
    }
}
