//! Listener registry with scoped deregistration.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Listeners<E> {
    next_key: u64,
    entries: Vec<(u64, Listener<E>)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out point for events of type `E`.
///
/// Listeners are only reachable through the [`Registration`] returned by
/// [`ListenerHub::register`]; there is no manual unregister call to forget.
pub struct ListenerHub<E> {
    inner: Arc<Mutex<Listeners<E>>>,
}

impl<E: 'static> ListenerHub<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_key: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register `listener` until the returned guard is dropped.
    pub fn register<F>(&self, listener: F) -> Registration
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let key = {
            let mut listeners = lock(&self.inner);
            let key = listeners.next_key;
            listeners.next_key += 1;
            listeners.entries.push((key, Arc::new(listener)));
            key
        };

        let hub: Weak<Mutex<Listeners<E>>> = Arc::downgrade(&self.inner);
        Registration {
            release: Some(Box::new(move || {
                if let Some(inner) = hub.upgrade() {
                    lock(&inner).entries.retain(|(k, _)| *k != key);
                }
            })),
        }
    }

    /// Deliver `event` to every listener registered at the time of the call.
    ///
    /// Listeners run outside the registry lock, so a listener may register or
    /// drop registrations without deadlocking.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = lock(&self.inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).entries.len()
    }
}

impl<E: 'static> Default for ListenerHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerHub<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHub")
            .field("listeners", &lock(&self.inner).entries.len())
            .finish()
    }
}

/// Keeps one listener registered. Dropping it deregisters the listener.
#[must_use = "dropping a Registration deregisters its listener immediately"]
pub struct Registration {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_reaches_registered_listeners() {
        let hub = ListenerHub::<u32>::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_a = Arc::clone(&seen);
        let _a = hub.register(move |v| {
            seen_a.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let seen_b = Arc::clone(&seen);
        let _b = hub.register(move |v| {
            seen_b.fetch_add(*v as usize, Ordering::SeqCst);
        });

        hub.emit(&5);
        assert_eq!(seen.load(Ordering::SeqCst), 10);
        assert_eq!(hub.listener_count(), 2);
    }

    #[test]
    fn dropping_registration_deregisters() {
        let hub = ListenerHub::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let registration = hub.register(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        hub.emit(&());
        drop(registration);
        hub.emit(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn only_the_dropped_listener_is_removed() {
        let hub = ListenerHub::<()>::new();
        let first = hub.register(|()| {});
        let _second = hub.register(|()| {});
        drop(first);
        assert_eq!(hub.listener_count(), 1);
    }

    #[test]
    fn registration_outliving_hub_is_harmless() {
        let hub = ListenerHub::<()>::new();
        let registration = hub.register(|()| {});
        drop(hub);
        drop(registration);
    }

    #[test]
    fn listener_may_register_during_emit() {
        let hub = Arc::new(ListenerHub::<()>::new());
        let inner_hub = Arc::clone(&hub);
        let _outer = hub.register(move |()| {
            // Registering from inside a callback must not deadlock.
            let _nested = inner_hub.register(|()| {});
        });
        hub.emit(&());
        assert_eq!(hub.listener_count(), 1);
    }
}
