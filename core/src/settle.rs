//! Futures that settle exactly once.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::hub::{ListenerHub, Registration};

/// Why a [`SingleResolution`] settled without a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
    /// The event source reported a failure.
    #[error("source error: {0}")]
    Error(String),
    /// The event source was torn down while the future was awaited.
    #[error("source closed")]
    Closed,
    /// Nothing settled the future within the bound.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

type Outcome<T> = Result<T, SettleError>;
type Slot<T> = Mutex<Option<oneshot::Sender<Outcome<T>>>>;

fn take<T>(slot: &Slot<T>) -> Option<oneshot::Sender<Outcome<T>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

fn peek<T>(slot: &Slot<T>) -> MutexGuard<'_, Option<oneshot::Sender<Outcome<T>>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settling side of a [`SingleResolution`].
///
/// Clones share one slot: the first `settle` wins, every later call returns
/// `false` and has no effect. When every clone is dropped without settling,
/// the waiter observes [`SettleError::Closed`].
pub struct Resolver<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Resolver<T> {
    /// Returns `true` only for the call that settled the future.
    pub fn settle(&self, outcome: Outcome<T>) -> bool {
        let Some(sender) = take(&self.slot) else {
            return false;
        };
        // A waiter that was cancelled has dropped its receiver; the future
        // still counts as settled.
        let _ = sender.send(outcome);
        true
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, error: SettleError) -> bool {
        self.settle(Err(error))
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        peek(&self.slot).is_none()
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Waiting side: yields exactly one outcome.
///
/// The bound is fixed at construction. `None` waits until a resolver settles
/// or all resolvers are dropped.
pub struct SingleResolution<T> {
    rx: oneshot::Receiver<Outcome<T>>,
    slot: Weak<Slot<T>>,
    timeout: Option<Duration>,
}

impl<T> SingleResolution<T> {
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> (Self, Resolver<T>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let pending = Self {
            rx,
            slot: Arc::downgrade(&slot),
            timeout,
        };
        (pending, Resolver { slot })
    }

    pub async fn wait(self) -> Outcome<T> {
        let Self { rx, slot, timeout } = self;

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    // Claim the slot so events arriving after the deadline are no-ops.
                    if let Some(slot) = slot.upgrade() {
                        drop(take(&slot));
                    }
                    return Err(SettleError::Timeout(limit));
                }
            },
            None => rx.await,
        };

        received.unwrap_or(Err(SettleError::Closed))
    }
}

impl<T> fmt::Debug for SingleResolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleResolution")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A listener registered on a hub together with the future it settles.
///
/// Arming before triggering the event source (sending a request, posting a
/// job) guarantees a fast reply cannot slip past. The listener is
/// deregistered when [`Armed::wait`] returns or when the `Armed` value is
/// dropped unawaited.
#[must_use = "an Armed listener is deregistered as soon as it is dropped"]
pub struct Armed<T> {
    pending: SingleResolution<T>,
    registration: Registration,
}

impl<T> Armed<T> {
    pub async fn wait(self) -> Outcome<T> {
        let Self {
            pending,
            registration,
        } = self;
        let outcome = pending.wait().await;
        drop(registration);
        outcome
    }
}

impl<T> fmt::Debug for Armed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Armed")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// Register `handler` on `hub` and return the armed future.
///
/// `handler` maps each event to `None` (ignore, keep waiting) or to the
/// outcome that settles the future.
pub fn arm_event<E, T, F>(hub: &ListenerHub<E>, timeout: Option<Duration>, handler: F) -> Armed<T>
where
    E: 'static,
    T: Send + 'static,
    F: Fn(&E) -> Option<Outcome<T>> + Send + Sync + 'static,
{
    let (pending, resolver) = SingleResolution::new(timeout);
    let registration = hub.register(move |event| {
        if resolver.is_settled() {
            return;
        }
        if let Some(outcome) = handler(event) {
            resolver.settle(outcome);
        }
    });
    Armed {
        pending,
        registration,
    }
}

/// [`arm_event`] followed by [`Armed::wait`].
pub async fn await_event<E, T, F>(
    hub: &ListenerHub<E>,
    timeout: Option<Duration>,
    handler: F,
) -> Outcome<T>
where
    E: 'static,
    T: Send + 'static,
    F: Fn(&E) -> Option<Outcome<T>> + Send + Sync + 'static,
{
    arm_event(hub, timeout, handler).wait().await
}
