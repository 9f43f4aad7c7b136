//! Event-to-future bridging for proxyprobe.
//!
//! Sockets and workers report progress through callbacks. This crate turns
//! those callbacks into a single awaited outcome:
//!
//! - [`ListenerHub`] fans events out to listeners whose lifetime is tied to a
//!   [`Registration`] guard; dropping the guard deregisters.
//! - [`SingleResolution`] settles exactly once (value, error, close, or
//!   timeout) and ignores everything after.
//! - [`arm_event`] / [`await_event`] compose the two so every exit path,
//!   including cancellation of the awaiting task, tears the listener down.

mod hub;
mod settle;

pub use hub::{ListenerHub, Registration};
pub use settle::{Armed, Resolver, SettleError, SingleResolution, arm_event, await_event};
