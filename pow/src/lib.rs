//! Secret generation for proxy tips.
//!
//! A tip is a list of 32-byte secrets whose combined value, measured against
//! the proxy's mixin, reaches the unit price. Searching for them is CPU-bound,
//! so it runs on a dedicated [`Worker`] thread that lives for exactly one
//! request.

mod delegate;
mod mixin;
mod worker;

pub use delegate::{DelegateError, GenerateFut, SecretGenerator, ThreadDelegate, split_blocks};
pub use mixin::{DEFAULT_UNIT_PRICE, Mixin, MixinError, generate, keccak256};
pub use worker::{Job, Worker, WorkerStats};
