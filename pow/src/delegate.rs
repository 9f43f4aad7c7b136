//! The compute-delegate seam and its thread-backed implementation.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use proxyprobe_core::SettleError;
use proxyprobe_types::{BlockLengthError, GeneratedSecret, NetworkParams};
use thiserror::Error;

use crate::mixin::{Mixin, MixinError};
use crate::worker::{Job, Worker, WorkerStats};

pub type GenerateFut<'a> =
    Pin<Box<dyn Future<Output = Result<GeneratedSecret, DelegateError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("network params: {0}")]
    Params(#[from] MixinError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("worker already has a job")]
    WorkerBusy,
    #[error("worker exited without a result")]
    WorkerGone,
    #[error("worker failed: {0}")]
    Failed(String),
    #[error("secret generation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error(transparent)]
    Blocks(#[from] BlockLengthError),
}

impl From<SettleError> for DelegateError {
    fn from(error: SettleError) -> Self {
        match error {
            SettleError::Timeout(after) => Self::Timeout(after),
            SettleError::Closed => Self::WorkerGone,
            SettleError::Error(reason) => Self::Failed(reason),
        }
    }
}

/// Produces a tip for one set of network params.
///
/// Implementations must not share mutable state between calls.
pub trait SecretGenerator: Send + Sync {
    fn generate<'a>(&'a self, params: &'a NetworkParams, price: &'a BigUint) -> GenerateFut<'a>;
}

/// Slice a secrets buffer into `0x`-prefixed 32-byte blocks.
pub fn split_blocks(buffer: &[u8]) -> Result<GeneratedSecret, DelegateError> {
    Ok(GeneratedSecret::from_buffer(buffer)?)
}

/// Spawns one [`Worker`] per `generate` call and terminates it on every
/// exit path, including cancellation of the returned future.
#[derive(Debug)]
pub struct ThreadDelegate {
    timeout: Option<Duration>,
    stats: Arc<WorkerStats>,
}

impl ThreadDelegate {
    /// `None` waits for the worker without a bound.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }
}

impl SecretGenerator for ThreadDelegate {
    fn generate<'a>(&'a self, params: &'a NetworkParams, price: &'a BigUint) -> GenerateFut<'a> {
        Box::pin(async move {
            let mixin = Mixin::from_params(params)?;
            let mut worker = Worker::spawn(Arc::clone(&self.stats))?;
            let pending = worker.submit(
                Job {
                    mixin,
                    price: price.clone(),
                },
                self.timeout,
            )?;

            let outcome = pending.wait().await;
            drop(worker);

            let buffer = outcome?;
            let secret = split_blocks(&buffer)?;
            tracing::debug!(blocks = secret.len(), "generated secret");
            Ok(secret)
        })
    }
}
