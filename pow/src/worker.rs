//! One-shot OS thread for secret generation.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use num_bigint::BigUint;
use proxyprobe_core::{Resolver, SingleResolution};

use crate::delegate::DelegateError;
use crate::mixin::{Mixin, generate};

const THREAD_NAME: &str = "proxyprobe-pow";

/// Input to a single generation run.
#[derive(Debug, Clone)]
pub struct Job {
    pub mixin: Mixin,
    pub price: BigUint,
}

/// Lifetime counters shared by every worker a delegate creates.
#[derive(Debug, Default)]
pub struct WorkerStats {
    spawned: AtomicUsize,
    terminated: AtomicUsize,
}

impl WorkerStats {
    #[must_use]
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Workers spawned but not yet dropped.
    #[must_use]
    pub fn live(&self) -> usize {
        self.spawned().saturating_sub(self.terminated())
    }
}

type Envelope = (Job, Resolver<Vec<u8>>);

/// A dedicated thread that accepts exactly one [`Job`].
///
/// Dropping the worker terminates it: the cancel flag is raised and the job
/// channel closed. The thread is not joined, it notices the flag between
/// draws and exits on its own.
pub struct Worker {
    jobs: Option<mpsc::SyncSender<Envelope>>,
    cancel: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    pub fn spawn(stats: Arc<WorkerStats>) -> Result<Self, DelegateError> {
        let (jobs, inbox) = mpsc::sync_channel::<Envelope>(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let Ok((job, resolver)) = inbox.recv() else {
                    return;
                };
                match generate(&job.mixin, &job.price, &flag) {
                    Some(buffer) => {
                        resolver.resolve(buffer);
                    }
                    None => tracing::debug!("secret generation cancelled"),
                }
            })
            .map_err(DelegateError::Spawn)?;

        stats.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            jobs: Some(jobs),
            cancel,
            stats,
        })
    }

    /// Hand the worker its job. A second call fails with `WorkerBusy`.
    pub fn submit(
        &mut self,
        job: Job,
        timeout: Option<Duration>,
    ) -> Result<SingleResolution<Vec<u8>>, DelegateError> {
        let jobs = self.jobs.take().ok_or(DelegateError::WorkerBusy)?;
        let (pending, resolver) = SingleResolution::new(timeout);
        jobs.send((job, resolver))
            .map_err(|_| DelegateError::WorkerGone)?;
        Ok(pending)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.jobs.take();
        self.stats.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("submitted", &self.jobs.is_none())
            .field("cancelled", &self.cancel.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
