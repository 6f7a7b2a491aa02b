//! Bounded worker pool for CPU-heavy assembly work.
//!
//! Merging feature collections and computing spatial statistics are
//! synchronous, CPU-bound jobs. Running them inline would stall the
//! async runtime, so the pool pushes them onto blocking threads while a
//! semaphore caps how many run at once. Each task carries a timeout and
//! a cancellation token; large inputs can be split into chunks that are
//! processed in parallel and reassembled in input order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PoolConfig;

/// Errors produced while running pooled tasks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolError {
    /// The task did not finish within the configured timeout.
    #[error("task '{label}' timed out after {timeout:?}")]
    Timeout { label: String, timeout: Duration },

    /// The task was cancelled before or while it ran.
    #[error("task '{label}' was cancelled")]
    Cancelled { label: String },

    /// The task panicked on its worker thread.
    #[error("task '{label}' panicked: {detail}")]
    Panicked { label: String, detail: String },
}

/// Semaphore-bounded pool for blocking computation.
///
/// Work is handed to `tokio::task::spawn_blocking`; the semaphore
/// ensures no more than the configured number of worker permits are in
/// use. Cancellation is observed while queueing for a permit and while
/// awaiting a result. A blocking closure that has already started
/// cannot be interrupted; its result is discarded instead.
#[derive(Debug)]
pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    config: PoolConfig,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl TaskPool {
    /// Create a pool with the given configuration.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.workers())),
            config,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Run one closure on a worker thread.
    ///
    /// Waits for a free worker permit, then executes `work` under the
    /// configured task timeout.
    pub async fn run<F, R>(
        &self,
        label: &str,
        token: &CancellationToken,
        work: F,
    ) -> Result<R, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if token.is_cancelled() {
            return Err(PoolError::Cancelled {
                label: label.to_string(),
            });
        }

        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => {
                return Err(PoolError::Cancelled { label: label.to_string() });
            }
            permit = self.semaphore.clone().acquire_owned() => {
                permit.expect("semaphore closed unexpectedly")
            }
        };

        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.update_peak(current);
        let _flight = FlightGuard {
            permit,
            in_flight: &self.in_flight,
        };

        let handle = tokio::task::spawn_blocking(work);
        let timeout = self.config.task_timeout();

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(label, "pooled task cancelled while running");
                Err(PoolError::Cancelled { label: label.to_string() })
            }
            joined = tokio::time::timeout(timeout, handle) => match joined {
                Err(_) => Err(PoolError::Timeout {
                    label: label.to_string(),
                    timeout,
                }),
                Ok(Err(join_err)) => Err(PoolError::Panicked {
                    label: label.to_string(),
                    detail: join_err.to_string(),
                }),
                Ok(Ok(value)) => Ok(value),
            },
        }
    }

    /// Run a mapping over `items`, splitting large inputs into chunks.
    ///
    /// Inputs at or below the chunk threshold run as a single task.
    /// Larger inputs are split into chunks of the configured size, each
    /// chunk runs as its own pooled task (with its own timeout), and
    /// the outputs are flattened back in input order. The first failed
    /// chunk fails the whole call.
    pub async fn run_chunked<T, R, F>(
        &self,
        label: &str,
        token: &CancellationToken,
        items: Vec<T>,
        map: F,
    ) -> Result<Vec<R>, PoolError>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(Vec<T>) -> Vec<R> + Send + Sync + Clone + 'static,
    {
        if items.len() <= self.config.chunk_threshold() {
            return self.run(label, token, move || map(items)).await;
        }

        let chunk_size = self.config.chunk_size().max(1);
        let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_size));
        let mut iter = items.into_iter();
        loop {
            let chunk: Vec<T> = iter.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            chunks.push(chunk);
        }
        debug!(label, chunks = chunks.len(), chunk_size, "running chunked task");

        let tasks = chunks.into_iter().map(|chunk| {
            let map = map.clone();
            self.run(label, token, move || map(chunk))
        });
        let outputs = futures::future::try_join_all(tasks).await?;
        Ok(outputs.into_iter().flatten().collect())
    }

    /// Maximum number of tasks that can run at once.
    pub fn workers(&self) -> usize {
        self.config.workers()
    }

    /// Number of tasks currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest concurrent task count observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }
}

/// Holds a worker permit and keeps the in-flight gauge accurate.
struct FlightGuard<'a> {
    #[allow(dead_code)]
    permit: tokio::sync::OwnedSemaphorePermit,
    in_flight: &'a AtomicUsize,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
