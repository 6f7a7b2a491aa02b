//! Worker-pool configuration.

use std::time::Duration;

use super::defaults::{
    default_pool_workers, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD, DEFAULT_TASK_TIMEOUT,
};

/// Configuration for the compute worker pool.
///
/// The pool bounds how many geometry/merge tasks run concurrently and how
/// long any single task may run before it is abandoned.
///
/// # Example
///
/// ```
/// use marketmesh::config::PoolConfig;
///
/// let config = PoolConfig::new().with_workers(2);
/// assert_eq!(config.workers(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum concurrently running tasks
    workers: usize,
    /// Wall-clock limit for one dispatched task
    task_timeout: Duration,
    /// Feature count above which merge work is chunked
    chunk_threshold: usize,
    /// Features per chunk when work is chunked
    chunk_size: usize,
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of pool workers.
    ///
    /// Default: detected hardware concurrency, or 4 when detection fails.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the per-task timeout.
    ///
    /// A task that exceeds this limit fails with a timeout error; its result
    /// is discarded. Default: 30 seconds.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set the feature count above which merge work is chunked.
    ///
    /// Datasets at or below the threshold are processed as a single task.
    /// Default: 1000 features.
    pub fn with_chunk_threshold(mut self, threshold: usize) -> Self {
        self.chunk_threshold = threshold;
        self
    }

    /// Set the number of features per chunk.
    ///
    /// Default: 250 features.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Get the number of pool workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Get the per-task timeout.
    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    /// Get the chunking threshold.
    pub fn chunk_threshold(&self) -> usize {
        self.chunk_threshold
    }

    /// Get the features-per-chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_pool_workers(),
            task_timeout: DEFAULT_TASK_TIMEOUT,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
