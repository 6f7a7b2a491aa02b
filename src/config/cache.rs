//! Query-cache configuration.

use std::time::Duration;

use super::defaults::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, DEFAULT_COMPRESSION_THRESHOLD,
    DEFAULT_SWEEP_INTERVAL,
};

/// Configuration for the in-memory query cache.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use marketmesh::config::CacheConfig;
///
/// let config = CacheConfig::new()
///     .with_ttl(Duration::from_secs(30 * 60))
///     .with_capacity_bytes(16 * 1024 * 1024);
/// assert_eq!(config.ttl(), Duration::from_secs(30 * 60));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entry age beyond which a read is treated as a miss
    ttl: Duration,
    /// Total stored-payload capacity in bytes
    capacity_bytes: usize,
    /// Payloads above this serialized size are stored compressed
    compression_threshold: usize,
    /// Interval between background expiry sweeps
    sweep_interval: Duration,
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for cache entries.
    ///
    /// Reads of entries older than this return a miss and drop the entry.
    /// Default: 45 minutes.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the total stored-payload capacity in bytes.
    ///
    /// When an insert would exceed this, least-recently-used entries are
    /// evicted until the new entry fits. Default: 64 MB.
    pub fn with_capacity_bytes(mut self, capacity: usize) -> Self {
        self.capacity_bytes = capacity;
        self
    }

    /// Set the compression threshold in bytes.
    ///
    /// Serialized payloads above this size are gzip-compressed before
    /// storage. Default: 100 KB.
    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Set the background sweep interval.
    ///
    /// The sweeper purges TTL-expired entries so they do not occupy capacity
    /// between reads. Default: 5 minutes.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Get the entry time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the total capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Get the compression threshold in bytes.
    pub fn compression_threshold(&self) -> usize {
        self.compression_threshold
    }

    /// Get the background sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            capacity_bytes: DEFAULT_CACHE_CAPACITY,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}
