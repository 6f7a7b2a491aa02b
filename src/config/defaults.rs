//! Default values for engine configuration.
//!
//! Every tunable the engine exposes has a named default here so the config
//! builders, documentation, and tests agree on a single source.

use std::time::Duration;

/// Maximum fetch attempts per source URL (initial try counts as attempt 1).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential retry backoff.
///
/// Attempt `n` (1-based) sleeps `base * 2^n` before the next attempt.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Consecutive failures on one endpoint before its circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// How long an open circuit rejects calls before allowing a probe.
pub const DEFAULT_BREAKER_COOLDOWN: Duration = Duration::from_secs(30);

/// Maximum age of a cache entry before a read treats it as a miss.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(45 * 60);

/// Total serialized-payload capacity of the cache (64 MB).
pub const DEFAULT_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Serialized payloads above this size are stored gzip-compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 100 * 1024;

/// Interval between background sweeps that purge TTL-expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Worker-pool size when hardware concurrency cannot be detected.
pub const FALLBACK_POOL_WORKERS: usize = 4;

/// Maximum wall-clock time for one dispatched pool task.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Feature count above which merge work is chunked through the pool.
pub const DEFAULT_CHUNK_THRESHOLD: usize = 1000;

/// Features per chunk when merge work is dispatched to the pool.
pub const DEFAULT_CHUNK_SIZE: usize = 250;

/// Base endpoint the five source artifacts are served under.
pub const DEFAULT_BASE_URL: &str = "https://data.yemen-markets.org/v1";

/// Computes the default worker-pool size.
///
/// Uses detected hardware concurrency, falling back to
/// [`FALLBACK_POOL_WORKERS`] when detection fails.
pub fn default_pool_workers() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(FALLBACK_POOL_WORKERS)
}
