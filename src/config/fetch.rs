//! Fetch and circuit-breaker configuration.

use std::time::Duration;

use super::defaults::{
    DEFAULT_BACKOFF_BASE, DEFAULT_BREAKER_COOLDOWN, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT,
};

/// Configuration for source fetching, retries, and the per-endpoint breaker.
///
/// Groups all parameters needed to configure the fetch client, providing
/// sensible defaults while allowing customization.
///
/// # Example
///
/// ```
/// use marketmesh::config::FetchConfig;
///
/// // Using defaults
/// let config = FetchConfig::default();
/// assert_eq!(config.max_retries(), 3);
/// assert_eq!(config.failure_threshold(), 5);
///
/// // Custom configuration
/// let config = FetchConfig::new()
///     .with_max_retries(5)
///     .with_request_timeout(std::time::Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Maximum attempts per URL before the fetch is declared exhausted
    max_retries: u32,
    /// Base delay for exponential backoff between attempts
    backoff_base: Duration,
    /// Wall-clock limit on a single HTTP request
    request_timeout: Duration,
    /// Consecutive endpoint failures before the circuit opens
    failure_threshold: u32,
    /// How long an open circuit rejects calls before a probe is allowed
    breaker_cooldown: Duration,
}

impl FetchConfig {
    /// Create a new fetch configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of attempts per URL.
    ///
    /// A transient failure is retried until this many attempts have been
    /// made, then the fetch fails with the last error. Default: 3 attempts.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base delay for exponential retry backoff.
    ///
    /// Attempt `n` sleeps `base * 2^n` before the next attempt.
    /// Default: 250 ms.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the per-request HTTP timeout.
    ///
    /// A request that exceeds this limit counts as a transient failure.
    /// Default: 15 seconds.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the consecutive-failure threshold that opens an endpoint's circuit.
    ///
    /// Default: 5 failures.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set how long an open circuit rejects calls before allowing a probe.
    ///
    /// Default: 30 seconds.
    pub fn with_breaker_cooldown(mut self, cooldown: Duration) -> Self {
        self.breaker_cooldown = cooldown;
        self
    }

    /// Get the maximum number of attempts per URL.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the base delay for exponential backoff.
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    /// Get the per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Get the consecutive-failure threshold.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Get the open-circuit cooldown.
    pub fn breaker_cooldown(&self) -> Duration {
        self.breaker_cooldown
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            breaker_cooldown: DEFAULT_BREAKER_COOLDOWN,
        }
    }
}
