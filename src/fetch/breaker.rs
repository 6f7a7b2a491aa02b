//! Per-endpoint circuit breaking.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: endpoint assumed down, requests fail fast
//! - Half-Open: testing whether the endpoint recovered
//!
//! # State transitions
//! ```text
//! Closed → Open: consecutive failures reach the threshold
//! Open → Half-Open: cooldown elapsed, next caller becomes the probe
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! Breakers are keyed per endpoint (scheme plus host), not per URL, so one
//! dead artifact host trips a single breaker however many paths it serves.
//! A single probe passes in Half-Open; other callers keep failing fast until
//! the probe reports.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

/// Observable state of one endpoint's breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct EndpointBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    /// When the in-flight probe was admitted, so a probe that never reports
    /// back cannot wedge the breaker in Half-Open.
    probe_started_at: Option<Instant>,
}

impl EndpointBreaker {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            probe_started_at: None,
        }
    }
}

/// Registry of breakers, one per endpoint key.
#[derive(Debug)]
pub struct BreakerRegistry {
    endpoints: DashMap<String, EndpointBreaker>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl BreakerRegistry {
    /// Creates a registry with the given trip threshold and cooldown.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            endpoints: DashMap::new(),
            failure_threshold,
            cooldown,
        }
    }

    /// Asks to pass traffic to an endpoint.
    ///
    /// Returns `Err` with the remaining cooldown when the call must fail
    /// fast. When an open breaker's cooldown has elapsed the caller is
    /// admitted as the Half-Open probe.
    pub fn try_acquire(&self, endpoint: &str) -> Result<(), Duration> {
        let mut breaker = self
            .endpoints
            .entry(endpoint.to_string())
            .or_insert_with(EndpointBreaker::new);

        match breaker.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = breaker
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(self.cooldown);
                if elapsed >= self.cooldown {
                    info!(endpoint, "cooldown elapsed, admitting probe");
                    breaker.state = BreakerState::HalfOpen;
                    breaker.probe_started_at = Some(Instant::now());
                    Ok(())
                } else {
                    debug!(endpoint, "circuit open, failing fast");
                    Err(self.cooldown - elapsed)
                }
            }
            BreakerState::HalfOpen => {
                // A probe is already out; admit a replacement only if it has
                // been silent for a full cooldown.
                let stale = breaker
                    .probe_started_at
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if stale {
                    warn!(endpoint, "probe never reported, admitting another");
                    breaker.probe_started_at = Some(Instant::now());
                    Ok(())
                } else {
                    Err(self.cooldown)
                }
            }
        }
    }

    /// Records a successful attempt against an endpoint.
    pub fn record_success(&self, endpoint: &str) {
        let mut breaker = self
            .endpoints
            .entry(endpoint.to_string())
            .or_insert_with(EndpointBreaker::new);

        if breaker.state != BreakerState::Closed {
            info!(endpoint, "circuit closed after successful attempt");
        }
        breaker.state = BreakerState::Closed;
        breaker.consecutive_failures = 0;
        breaker.probe_started_at = None;
    }

    /// Records a failed attempt against an endpoint.
    pub fn record_failure(&self, endpoint: &str) {
        let mut breaker = self
            .endpoints
            .entry(endpoint.to_string())
            .or_insert_with(EndpointBreaker::new);

        breaker.consecutive_failures += 1;
        breaker.last_failure_at = Some(Instant::now());

        match breaker.state {
            BreakerState::HalfOpen => {
                warn!(endpoint, "probe failed, circuit reopened");
                breaker.state = BreakerState::Open;
                breaker.probe_started_at = None;
            }
            BreakerState::Closed if breaker.consecutive_failures >= self.failure_threshold => {
                warn!(
                    endpoint,
                    failures = breaker.consecutive_failures,
                    "failure threshold reached, circuit opened"
                );
                breaker.state = BreakerState::Open;
            }
            _ => {}
        }
    }

    /// Current state of an endpoint's breaker.
    pub fn state(&self, endpoint: &str) -> BreakerState {
        self.endpoints
            .get(endpoint)
            .map(|b| b.state)
            .unwrap_or(BreakerState::Closed)
    }
}

/// Derives the breaker key for a URL: scheme plus host (and port).
pub(crate) fn endpoint_key(url: &str) -> String {
    match url.find("://") {
        Some(idx) => {
            let after = &url[idx + 3..];
            let end = after.find('/').unwrap_or(after.len());
            url[..idx + 3 + end].to_string()
        }
        None => url.to_string(),
    }
}
