//! Resilient source fetching.
//!
//! One query fans out to several artifact URLs, and near-simultaneous
//! queries routinely ask for the same URL. The fetch client deduplicates
//! concurrent calls per URL (single-flight), retries transient failures
//! with exponential backoff, honours cancellation at every suspension
//! point, and trips a per-endpoint circuit breaker so a dead host fails
//! fast instead of burning the retry budget of every caller.
//!
//! Payloads are parsed at this boundary: callers receive JSON documents or
//! typed tables, never raw bytes. Parse failures are deterministic and are
//! surfaced immediately without retry.

mod breaker;
mod http;
mod types;

pub use breaker::{BreakerRegistry, BreakerState};
pub use http::{HttpFetcher, ReqwestFetcher};
pub use types::{DataTable, FetchError, Payload, PayloadKind};

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use breaker::endpoint_key;

/// Longest payload prefix echoed back in parse errors.
const PARSE_SAMPLE_LEN: usize = 120;

/// Result fanned out to single-flight waiters.
type FlightResult = Result<Arc<Payload>, FetchError>;

enum Flight {
    /// This caller runs the fetch and reports to everyone.
    Lead(broadcast::Sender<FlightResult>),
    /// Another caller is already fetching this URL.
    Join(broadcast::Receiver<FlightResult>),
}

/// Removes the in-flight entry when the leader finishes or is dropped,
/// so a cancelled fetch never blocks later retries of the same URL.
struct FlightGuard<'a> {
    flights: &'a DashMap<String, broadcast::Sender<FlightResult>>,
    url: &'a str,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flights.remove(self.url);
    }
}

/// Single-flight, retrying, circuit-breaking fetch client.
///
/// Generic over the HTTP transport so tests can script responses and
/// assert on call counts.
pub struct FetchClient<H: HttpFetcher> {
    http: H,
    config: FetchConfig,
    breakers: BreakerRegistry,
    in_flight: DashMap<String, broadcast::Sender<FlightResult>>,
}

impl<H: HttpFetcher> FetchClient<H> {
    /// Creates a client over the given transport.
    pub fn new(http: H, config: FetchConfig) -> Self {
        Self {
            http,
            breakers: BreakerRegistry::new(config.failure_threshold(), config.breaker_cooldown()),
            config,
            in_flight: DashMap::new(),
        }
    }

    /// Fetches and parses one source URL.
    ///
    /// Concurrent calls for the same URL share one underlying operation and
    /// its outcome. Transient failures are retried up to the configured
    /// attempt cap with exponential backoff; an open circuit or a malformed
    /// payload fails immediately. Cancellation is never retried.
    pub async fn fetch(
        &self,
        url: &str,
        kind: PayloadKind,
        token: CancellationToken,
    ) -> Result<Arc<Payload>, FetchError> {
        let flight = match self.in_flight.entry(url.to_string()) {
            Entry::Occupied(occupied) => Flight::Join(occupied.get().subscribe()),
            Entry::Vacant(vacant) => {
                let (tx, _) = broadcast::channel(1);
                vacant.insert(tx.clone());
                Flight::Lead(tx)
            }
        };

        match flight {
            Flight::Join(mut rx) => {
                debug!(url, "joining in-flight fetch");
                match rx.recv().await {
                    Ok(result) => result,
                    // Leader dropped without reporting; its entry is already
                    // removed, so a fresh call can start over immediately.
                    Err(_) => Err(FetchError::Cancelled {
                        url: url.to_string(),
                    }),
                }
            }
            Flight::Lead(tx) => {
                let result = {
                    let _guard = FlightGuard {
                        flights: &self.in_flight,
                        url,
                    };
                    self.execute(url, kind, &token).await
                };
                let _ = tx.send(result.clone());
                result
            }
        }
    }

    /// Breaker state for the endpoint serving a URL.
    pub fn breaker_state(&self, url: &str) -> BreakerState {
        self.breakers.state(&endpoint_key(url))
    }

    /// Number of URLs currently being fetched.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    async fn execute(
        &self,
        url: &str,
        kind: PayloadKind,
        token: &CancellationToken,
    ) -> Result<Arc<Payload>, FetchError> {
        let endpoint = endpoint_key(url);
        let max_retries = self.config.max_retries();
        let mut last_cause = String::new();

        for attempt in 1..=max_retries {
            if token.is_cancelled() {
                return Err(FetchError::Cancelled {
                    url: url.to_string(),
                });
            }
            if self.breakers.try_acquire(&endpoint).is_err() {
                return Err(FetchError::CircuitOpen { endpoint });
            }

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(FetchError::Cancelled { url: url.to_string() });
                }
                result = tokio::time::timeout(
                    self.config.request_timeout(),
                    self.http.get(url),
                ) => result,
            };

            match outcome {
                Ok(Ok(bytes)) => {
                    self.breakers.record_success(&endpoint);
                    debug!(url, bytes = bytes.len(), attempt, "fetch succeeded");
                    return parse_payload(url, kind, &bytes).map(Arc::new);
                }
                Ok(Err(error)) => {
                    self.breakers.record_failure(&endpoint);
                    warn!(url, attempt, error = %error, "fetch attempt failed");
                    last_cause = match error {
                        FetchError::Transient { cause, .. } => cause,
                        other => other.to_string(),
                    };
                }
                Err(_) => {
                    self.breakers.record_failure(&endpoint);
                    warn!(url, attempt, "fetch attempt timed out");
                    last_cause =
                        format!("timed out after {:?}", self.config.request_timeout());
                }
            }

            // Exponential backoff before the next attempt.
            if attempt < max_retries {
                let backoff = self.config.backoff_base() * (1 << attempt);
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(FetchError::Cancelled { url: url.to_string() });
                    }
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: max_retries,
            cause: last_cause,
        })
    }
}

fn parse_payload(url: &str, kind: PayloadKind, bytes: &[u8]) -> Result<Payload, FetchError> {
    match kind {
        PayloadKind::Json => serde_json::from_slice(bytes).map(Payload::Json).map_err(|e| {
            FetchError::Parse {
                url: url.to_string(),
                kind,
                detail: e.to_string(),
                sample: payload_sample(bytes),
            }
        }),
        PayloadKind::Tabular => {
            parse_table(bytes)
                .map(Payload::Table)
                .map_err(|detail| FetchError::Parse {
                    url: url.to_string(),
                    kind,
                    detail,
                    sample: payload_sample(bytes),
                })
        }
    }
}

/// Parses comma-delimited text with a header row.
///
/// Rows whose cell count disagrees with the header are skipped with a
/// diagnostic rather than failing the whole payload; the artifacts are
/// machine-written, so a bad row is noise, not structure.
fn parse_table(bytes: &[u8]) -> Result<DataTable, String> {
    let text = String::from_utf8_lossy(bytes);
    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<String> = line.split(',').map(|c| c.trim().to_string()).collect();
        match &columns {
            None => {
                if cells.iter().all(|c| c.is_empty()) {
                    return Err("header row has no column names".to_string());
                }
                columns = Some(cells);
            }
            Some(header) => {
                if cells.len() != header.len() {
                    warn!(
                        line = number + 1,
                        cells = cells.len(),
                        expected = header.len(),
                        "skipping malformed table row"
                    );
                    skipped += 1;
                    continue;
                }
                rows.push(cells);
            }
        }
    }

    match columns {
        Some(columns) => {
            if skipped > 0 {
                debug!(skipped, kept = rows.len(), "dropped malformed table rows");
            }
            Ok(DataTable::new(columns, rows))
        }
        None => Err("empty table payload".to_string()),
    }
}

fn payload_sample(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(PARSE_SAMPLE_LEN)
        .collect()
}
