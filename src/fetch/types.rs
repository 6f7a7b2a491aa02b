//! Fetch payload types and the error taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a source payload should be parsed once its bytes arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// JSON document (boundary files, enhanced datasets, weights, analysis).
    Json,
    /// Delimited text with a header row (flow tables).
    Tabular,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Json => write!(f, "json"),
            PayloadKind::Tabular => write!(f, "tabular"),
        }
    }
}

/// Errors produced by the fetch client.
///
/// Transient failures are retried internally up to the attempt cap and then
/// surfaced as [`FetchError::Exhausted`]. Parse failures are deterministic
/// and never retried. Callers decide whether a failed source aborts the
/// whole query or degrades it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Network or server failure on a single attempt.
    #[error("transient failure fetching {url}: {cause}")]
    Transient { url: String, cause: String },

    /// All attempts for a URL failed; carries the last underlying cause.
    #[error("fetch of {url} failed after {attempts} attempts: {cause}")]
    Exhausted {
        url: String,
        attempts: u32,
        cause: String,
    },

    /// The endpoint's circuit is open; no network attempt was made.
    #[error("circuit open for {endpoint}, retry later")]
    CircuitOpen { endpoint: String },

    /// Payload text did not parse as the requested kind.
    #[error("malformed {kind} payload from {url}: {detail} (sample: {sample:?})")]
    Parse {
        url: String,
        kind: PayloadKind,
        detail: String,
        sample: String,
    },

    /// The caller cancelled the fetch.
    #[error("fetch of {url} was cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// Whether retrying the same call later could plausibly succeed.
    ///
    /// Parse failures are deterministic; everything else reflects transient
    /// conditions or caller choices.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Parse { .. })
    }
}

/// A payload parsed at the fetch boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON document.
    Json(serde_json::Value),
    /// Parsed delimited-text table.
    Table(DataTable),
}

impl Payload {
    /// The kind this payload parsed as.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Json(_) => PayloadKind::Json,
            Payload::Table(_) => PayloadKind::Tabular,
        }
    }

    /// The JSON document, if this is a JSON payload.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Table(_) => None,
        }
    }

    /// The table, if this is a tabular payload.
    pub fn as_table(&self) -> Option<&DataTable> {
        match self {
            Payload::Table(table) => Some(table),
            Payload::Json(_) => None,
        }
    }
}

/// A parsed delimited-text table.
///
/// Cells are kept as trimmed strings; typed decoding happens in the source
/// schemas, which know which columns they need.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Builds a table from a header and row cells.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Column names from the header row.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All data rows.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a named column, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Cell value by row index and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }
}
