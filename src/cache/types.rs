//! Cache error definitions.

use thiserror::Error;

/// Errors raised by cache operations.
///
/// A miss is not an error; these cover the serialization and compression
/// machinery around stored payloads.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Payload (de)serialization failed.
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Gzip compression or decompression failed.
    #[error("cache compression failed: {0}")]
    Compression(#[from] std::io::Error),
}
