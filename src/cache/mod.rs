//! Query result caching.
//!
//! Assembled snapshots are expensive to rebuild, so completed query
//! results are kept in an in-memory store keyed by query parameters.
//! Entries are serialized to JSON bytes on insert, gzip-compressed when
//! large, and expire after a configurable TTL. When the store would
//! exceed its byte capacity the least recently used entries are evicted
//! first.
//!
//! [`CacheSweeper`] runs alongside the store and reclaims expired
//! entries that no lookup would otherwise touch. [`CacheStats`] exposes
//! hit rates and eviction counters for diagnostics.

mod stats;
mod store;
mod sweeper;
mod types;

pub use stats::CacheStats;
pub use store::QueryCache;
pub use sweeper::CacheSweeper;
pub use types::CacheError;
