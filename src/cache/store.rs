//! In-memory query cache with TTL expiry and LRU eviction.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::Instant;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::stats::CacheStats;
use super::types::CacheError;
use crate::config::CacheConfig;

/// A single cached entry with access metadata.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Serialized payload, gzip-compressed when it exceeded the threshold.
    data: Vec<u8>,
    compressed: bool,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u64,
}

impl CacheEntry {
    fn new(data: Vec<u8>, compressed: bool) -> Self {
        let now = Instant::now();
        Self {
            data,
            compressed,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    /// Update access metadata.
    fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    size_bytes: usize,
}

/// Thread-safe in-memory cache for serialized query results.
///
/// Values are stored as JSON bytes so heterogeneous result types can share
/// one store. Entries expire after the configured TTL and the least
/// recently used entries are evicted when the byte capacity would be
/// exceeded.
#[derive(Debug)]
pub struct QueryCache {
    inner: Mutex<CacheInner>,
    stats: Mutex<CacheStats>,
    config: CacheConfig,
}

impl QueryCache {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            stats: Mutex::new(CacheStats::new()),
            config,
        }
    }

    /// Look up a value, deserializing it into `T`.
    ///
    /// Returns `Ok(None)` on a miss or when the entry's TTL has elapsed.
    /// Expired entries are removed as a side effect of the lookup.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let (data, compressed) = {
            let mut inner = self.inner.lock().unwrap();

            let expired = match inner.entries.get(key) {
                None => {
                    self.stats.lock().unwrap().record_miss();
                    return Ok(None);
                }
                Some(entry) => entry.created_at.elapsed() >= self.config.ttl(),
            };

            if expired {
                if let Some(old) = inner.entries.remove(key) {
                    inner.size_bytes -= old.data.len();
                }
                let mut stats = self.stats.lock().unwrap();
                stats.record_expirations(1);
                stats.record_miss();
                stats.update_size(inner.size_bytes, inner.entries.len());
                return Ok(None);
            }

            let entry = match inner.entries.get_mut(key) {
                Some(entry) => entry,
                None => {
                    self.stats.lock().unwrap().record_miss();
                    return Ok(None);
                }
            };
            entry.touch();
            let snapshot = (entry.data.clone(), entry.compressed);
            self.stats.lock().unwrap().record_hit();
            snapshot
        };

        let bytes = if compressed { decompress(&data)? } else { data };
        let value = serde_json::from_slice(&bytes)?;
        Ok(Some(value))
    }

    /// Store a value under `key`, serializing it to JSON bytes.
    ///
    /// Existing entries for the key are replaced. When the serialized
    /// payload exceeds the compression threshold it is stored gzipped.
    /// Least recently used entries are evicted until the payload fits;
    /// a payload larger than the whole capacity is skipped with a warning
    /// rather than flushing the entire cache.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_vec(value)?;
        let compressed = raw.len() > self.config.compression_threshold();
        let data = if compressed { compress(&raw)? } else { raw };

        if data.len() > self.config.capacity_bytes() {
            warn!(
                key,
                size_bytes = data.len(),
                capacity_bytes = self.config.capacity_bytes(),
                "payload exceeds cache capacity, not caching"
            );
            return Ok(());
        }

        let mut inner = self.inner.lock().unwrap();

        if let Some(old) = inner.entries.remove(key) {
            inner.size_bytes -= old.data.len();
        }

        let evicted = evict_until_fits(&mut inner, data.len(), self.config.capacity_bytes());
        if evicted > 0 {
            debug!(key, evicted, "evicted entries to make room");
        }

        inner.size_bytes += data.len();
        inner.entries.insert(key.to_string(), CacheEntry::new(data, compressed));

        let mut stats = self.stats.lock().unwrap();
        stats.record_insertion(compressed);
        if evicted > 0 {
            stats.record_evictions(evicted);
        }
        stats.update_size(inner.size_bytes, inner.entries.len());
        Ok(())
    }

    /// Remove all entries whose TTL has elapsed, returning how many.
    pub fn sweep_expired(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let ttl = self.config.ttl();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.created_at.elapsed() >= ttl)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = inner.entries.remove(key) {
                inner.size_bytes -= entry.data.len();
            }
        }

        if !expired.is_empty() {
            let mut stats = self.stats.lock().unwrap();
            stats.record_expirations(expired.len() as u64);
            stats.update_size(inner.size_bytes, inner.entries.len());
        }
        expired.len()
    }

    /// Whether a live (unexpired) entry exists for the key.
    pub fn contains(&self, key: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .get(key)
            .is_some_and(|entry| entry.created_at.elapsed() < self.config.ttl())
    }

    /// Remove an entry, returning whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.entries.remove(key) {
            Some(entry) => {
                inner.size_bytes -= entry.data.len();
                self.stats
                    .lock()
                    .unwrap()
                    .update_size(inner.size_bytes, inner.entries.len());
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.size_bytes = 0;
        self.stats.lock().unwrap().update_size(0, 0);
    }

    /// Number of entries currently stored.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Stored payload bytes (after compression, excluding map overhead).
    pub fn size_bytes(&self) -> usize {
        self.inner.lock().unwrap().size_bytes
    }

    /// Snapshot of cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Evict least recently used entries until `incoming` fits in `capacity`.
fn evict_until_fits(inner: &mut CacheInner, incoming: usize, capacity: usize) -> u64 {
    if inner.size_bytes + incoming <= capacity {
        return 0;
    }

    let mut by_age: Vec<(String, Instant)> = inner
        .entries
        .iter()
        .map(|(key, entry)| (key.clone(), entry.last_accessed))
        .collect();
    by_age.sort_by_key(|(_, last_accessed)| *last_accessed);

    let mut evicted = 0;
    for (key, _) in by_age {
        if inner.size_bytes + incoming <= capacity {
            break;
        }
        if let Some(entry) = inner.entries.remove(&key) {
            inner.size_bytes -= entry.data.len();
            evicted += 1;
        }
    }
    evicted
}

fn compress(raw: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut decoder = GzDecoder::new(data);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(raw)
}
