//! Cache statistics tracking and reporting.

use std::time::Instant;

/// Cache statistics for monitoring and debugging.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub insertions: u64,
    pub compressed_entries: u64,
    pub size_bytes: usize,
    pub entry_count: usize,
    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self {
            hits: 0,
            misses: 0,
            expirations: 0,
            evictions: 0,
            insertions: 0,
            compressed_entries: 0,
            size_bytes: 0,
            entry_count: 0,
            created_at: Instant::now(),
        }
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get the uptime duration since statistics started.
    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Record a cache hit.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Record a cache miss.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Record entries dropped because their TTL elapsed.
    pub fn record_expirations(&mut self, count: u64) {
        self.expirations += count;
    }

    /// Record entries evicted to make room.
    pub fn record_evictions(&mut self, count: u64) {
        self.evictions += count;
    }

    /// Record a stored entry, noting whether it was compressed.
    pub fn record_insertion(&mut self, compressed: bool) {
        self.insertions += 1;
        if compressed {
            self.compressed_entries += 1;
        }
    }

    /// Update size metrics after a mutation.
    pub fn update_size(&mut self, size_bytes: usize, entry_count: usize) {
        self.size_bytes = size_bytes;
        self.entry_count = entry_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zeroed() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.entry_count, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.hits = 75;
        stats.misses = 25;
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_record_operations() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_expirations(2);
        stats.record_evictions(3);
        stats.record_insertion(true);
        stats.record_insertion(false);

        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 2);
        assert_eq!(stats.evictions, 3);
        assert_eq!(stats.insertions, 2);
        assert_eq!(stats.compressed_entries, 1);
    }

    #[test]
    fn test_update_size() {
        let mut stats = CacheStats::new();
        stats.update_size(4096, 3);
        assert_eq!(stats.size_bytes, 4096);
        assert_eq!(stats.entry_count, 3);
    }

    #[test]
    fn test_uptime_increases() {
        let stats = CacheStats::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(stats.uptime().as_millis() >= 10);
    }
}
