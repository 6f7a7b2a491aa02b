//! Configuration types for engine components.
//!
//! This module provides structured configuration objects that group related
//! parameters together. Each struct covers one concern (fetching, caching,
//! pooling) so components depend on the config they actually use rather than
//! on raw parameter lists.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use marketmesh::config::{CacheConfig, EngineConfig, FetchConfig};
//!
//! let config = EngineConfig::new()
//!     .with_fetch(FetchConfig::new().with_max_retries(5))
//!     .with_cache(CacheConfig::new().with_ttl(Duration::from_secs(30 * 60)));
//! assert_eq!(config.fetch().max_retries(), 5);
//! ```

mod cache;
pub mod defaults;
mod fetch;
mod pool;

pub use cache::CacheConfig;
pub use fetch::FetchConfig;
pub use pool::PoolConfig;

/// Top-level engine configuration.
///
/// Bundles the per-component configs so the engine can be constructed from a
/// single value. Each section has its own builder; this type composes them
/// and adds the base endpoint the source artifacts are served under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    fetch: FetchConfig,
    cache: CacheConfig,
    pool: PoolConfig,
    base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            pool: PoolConfig::default(),
            base_url: defaults::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create an engine configuration with default sections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the fetch section.
    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Replace the cache section.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the pool section.
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set the base endpoint for source artifacts.
    ///
    /// A trailing slash is trimmed so URL assembly is uniform.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut url = base_url.into();
        while url.ends_with('/') {
            url.pop();
        }
        self.base_url = url;
        self
    }

    /// Get the fetch section.
    pub fn fetch(&self) -> &FetchConfig {
        &self.fetch
    }

    /// Get the cache section.
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    /// Get the pool section.
    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    /// Get the base endpoint for source artifacts.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
