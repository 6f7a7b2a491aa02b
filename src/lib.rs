//! MarketMesh - spatial data integration for regional commodity markets
//!
//! This library assembles market snapshots for Yemen's governorate-level
//! commodity markets from heterogeneous public artifacts: administrative
//! boundary polygons, enhanced per-region datasets, spatial weights, market
//! flow tables, and upstream analysis results. Region names are resolved to
//! canonical identifiers, coordinates are normalized to WGS84, and each
//! assembled snapshot is cached in memory with TTL and LRU eviction.
//!
//! # High-Level API
//!
//! For most use cases, the [`engine`] module provides a facade over the
//! whole pipeline:
//!
//! ```ignore
//! use chrono::NaiveDate;
//! use marketmesh::config::EngineConfig;
//! use marketmesh::engine::{Engine, MarketQuery};
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! let query = MarketQuery::new("wheat", NaiveDate::from_ymd_opt(2014, 6, 1).unwrap());
//!
//! let snapshot = engine.load_snapshot(&query).await?;
//! println!(
//!     "{} regions, network density {:.3}",
//!     snapshot.regions.len(),
//!     snapshot.network.density,
//! );
//! ```

pub mod cache;
pub mod config;
pub mod crs;
pub mod engine;
pub mod fetch;
pub mod geometry;
pub mod logging;
pub mod merge;
pub mod pool;
pub mod region;
pub mod sources;
pub mod spatial;

/// Version of the MarketMesh library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
