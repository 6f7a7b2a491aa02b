//! The snapshot engine: one facade over fetch, cache, merge, and metrics.
//!
//! A [`MarketQuery`] names a commodity and a date. [`Engine::load_snapshot`]
//! answers it from the query cache when possible, otherwise fans out to the
//! five source artifacts concurrently, decodes and merges them, computes the
//! spatial metrics, and caches the assembled [`MarketSnapshot`].
//!
//! Boundary and enhanced features are required; a query without them fails.
//! Weights, flows, and analysis degrade instead: the snapshot is still
//! assembled, the missing piece contributes its empty default, and the
//! degradation is recorded in [`MarketSnapshot::warnings`].

mod query;
mod snapshot;

pub use query::MarketQuery;
pub use snapshot::{MarketSnapshot, SourceWarning};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheStats, CacheSweeper, QueryCache};
use crate::config::EngineConfig;
use crate::crs::CrsTransformer;
use crate::fetch::{FetchClient, FetchError, HttpFetcher, Payload, PayloadKind, ReqwestFetcher};
use crate::merge::MergeEngine;
use crate::pool::{PoolError, TaskPool};
use crate::region::RegionResolver;
use crate::sources::{
    decode_analysis, decode_features, decode_flows, decode_weights, SourceError, SourceKind,
};
use crate::spatial;
use snapshot::region_prices;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The HTTP transport could not be constructed.
    #[error("failed to initialize HTTP transport")]
    Transport(#[source] FetchError),

    /// A required source could not be fetched.
    #[error("required source '{kind}' unavailable")]
    SourceUnavailable {
        kind: SourceKind,
        #[source]
        cause: FetchError,
    },

    /// A required source was fetched but did not decode.
    #[error("required source '{kind}' malformed")]
    SourceInvalid {
        kind: SourceKind,
        #[source]
        cause: SourceError,
    },

    /// Worker-pool dispatch failed while assembling the snapshot.
    #[error("snapshot assembly failed")]
    Pool(#[source] PoolError),

    /// The cache's serialization or compression machinery failed.
    #[error("query cache failure")]
    Cache(#[from] CacheError),

    /// The engine is shut down, or the query was cancelled mid-flight.
    #[error("query cancelled")]
    Cancelled,
}

/// Spatial data integration engine.
///
/// Construction wires the fetch client, query cache with its background
/// sweeper, region resolver, coordinate transformer, merge engine, and the
/// worker pool from one [`EngineConfig`]. The engine is `Send + Sync`;
/// queries may be issued concurrently from multiple tasks.
///
/// Must be created inside a Tokio runtime: the cache sweeper is spawned at
/// construction time.
pub struct Engine<H: HttpFetcher = ReqwestFetcher> {
    config: EngineConfig,
    fetch: FetchClient<H>,
    cache: Arc<QueryCache>,
    sweeper: Mutex<Option<CacheSweeper>>,
    resolver: Arc<RegionResolver>,
    transformer: Arc<CrsTransformer>,
    merger: MergeEngine,
    pool: TaskPool,
    token: CancellationToken,
}

impl Engine {
    /// Creates an engine over a real HTTP transport.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let http = ReqwestFetcher::new(config.fetch().request_timeout())
            .map_err(EngineError::Transport)?;
        Ok(Self::with_transport(http, config))
    }
}

impl<H: HttpFetcher> Engine<H> {
    /// Creates an engine over a caller-supplied transport.
    pub fn with_transport(http: H, config: EngineConfig) -> Self {
        let cache = Arc::new(QueryCache::new(*config.cache()));
        let sweeper = CacheSweeper::spawn(Arc::clone(&cache), config.cache().sweep_interval());
        let resolver = Arc::new(RegionResolver::new());
        let transformer = Arc::new(CrsTransformer::new());
        let merger = MergeEngine::new(Arc::clone(&resolver), Arc::clone(&transformer));

        Self {
            fetch: FetchClient::new(http, *config.fetch()),
            cache,
            sweeper: Mutex::new(Some(sweeper)),
            resolver,
            transformer,
            merger,
            pool: TaskPool::new(*config.pool()),
            token: CancellationToken::new(),
            config,
        }
    }

    /// Loads the snapshot for a query, from cache or from the sources.
    pub async fn load_snapshot(&self, query: &MarketQuery) -> Result<MarketSnapshot, EngineError> {
        if self.token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let key = query.cache_key();
        if let Some(snapshot) = self.cache.get::<MarketSnapshot>(&key)? {
            debug!(%key, "snapshot served from cache");
            return Ok(snapshot);
        }

        let token = self.token.child_token();
        let base = self.config.base_url();
        let boundary_url = query.source_url(base, SourceKind::Boundary);
        let enhanced_url = query.source_url(base, SourceKind::Enhanced);
        let weights_url = query.source_url(base, SourceKind::Weights);
        let flows_url = query.source_url(base, SourceKind::Flows);
        let analysis_url = query.source_url(base, SourceKind::Analysis);

        let (boundary, enhanced, weights, flows, analysis) = tokio::join!(
            self.fetch.fetch(&boundary_url, PayloadKind::Json, token.clone()),
            self.fetch.fetch(&enhanced_url, PayloadKind::Json, token.clone()),
            self.fetch.fetch(&weights_url, PayloadKind::Json, token.clone()),
            self.fetch.fetch(&flows_url, PayloadKind::Tabular, token.clone()),
            self.fetch.fetch(&analysis_url, PayloadKind::Json, token.clone()),
        );

        let boundary = required(SourceKind::Boundary, boundary)?;
        let enhanced = required(SourceKind::Enhanced, enhanced)?;
        let boundary = decode_features(&boundary, SourceKind::Boundary)
            .map_err(|cause| EngineError::SourceInvalid {
                kind: SourceKind::Boundary,
                cause,
            })?;
        let enhanced = decode_features(&enhanced, SourceKind::Enhanced)
            .map_err(|cause| EngineError::SourceInvalid {
                kind: SourceKind::Enhanced,
                cause,
            })?;

        let mut warnings = Vec::new();
        let weights_table = degrade(
            SourceKind::Weights,
            weights,
            |payload| decode_weights(payload, &self.resolver),
            &mut warnings,
        )
        .unwrap_or_default();
        let flow_set = degrade(
            SourceKind::Flows,
            flows,
            |payload| decode_flows(payload, &self.resolver, &self.transformer),
            &mut warnings,
        )
        .unwrap_or_default();
        let analysis_doc = degrade(
            SourceKind::Analysis,
            analysis,
            |payload| decode_analysis(payload, &self.resolver),
            &mut warnings,
        )
        .unwrap_or_default();

        let merged = self
            .merger
            .merge_with_pool(
                boundary.into_features(),
                enhanced.into_features(),
                &self.pool,
                &token,
            )
            .await
            .map_err(|error| match error {
                PoolError::Cancelled { .. } => EngineError::Cancelled,
                other => EngineError::Pool(other),
            })?;

        let connectivity: BTreeMap<String, spatial::Connectivity> = merged
            .ids()
            .map(|id| {
                (
                    id.to_string(),
                    spatial::connectivity(id, &weights_table, merged.len()),
                )
            })
            .collect();
        let network = spatial::network_metrics(&merged, &flow_set.flows);
        let price_autocorrelation =
            spatial::spatial_autocorrelation(&region_prices(&merged), &weights_table);

        let snapshot = MarketSnapshot {
            query: query.clone(),
            regions: merged,
            flows: flow_set,
            analysis: analysis_doc,
            connectivity,
            network,
            price_autocorrelation,
            warnings,
        };
        self.cache.put(&key, &snapshot)?;
        info!(
            %key,
            regions = snapshot.regions.len(),
            flows = snapshot.flows.len(),
            warnings = snapshot.warnings.len(),
            "snapshot assembled"
        );
        Ok(snapshot)
    }

    /// Cache counters since engine construction.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cancels in-flight queries and stops the cache sweeper.
    ///
    /// Queries issued after shutdown fail with [`EngineError::Cancelled`].
    /// Calling shutdown twice is harmless.
    pub async fn shutdown(&self) {
        info!("engine shutting down");
        self.token.cancel();
        let sweeper = self.sweeper.lock().unwrap().take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }
    }
}

/// Maps a required-source fetch failure into the engine taxonomy.
fn required(
    kind: SourceKind,
    fetched: Result<Arc<Payload>, FetchError>,
) -> Result<Arc<Payload>, EngineError> {
    fetched.map_err(|cause| match cause {
        FetchError::Cancelled { .. } => EngineError::Cancelled,
        cause => EngineError::SourceUnavailable { kind, cause },
    })
}

/// Runs an optional source's decode, converting any failure into a warning.
fn degrade<T>(
    kind: SourceKind,
    fetched: Result<Arc<Payload>, FetchError>,
    decode: impl FnOnce(&Payload) -> Result<T, SourceError>,
    warnings: &mut Vec<SourceWarning>,
) -> Option<T> {
    let payload = match fetched {
        Ok(payload) => payload,
        Err(error) => {
            warn!(kind = %kind, error = %error, "optional source unavailable, degrading");
            warnings.push(SourceWarning::new(kind, error));
            return None;
        }
    };
    match decode(&payload) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(kind = %kind, error = %error, "optional source malformed, degrading");
            warnings.push(SourceWarning::new(kind, error));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::config::{CacheConfig, FetchConfig};

    const BOUNDARY_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[44.0, 15.2], [44.4, 15.2], [44.4, 15.6], [44.0, 15.6], [44.0, 15.2]]]},
             "properties": {"admin1Name": "Sana'a", "area_km2": 12000}},
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[44.8, 12.6], [45.2, 12.6], [45.2, 13.0], [44.8, 13.0], [44.8, 12.6]]]},
             "properties": {"admin1Name": "Aden"}},
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[43.8, 13.4], [44.2, 13.4], [44.2, 13.8], [43.8, 13.8], [43.8, 13.4]]]},
             "properties": {"admin1Name": "Ta'izz"}},
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[44.0, 13.8], [44.4, 13.8], [44.4, 14.2], [44.0, 14.2], [44.0, 13.8]]]},
             "properties": {"admin1Name": "Ibb"}}
        ]
    }"#;

    const ENHANCED_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [44.21, 15.35]},
             "properties": {"region": "SANA'A_CITY", "price": 30.0, "conflict_intensity": 0.8}},
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [45.03, 12.79]},
             "properties": {"region": "Aden", "price": 120.0}},
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [44.02, 13.58]},
             "properties": {"region": "Taizz", "price": 100.0}},
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [44.18, 13.97]},
             "properties": {"region": "Ibb", "price": 40.0}}
        ]
    }"#;

    const WEIGHTS_JSON: &str = r#"{
        "Aden": {"neighbors": ["Ta'izz"]},
        "Ta'izz": {"neighbors": ["Aden", "Ibb"]},
        "Ibb": {"neighbors": ["Ta'izz", "Sana'a"]},
        "Sana'a": {"neighbors": ["Ibb"]}
    }"#;

    const FLOWS_CSV: &str = "\
source,target,source_x,source_y,target_x,target_y,weight,price_differential,date,commodity
Aden,Ta'izz,45.03,12.79,44.02,13.58,0.8,20.0,2014-06-01,wheat
Ibb,Sana'a,44.18,13.97,44.21,15.35,0.5,10.0,2014-06-01,wheat
";

    const ANALYSIS_JSON: &str = r#"{
        "clusters": [
            {"region": "Aden", "category": "high-high", "p_value": 0.01},
            {"region": "Sana'a", "category": "low-low", "p_value": 0.03}
        ],
        "shocks": [
            {"region": "Ta'izz", "date": "2014-05-20", "magnitude": 0.35, "type": "price_surge"}
        ],
        "autocorrelation": {"moran_i": 0.42, "p_value": 0.018, "method": "permutation"}
    }"#;

    /// Transport that answers by URL fragment and counts every call.
    #[derive(Clone)]
    struct RoutedFetcher {
        routes: Arc<HashMap<&'static str, Result<Vec<u8>, FetchError>>>,
        calls: Arc<AtomicUsize>,
    }

    impl RoutedFetcher {
        fn new(routes: HashMap<&'static str, Result<Vec<u8>, FetchError>>) -> Self {
            Self {
                routes: Arc::new(routes),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HttpFetcher for RoutedFetcher {
        async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for (fragment, response) in self.routes.iter() {
                if url.contains(fragment) {
                    return response.clone();
                }
            }
            Err(FetchError::Transient {
                url: url.to_string(),
                cause: "no route".to_string(),
            })
        }
    }

    fn all_routes() -> HashMap<&'static str, Result<Vec<u8>, FetchError>> {
        HashMap::from([
            ("boundaries", Ok(BOUNDARY_GEOJSON.as_bytes().to_vec())),
            ("enhanced", Ok(ENHANCED_GEOJSON.as_bytes().to_vec())),
            ("weights", Ok(WEIGHTS_JSON.as_bytes().to_vec())),
            ("flows", Ok(FLOWS_CSV.as_bytes().to_vec())),
            ("analysis", Ok(ANALYSIS_JSON.as_bytes().to_vec())),
        ])
    }

    fn test_config() -> EngineConfig {
        EngineConfig::new()
            .with_base_url("http://mock.test/v1")
            .with_fetch(
                FetchConfig::new()
                    .with_max_retries(1)
                    .with_backoff_base(Duration::from_millis(1)),
            )
            .with_cache(CacheConfig::new().with_sweep_interval(Duration::from_secs(3600)))
    }

    fn query() -> MarketQuery {
        MarketQuery::new("wheat", NaiveDate::from_ymd_opt(2014, 6, 1).unwrap())
    }

    #[tokio::test]
    async fn test_load_snapshot_end_to_end() {
        let engine = Engine::with_transport(RoutedFetcher::new(all_routes()), test_config());

        let snapshot = engine.load_snapshot(&query()).await.unwrap();

        assert_eq!(snapshot.regions.len(), 4);
        assert!(!snapshot.is_degraded(), "warnings: {:?}", snapshot.warnings);

        let sanaa = snapshot.regions.get("sanaa").unwrap();
        assert!(sanaa.aliases.contains("SANA'A_CITY"));
        assert_eq!(sanaa.extras["price"], 30.0);
        assert_eq!(snapshot.regions.provenance.accepted_features, 8);

        assert_eq!(snapshot.flows.len(), 2);
        assert_eq!(snapshot.flows.flows[0].source, "aden");
        assert!((snapshot.network.density - 2.0 / 12.0).abs() < 1e-12);
        assert_eq!(snapshot.connectivity["taiz"].direct, 2);
        assert_eq!(snapshot.connectivity["aden"].direct, 1);

        assert_eq!(snapshot.analysis.clusters.len(), 2);
        assert_eq!(snapshot.analysis.clusters[0].region, "aden");
        assert_eq!(snapshot.analysis.shocks[0].region, "taiz");

        let moran = snapshot.price_autocorrelation.unwrap();
        assert!(
            moran.i > moran.expected,
            "corridor prices cluster, so I should exceed its null expectation"
        );
    }

    #[tokio::test]
    async fn test_second_load_is_served_from_cache() {
        let fetcher = RoutedFetcher::new(all_routes());
        let engine = Engine::with_transport(fetcher.clone(), test_config());
        assert_eq!(engine.config().base_url(), "http://mock.test/v1");

        let first = engine.load_snapshot(&query()).await.unwrap();
        assert_eq!(fetcher.call_count(), 5);

        let second = engine.load_snapshot(&query()).await.unwrap();
        assert_eq!(fetcher.call_count(), 5, "cache hit must not refetch");
        assert_eq!(first, second);
        assert_eq!(engine.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_missing_required_source_fails() {
        let mut routes = all_routes();
        routes.remove("boundaries");
        let engine = Engine::with_transport(RoutedFetcher::new(routes), test_config());

        let error = engine.load_snapshot(&query()).await.unwrap_err();
        match error {
            EngineError::SourceUnavailable { kind, .. } => {
                assert_eq!(kind, SourceKind::Boundary);
            }
            other => panic!("expected SourceUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unavailable_weights_degrade() {
        let mut routes = all_routes();
        routes.remove("weights");
        let engine = Engine::with_transport(RoutedFetcher::new(routes), test_config());

        let snapshot = engine.load_snapshot(&query()).await.unwrap();
        assert!(snapshot.is_degraded());
        assert_eq!(snapshot.warnings.len(), 1);
        assert_eq!(snapshot.warnings[0].kind, SourceKind::Weights);

        // Connectivity and autocorrelation lose their inputs but the
        // snapshot still answers.
        assert_eq!(snapshot.connectivity["taiz"].direct, 0);
        assert!(snapshot.price_autocorrelation.is_none());
        assert_eq!(snapshot.regions.len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_analysis_degrades() {
        let mut routes = all_routes();
        routes.insert("analysis", Ok(br#"{"clusters": 42}"#.to_vec()));
        let engine = Engine::with_transport(RoutedFetcher::new(routes), test_config());

        let snapshot = engine.load_snapshot(&query()).await.unwrap();
        assert_eq!(snapshot.warnings.len(), 1);
        assert_eq!(snapshot.warnings[0].kind, SourceKind::Analysis);
        assert!(snapshot.analysis.clusters.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_queries() {
        let engine = Engine::with_transport(RoutedFetcher::new(all_routes()), test_config());
        engine.shutdown().await;

        let error = engine.load_snapshot(&query()).await.unwrap_err();
        assert!(matches!(error, EngineError::Cancelled));

        // Idempotent.
        engine.shutdown().await;
    }
}
