//! Integration tests for end-to-end snapshot assembly.
//!
//! These tests run the engine facade over a scripted HTTP transport:
//! - full assembly from all five source artifacts
//! - repeat queries served from the cache without refetching
//! - graceful degradation when an optional source fails
//! - projected enhanced coordinates normalized into the geographic frame
//! - shutdown rejecting further queries

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use marketmesh::config::{CacheConfig, EngineConfig, FetchConfig};
use marketmesh::engine::{Engine, EngineError, MarketQuery};
use marketmesh::fetch::{FetchError, HttpFetcher};
use marketmesh::geometry::Geometry;
use marketmesh::sources::SourceKind;

// ============================================================================
// Test Helpers
// ============================================================================

const BOUNDARY_GEOJSON: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature",
         "geometry": {"type": "Polygon", "coordinates": [[[44.0, 15.2], [44.4, 15.2], [44.4, 15.6], [44.0, 15.6], [44.0, 15.2]]]},
         "properties": {"admin1Name": "Sana'a"}},
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

/// Dhamar appears only in the enhanced dataset, with raw UTM coordinates.
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
         "properties": {"region": "Ibb", "price": 40.0}},
        {"type": "Feature",
         "geometry": {"type": "Point", "coordinates": [435600.0, 1609400.0]},
         "properties": {"region": "Dhamar", "price": 55.0}}
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
        {"region": "Aden", "category": "high-high", "p_value": 0.01}
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

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn test_full_snapshot_assembly() {
    let engine = Engine::with_transport(RoutedFetcher::new(all_routes()), test_config());

    let snapshot = engine.load_snapshot(&query()).await.unwrap();

    assert_eq!(snapshot.regions.len(), 5);
    assert!(!snapshot.is_degraded(), "warnings: {:?}", snapshot.warnings);
    assert_eq!(snapshot.regions.provenance.accepted_features, 9);

    // Boundary and enhanced rows for the capital collapse into one record.
    let sanaa = snapshot.regions.get("sanaa").unwrap();
    assert!(sanaa.aliases.contains("SANA'A_CITY"));
    assert_eq!(sanaa.geometry.kind(), "Polygon");
    assert_eq!(sanaa.extras["price"], 30.0);

    // Flows and analysis speak canonical ids.
    assert_eq!(snapshot.flows.len(), 2);
    assert_eq!(snapshot.flows.flows[0].source, "aden");
    assert_eq!(snapshot.flows.flows[1].target, "sanaa");
    assert_eq!(snapshot.analysis.clusters[0].region, "aden");
    assert_eq!(snapshot.analysis.shocks[0].region, "taiz");

    // Metrics over five regions and two observed flows.
    assert!((snapshot.network.density - 2.0 / 20.0).abs() < 1e-12);
    assert_eq!(snapshot.connectivity["taiz"].direct, 2);
    assert_eq!(snapshot.connectivity["dhamar"].direct, 0);

    let moran = snapshot.price_autocorrelation.unwrap();
    assert!(moran.i > moran.expected, "corridor prices cluster spatially");
}

#[tokio::test]
async fn test_repeat_query_served_from_cache() {
    let fetcher = RoutedFetcher::new(all_routes());
    let engine = Engine::with_transport(fetcher.clone(), test_config());

    let first = engine.load_snapshot(&query()).await.unwrap();
    assert_eq!(fetcher.call_count(), 5, "one call per source artifact");

    let second = engine.load_snapshot(&query()).await.unwrap();
    assert_eq!(fetcher.call_count(), 5, "cache hit must not refetch");
    assert_eq!(first, second, "cached snapshot round-trips losslessly");

    let stats = engine.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_broken_flows_degrade_gracefully() {
    let mut routes = all_routes();
    routes.remove("flows");
    let engine = Engine::with_transport(RoutedFetcher::new(routes), test_config());

    let snapshot = engine.load_snapshot(&query()).await.unwrap();

    assert!(snapshot.is_degraded());
    assert_eq!(snapshot.warnings.len(), 1);
    assert_eq!(snapshot.warnings[0].kind, SourceKind::Flows);

    assert!(snapshot.flows.is_empty());
    assert_eq!(snapshot.network.density, 0.0);

    // Everything not derived from flows is still present.
    assert_eq!(snapshot.regions.len(), 5);
    assert_eq!(snapshot.connectivity["taiz"].direct, 2);
    assert!(snapshot.price_autocorrelation.is_some());
}

#[tokio::test]
async fn test_projected_enhanced_point_normalized() {
    let engine = Engine::with_transport(RoutedFetcher::new(all_routes()), test_config());

    let snapshot = engine.load_snapshot(&query()).await.unwrap();

    // Dhamar has no boundary polygon, so its enhanced point survives, and
    // its raw easting/northing pair must come out as longitude/latitude.
    let dhamar = snapshot.regions.get("dhamar").unwrap();
    match dhamar.geometry {
        Geometry::Point { coordinates: [lon, lat] } => {
            assert!((41.0..55.0).contains(&lon), "longitude {} not geographic", lon);
            assert!((11.0..20.0).contains(&lat), "latitude {} not geographic", lat);
        }
        ref other => panic!("expected Point, got {:?}", other),
    }
}

#[tokio::test]
async fn test_shutdown_rejects_further_queries() {
    let engine = Engine::with_transport(RoutedFetcher::new(all_routes()), test_config());

    engine.shutdown().await;

    let error = engine.load_snapshot(&query()).await.unwrap_err();
    assert!(matches!(error, EngineError::Cancelled));
}
