//! Coordinate reference system detection and transformation.
//!
//! Source payloads mix geographic WGS84 pairs with two metre-scale projected
//! systems, usually without declaring which. This module classifies a pair
//! by magnitude, converts projected pairs to WGS84, and walks whole
//! geometries applying the conversion to every vertex. Transformation never
//! fails: already-geographic or unclassifiable pairs pass through unchanged.

mod projection;
mod types;

pub use types::{
    ReferenceSystem, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON, PROJECTED_MAX_NORTHING,
    PROJECTED_MIN_NORTHING, TM_MAX_EASTING, TM_MIN_EASTING, UTM_MAX_EASTING, UTM_MIN_EASTING,
};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::geometry::{Geometry, Position, Ring};
use projection::TmParameters;

/// Classifies a coordinate pair by the magnitude windows each system
/// occupies over the country's extent.
///
/// Degree-scale values are geographic; metre-scale values fall into one of
/// two disjoint easting windows. Anything else is `Unknown`.
pub fn classify(x: f64, y: f64) -> ReferenceSystem {
    if (MIN_LON..=MAX_LON).contains(&x) && (MIN_LAT..=MAX_LAT).contains(&y) {
        return ReferenceSystem::Wgs84;
    }
    if (PROJECTED_MIN_NORTHING..=PROJECTED_MAX_NORTHING).contains(&y) {
        if (UTM_MIN_EASTING..UTM_MAX_EASTING).contains(&x) {
            return ReferenceSystem::Utm38N;
        }
        if (TM_MIN_EASTING..=TM_MAX_EASTING).contains(&x) {
            return ReferenceSystem::YemenTm;
        }
    }
    ReferenceSystem::Unknown
}

/// Memoization key: exact bit patterns of the pair plus the source system.
type MemoKey = (u64, u64, ReferenceSystem);

/// Converts coordinate pairs and geometries into WGS84.
///
/// Polygon rings in boundary files share vertices heavily, so converted
/// pairs are memoized by exact bit pattern; repeat vertices cost one map
/// lookup instead of a series evaluation.
#[derive(Debug, Default)]
pub struct CrsTransformer {
    memo: DashMap<MemoKey, Position>,
}

impl CrsTransformer {
    /// Creates a transformer with an empty memo table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts one pair to WGS84.
    ///
    /// When `from` is `None` the pair is classified first. WGS84 input is
    /// returned unchanged (the conversion is idempotent), and unclassifiable
    /// input is passed through with a trace diagnostic rather than an error.
    pub fn transform_point(&self, x: f64, y: f64, from: Option<ReferenceSystem>) -> Position {
        let system = from.unwrap_or_else(|| classify(x, y));
        match system {
            ReferenceSystem::Wgs84 => [x, y],
            ReferenceSystem::Unknown => {
                trace!(x, y, "unclassifiable pair passed through untransformed");
                [x, y]
            }
            ReferenceSystem::Utm38N => self.memoized(x, y, system, &projection::UTM_ZONE_38N),
            ReferenceSystem::YemenTm => self.memoized(x, y, system, &projection::YEMEN_TM),
        }
    }

    /// Converts every vertex of a geometry to WGS84.
    ///
    /// Dispatches on the geometry kind; kinds the engine does not process
    /// are returned untouched with a diagnostic.
    pub fn transform_geometry(&self, geometry: &Geometry) -> Geometry {
        match geometry {
            Geometry::Point { coordinates } => Geometry::Point {
                coordinates: self.transform_position(*coordinates),
            },
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: coordinates.iter().map(|r| self.transform_ring(r)).collect(),
            },
            Geometry::MultiPolygon { coordinates } => Geometry::MultiPolygon {
                coordinates: coordinates
                    .iter()
                    .map(|polygon| polygon.iter().map(|r| self.transform_ring(r)).collect())
                    .collect(),
            },
            Geometry::Unsupported(_) => {
                debug!(kind = %geometry.kind(), "unsupported geometry kind passed through");
                geometry.clone()
            }
        }
    }

    /// Number of distinct pairs converted so far.
    pub fn memoized_pairs(&self) -> usize {
        self.memo.len()
    }

    fn transform_position(&self, position: Position) -> Position {
        let [x, y] = position;
        self.transform_point(x, y, None)
    }

    fn transform_ring(&self, ring: &Ring) -> Ring {
        ring.iter().map(|p| self.transform_position(*p)).collect()
    }

    fn memoized(
        &self,
        x: f64,
        y: f64,
        system: ReferenceSystem,
        params: &TmParameters,
    ) -> Position {
        let key = (x.to_bits(), y.to_bits(), system);
        if let Some(hit) = self.memo.get(&key) {
            return *hit;
        }
        let (lon, lat) = projection::inverse_transverse_mercator(x, y, params);
        let pair = [lon, lat];
        self.memo.insert(key, pair);
        pair
    }
}
