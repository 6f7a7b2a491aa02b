//! Reference-system type definitions and classification bounds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// WGS84 longitude/latitude limits.
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Easting window for UTM zone 38N values over the Yemeni extent.
pub const UTM_MIN_EASTING: f64 = 100_000.0;
pub const UTM_MAX_EASTING: f64 = 1_000_000.0;

/// Easting window for the national Transverse Mercator grid, whose large
/// false easting puts it well clear of UTM values.
pub const TM_MIN_EASTING: f64 = 1_000_000.0;
pub const TM_MAX_EASTING: f64 = 2_500_000.0;

/// Northing window shared by both projected systems (latitudes ~11 to 20°N).
pub const PROJECTED_MIN_NORTHING: f64 = 1_100_000.0;
pub const PROJECTED_MAX_NORTHING: f64 = 2_300_000.0;

/// A coordinate reference system the engine can recognize.
///
/// `Unknown` marks pairs whose magnitudes match none of the expected
/// windows; such pairs are passed through untransformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceSystem {
    /// Geographic longitude/latitude in degrees, the canonical output system.
    #[serde(rename = "WGS84")]
    Wgs84,
    /// UTM zone 38N metres (EPSG:32638).
    #[serde(rename = "UTM38N")]
    Utm38N,
    /// National Transverse Mercator grid metres.
    #[serde(rename = "YemenTM")]
    YemenTm,
    /// Unclassifiable input.
    #[serde(rename = "unknown")]
    Unknown,
}

impl fmt::Display for ReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReferenceSystem::Wgs84 => "WGS84",
            ReferenceSystem::Utm38N => "UTM38N",
            ReferenceSystem::YemenTm => "YemenTM",
            ReferenceSystem::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}
