//! Geometry primitives shared across the engine.
//!
//! Geometries arrive as GeoJSON-style objects inside boundary and enhanced
//! source payloads. This module defines the typed representation, the
//! structural checks applied before a geometry is accepted into a merged
//! feature, and the per-feature error type those checks produce.
//!
//! Geometry kinds the engine does not process (anything other than `Point`,
//! `Polygon`, and `MultiPolygon`) are carried through untouched so the
//! payload survives a round-trip; callers log them and move on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single coordinate pair in `[x, y]` order, matching the wire format.
pub type Position = [f64; 2];

/// A sequence of positions forming one polygon ring.
pub type Ring = Vec<Position>;

/// Errors raised by structural geometry validation.
///
/// These are per-feature conditions: the offending feature is dropped and
/// counted, never fatal to the batch it arrived in.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A polygon carried no rings at all.
    #[error("polygon has no rings")]
    EmptyPolygon,

    /// A ring at the given index contained no positions.
    #[error("ring {index} is empty")]
    EmptyRing { index: usize },

    /// A coordinate was NaN or infinite.
    #[error("non-finite coordinate [{x}, {y}]")]
    NonFiniteCoordinate { x: f64, y: f64 },
}

/// A geometry attached to a source feature.
///
/// Serializes to and from the GeoJSON object form
/// (`{"type": "Point", "coordinates": [...]}`). Kinds outside the three the
/// engine understands deserialize into [`Geometry::Unsupported`], preserving
/// the original JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// A single coordinate pair.
    Point { coordinates: Position },
    /// One outer ring plus zero or more holes.
    Polygon { coordinates: Vec<Ring> },
    /// A set of polygons, each with its own rings.
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    /// Any other geometry kind, carried through untouched.
    #[serde(untagged)]
    Unsupported(serde_json::Value),
}

impl Geometry {
    /// The kind name used in log diagnostics.
    pub fn kind(&self) -> &str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
            Geometry::Unsupported(value) => value
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("unknown"),
        }
    }

    /// Checks the structure a merged feature requires.
    ///
    /// Polygons must carry at least one ring, every ring must be non-empty,
    /// and every coordinate must be finite. Unsupported kinds pass; the
    /// engine never inspects their interior.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Geometry::Point { coordinates } => validate_position(coordinates),
            Geometry::Polygon { coordinates } => validate_rings(coordinates),
            Geometry::MultiPolygon { coordinates } => {
                if coordinates.is_empty() {
                    return Err(GeometryError::EmptyPolygon);
                }
                for polygon in coordinates {
                    validate_rings(polygon)?;
                }
                Ok(())
            }
            Geometry::Unsupported(_) => Ok(()),
        }
    }
}

fn validate_rings(rings: &[Ring]) -> Result<(), GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::EmptyPolygon);
    }
    for (index, ring) in rings.iter().enumerate() {
        if ring.is_empty() {
            return Err(GeometryError::EmptyRing { index });
        }
        for position in ring {
            validate_position(position)?;
        }
    }
    Ok(())
}

fn validate_position(position: &Position) -> Result<(), GeometryError> {
    let [x, y] = *position;
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::NonFiniteCoordinate { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_ring() -> Ring {
        vec![[44.0, 15.0], [44.1, 15.0], [44.1, 15.1], [44.0, 15.1], [44.0, 15.0]]
    }

    #[test]
    fn test_point_round_trip() {
        let geometry = Geometry::Point {
            coordinates: [44.2, 15.35],
        };
        let json = serde_json::to_string(&geometry).unwrap();
        assert!(json.contains("\"type\":\"Point\""));
        let back: Geometry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, geometry);
    }

    #[test]
    fn test_polygon_deserializes_from_geojson_form() {
        let json = r#"{"type":"Polygon","coordinates":[[[44.0,15.0],[44.1,15.0],[44.05,15.1],[44.0,15.0]]]}"#;
        let geometry: Geometry = serde_json::from_str(json).unwrap();
        match geometry {
            Geometry::Polygon { coordinates } => {
                assert_eq!(coordinates.len(), 1);
                assert_eq!(coordinates[0].len(), 4);
            }
            other => panic!("expected Polygon, got {}", other.kind()),
        }
    }

    #[test]
    fn test_unsupported_kind_preserved() {
        let json = r#"{"type":"LineString","coordinates":[[44.0,15.0],[45.0,16.0]]}"#;
        let geometry: Geometry = serde_json::from_str(json).unwrap();
        assert_eq!(geometry.kind(), "LineString");
        // Round-trip keeps the original object intact.
        let back = serde_json::to_value(&geometry).unwrap();
        assert_eq!(back["type"], "LineString");
        assert_eq!(back["coordinates"][1][0], 45.0);
    }

    #[test]
    fn test_validate_accepts_closed_square() {
        let geometry = Geometry::Polygon {
            coordinates: vec![square_ring()],
        };
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_polygon() {
        let geometry = Geometry::Polygon {
            coordinates: vec![],
        };
        assert_eq!(geometry.validate(), Err(GeometryError::EmptyPolygon));
    }

    #[test]
    fn test_validate_rejects_empty_ring() {
        let geometry = Geometry::Polygon {
            coordinates: vec![square_ring(), vec![]],
        };
        assert_eq!(geometry.validate(), Err(GeometryError::EmptyRing { index: 1 }));
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let geometry = Geometry::Point {
            coordinates: [f64::NAN, 15.0],
        };
        assert!(matches!(
            geometry.validate(),
            Err(GeometryError::NonFiniteCoordinate { .. })
        ));
    }

    #[test]
    fn test_validate_multi_polygon_checks_every_part() {
        let geometry = Geometry::MultiPolygon {
            coordinates: vec![vec![square_ring()], vec![]],
        };
        assert_eq!(geometry.validate(), Err(GeometryError::EmptyPolygon));
    }

    #[test]
    fn test_unsupported_passes_validation() {
        let geometry = Geometry::Unsupported(serde_json::json!({
            "type": "GeometryCollection",
            "geometries": []
        }));
        assert!(geometry.validate().is_ok());
    }
}
