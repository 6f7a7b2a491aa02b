//! Feature-collection schema shared by the boundary and enhanced sources.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{SourceError, SourceKind};
use crate::fetch::{Payload, PayloadKind};
use crate::geometry::Geometry;

/// Property keys probed, in order, for a feature's raw region name.
///
/// Boundary exports and the enhanced dataset disagree on which key carries
/// the name; the first present string wins.
const NAME_KEYS: &[&str] = &[
    "region",
    "region_name",
    "admin1Name",
    "ADM1_EN",
    "governorate",
    "name",
];

/// A feature collection as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureDoc {
    #[serde(rename = "type", default)]
    doc_type: Option<String>,
    features: Vec<Feature>,
}

impl FeatureDoc {
    /// The features in document order.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Consumes the document, yielding its features.
    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    /// Number of features in the document.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the document carries no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// One feature: optional geometry plus a free-form property bag.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

impl Feature {
    /// Builds a feature directly, bypassing the wire format.
    pub fn new(geometry: Option<Geometry>, properties: Map<String, Value>) -> Self {
        let properties = if properties.is_empty() {
            None
        } else {
            Some(properties)
        };
        Self {
            geometry,
            properties,
        }
    }

    /// The feature's geometry, if it carries one.
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// The raw region name, taken from the first known property key
    /// holding a string.
    pub fn raw_region_name(&self) -> Option<&str> {
        let properties = self.properties.as_ref()?;
        NAME_KEYS
            .iter()
            .find_map(|key| properties.get(*key).and_then(Value::as_str))
    }

    /// Consumes the feature, yielding geometry and properties.
    ///
    /// A missing or `null` property bag becomes an empty map.
    pub fn into_parts(self) -> (Option<Geometry>, Map<String, Value>) {
        (self.geometry, self.properties.unwrap_or_default())
    }
}

/// Decodes and validates a feature-collection payload.
///
/// The payload must be JSON, carry the `FeatureCollection` type tag when it
/// declares one at all, and contain at least one feature. Per-feature
/// problems (missing name, invalid geometry) are left to the merge step,
/// which drops and counts them.
pub fn decode_features(payload: &Payload, kind: SourceKind) -> Result<FeatureDoc, SourceError> {
    let value = match payload.as_json() {
        Some(value) => value,
        None => {
            return Err(SourceError::UnexpectedPayload {
                kind,
                expected: PayloadKind::Json,
                got: payload.kind(),
            });
        }
    };

    let doc = FeatureDoc::deserialize(value).map_err(|e| SourceError::Schema {
        kind,
        detail: e.to_string(),
    })?;

    if let Some(tag) = &doc.doc_type {
        if tag != "FeatureCollection" {
            return Err(SourceError::Validation {
                kind,
                detail: format!("unexpected document type {:?}", tag),
            });
        }
    }
    if doc.features.is_empty() {
        return Err(SourceError::Validation {
            kind,
            detail: "document contains no features".to_string(),
        });
    }
    Ok(doc)
}
