//! Merged region records and provenance metadata.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crs::ReferenceSystem;
use crate::geometry::Geometry;
use crate::sources::SourceKind;

/// One region in the merged output.
///
/// The fixed fields are what the engine itself needs; everything else a
/// source attached lives in the open `extras` map, enhanced values
/// overriding boundary values on key collision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    /// Canonical id, unique within one merged output.
    pub id: String,
    /// Display spelling, taken from the first source that named the region.
    pub display_name: String,
    /// Raw spellings observed across sources.
    pub aliases: BTreeSet<String>,
    /// Which sources contributed, in contribution order.
    pub sources: Vec<SourceKind>,
    /// Geometry in WGS84, structurally validated.
    pub geometry: Geometry,
    /// Source-specific properties beyond the fixed fields.
    pub extras: Map<String, Value>,
}

impl RegionRecord {
    /// Records a contributing source once, preserving order.
    pub(crate) fn tag_source(&mut self, kind: SourceKind) {
        if !self.sources.contains(&kind) {
            self.sources.push(kind);
        }
    }

    /// Records a raw spelling for this region.
    pub(crate) fn add_alias(&mut self, raw: &str) {
        self.aliases.insert(raw.to_string());
    }

    /// Merges a property bag in, overriding existing keys.
    pub(crate) fn merge_extras(&mut self, properties: Map<String, Value>) {
        for (key, value) in properties {
            self.extras.insert(key, value);
        }
    }
}

/// What the merge kept, dropped, and skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeProvenance {
    /// Features that seeded or enriched a region.
    pub accepted_features: usize,
    /// Excluded region ids actually encountered in the inputs.
    pub excluded_ids: BTreeSet<String>,
    /// Features dropped because their geometry failed validation.
    pub dropped_geometries: usize,
    /// Enhanced features with no usable geometry and no boundary match.
    pub orphaned_features: usize,
    /// When the merge ran.
    pub processed_at: DateTime<Utc>,
    /// Reference system every output geometry is expressed in.
    pub reference_system: ReferenceSystem,
}

impl Default for MergeProvenance {
    fn default() -> Self {
        Self {
            accepted_features: 0,
            excluded_ids: BTreeSet::new(),
            dropped_geometries: 0,
            orphaned_features: 0,
            processed_at: Utc::now(),
            reference_system: ReferenceSystem::Wgs84,
        }
    }
}

/// The merged structure handed to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRegions {
    /// Region records keyed by canonical id.
    pub regions: BTreeMap<String, RegionRecord>,
    pub provenance: MergeProvenance,
}

impl MergedRegions {
    /// Looks up a region by canonical id.
    pub fn get(&self, id: &str) -> Option<&RegionRecord> {
        self.regions.get(id)
    }

    /// Number of merged regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the merge produced no regions.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Canonical ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }
}
