//! Geometry merge engine.
//!
//! Combines boundary polygons with the enhanced per-region dataset into
//! one structure keyed by canonical region id. Boundary features seed
//! the map; enhanced features enrich it, overriding property values but
//! never replacing a boundary geometry. Excluded regions are skipped
//! wherever they appear, invalid geometries are dropped and counted,
//! and the output carries provenance describing exactly what happened.
//!
//! The per-feature work (identity resolution, coordinate transformation,
//! structural validation) is independent across features, so large
//! inputs are chunked through the worker pool. Combination stays
//! sequential and boundary-first, which is what gives enhanced-over-
//! boundary override semantics their meaning.

mod record;

pub use record::{MergeProvenance, MergedRegions, RegionRecord};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::crs::CrsTransformer;
use crate::geometry::Geometry;
use crate::pool::{PoolError, TaskPool};
use crate::region::RegionResolver;
use crate::sources::{Feature, SourceKind};

/// A feature after the per-feature heavy work: identity resolved,
/// geometry transformed and validated.
#[derive(Debug)]
struct PreparedFeature {
    id: String,
    raw_name: Option<String>,
    geometry: Option<Geometry>,
    geometry_dropped: bool,
    properties: Map<String, Value>,
}

/// Merges boundary and enhanced feature sets into canonical-id records.
#[derive(Debug)]
pub struct MergeEngine {
    resolver: Arc<RegionResolver>,
    transformer: Arc<CrsTransformer>,
}

impl MergeEngine {
    /// Creates a merge engine sharing the given resolver and transformer.
    pub fn new(resolver: Arc<RegionResolver>, transformer: Arc<CrsTransformer>) -> Self {
        Self {
            resolver,
            transformer,
        }
    }

    /// Merges the two feature sets on the calling thread.
    ///
    /// Suitable for inputs below the chunking threshold; larger inputs
    /// should go through [`MergeEngine::merge_with_pool`].
    pub fn merge(&self, boundary: Vec<Feature>, enhanced: Vec<Feature>) -> MergedRegions {
        let boundary = prepare_all(boundary, &self.resolver, &self.transformer);
        let enhanced = prepare_all(enhanced, &self.resolver, &self.transformer);
        self.combine(boundary, enhanced)
    }

    /// Merges with per-feature work dispatched through the worker pool.
    ///
    /// The boundary set is fully prepared before the enhanced set, and
    /// combination is sequential, so override semantics are identical to
    /// [`MergeEngine::merge`].
    pub async fn merge_with_pool(
        &self,
        boundary: Vec<Feature>,
        enhanced: Vec<Feature>,
        pool: &TaskPool,
        token: &CancellationToken,
    ) -> Result<MergedRegions, PoolError> {
        let resolver = Arc::clone(&self.resolver);
        let transformer = Arc::clone(&self.transformer);
        let boundary = pool
            .run_chunked("merge.boundary", token, boundary, move |chunk| {
                prepare_all(chunk, &resolver, &transformer)
            })
            .await?;

        let resolver = Arc::clone(&self.resolver);
        let transformer = Arc::clone(&self.transformer);
        let enhanced = pool
            .run_chunked("merge.enhanced", token, enhanced, move |chunk| {
                prepare_all(chunk, &resolver, &transformer)
            })
            .await?;

        Ok(self.combine(boundary, enhanced))
    }

    fn combine(
        &self,
        boundary: Vec<PreparedFeature>,
        enhanced: Vec<PreparedFeature>,
    ) -> MergedRegions {
        let mut regions = BTreeMap::new();
        let mut provenance = MergeProvenance::default();

        for prepared in boundary {
            self.apply(&mut regions, &mut provenance, prepared, SourceKind::Boundary);
        }
        for prepared in enhanced {
            self.apply(&mut regions, &mut provenance, prepared, SourceKind::Enhanced);
        }

        provenance.processed_at = Utc::now();
        debug!(
            regions = regions.len(),
            accepted = provenance.accepted_features,
            dropped_geometries = provenance.dropped_geometries,
            orphaned = provenance.orphaned_features,
            "merge complete"
        );
        MergedRegions {
            regions,
            provenance,
        }
    }

    fn apply(
        &self,
        regions: &mut BTreeMap<String, RegionRecord>,
        provenance: &mut MergeProvenance,
        prepared: PreparedFeature,
        kind: SourceKind,
    ) {
        if prepared.geometry_dropped {
            provenance.dropped_geometries += 1;
        }
        if self.resolver.is_excluded(&prepared.id) {
            provenance.excluded_ids.insert(prepared.id);
            return;
        }

        match regions.get_mut(&prepared.id) {
            Some(record) => {
                record.merge_extras(prepared.properties);
                if let Some(raw) = &prepared.raw_name {
                    record.add_alias(raw);
                }
                record.tag_source(kind);
                provenance.accepted_features += 1;
            }
            None => match prepared.geometry {
                Some(geometry) => {
                    let display_name = prepared
                        .raw_name
                        .clone()
                        .unwrap_or_else(|| prepared.id.clone());
                    let mut aliases = BTreeSet::new();
                    if let Some(raw) = prepared.raw_name {
                        aliases.insert(raw);
                    }
                    regions.insert(
                        prepared.id.clone(),
                        RegionRecord {
                            id: prepared.id,
                            display_name,
                            aliases,
                            sources: vec![kind],
                            geometry,
                            extras: prepared.properties,
                        },
                    );
                    provenance.accepted_features += 1;
                }
                None => {
                    provenance.orphaned_features += 1;
                    warn!(
                        region = %prepared.id,
                        source = %kind,
                        "dropping feature with no usable geometry and no existing entry"
                    );
                }
            },
        }
    }
}

fn prepare_all(
    features: Vec<Feature>,
    resolver: &RegionResolver,
    transformer: &CrsTransformer,
) -> Vec<PreparedFeature> {
    features
        .into_iter()
        .map(|feature| prepare(feature, resolver, transformer))
        .collect()
}

fn prepare(
    feature: Feature,
    resolver: &RegionResolver,
    transformer: &CrsTransformer,
) -> PreparedFeature {
    let raw_name = feature.raw_region_name().map(str::to_string);
    let id = resolver.normalize(raw_name.as_deref().unwrap_or(""));
    let (geometry, properties) = feature.into_parts();

    let (geometry, geometry_dropped) = match geometry {
        None => (None, false),
        Some(original) => {
            let transformed = transformer.transform_geometry(&original);
            match transformed.validate() {
                Ok(()) => (Some(transformed), false),
                Err(error) => {
                    warn!(region = %id, error = %error, "dropping structurally invalid geometry");
                    (None, true)
                }
            }
        }
    };

    PreparedFeature {
        id,
        raw_name,
        geometry,
        geometry_dropped,
        properties,
    }
}
