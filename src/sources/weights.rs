//! Spatial-weights table schema.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use super::{SourceError, SourceKind};
use crate::fetch::{Payload, PayloadKind};
use crate::region::RegionResolver;

/// Wire form of one region's entry.
#[derive(Debug, Clone, Deserialize)]
struct NeighborEntry {
    neighbors: Vec<String>,
}

/// Neighbor relationships keyed by canonical region id.
///
/// Built by [`decode_weights`]; every key and neighbor has already been
/// normalized, excluded regions are gone, and self-references and
/// duplicates are dropped. Neighbor lists are sorted so equal tables
/// compare equal regardless of wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightsTable {
    regions: HashMap<String, Vec<String>>,
}

impl WeightsTable {
    /// Builds a table from already-canonical entries (used by tests and
    /// the metrics calculator's own fixtures).
    pub fn from_entries<I, S, N>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<N>)>,
        S: Into<String>,
        N: Into<String>,
    {
        let mut regions = HashMap::new();
        for (region, neighbors) in entries {
            let mut neighbors: Vec<String> = neighbors.into_iter().map(Into::into).collect();
            neighbors.sort();
            neighbors.dedup();
            regions.insert(region.into(), neighbors);
        }
        Self { regions }
    }

    /// Neighbors of a region; empty when the region is absent.
    pub fn neighbors(&self, region: &str) -> &[String] {
        self.regions
            .get(region)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether the table has an entry for the region.
    pub fn contains(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    /// Iterator over the region ids in the table.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Number of regions with an entry.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Total number of directed neighbor links.
    pub fn total_links(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }
}

/// Decodes and canonicalizes a spatial-weights payload.
///
/// Keys and neighbor names are normalized; excluded regions are removed
/// on both sides. Two raw keys resolving to the same canonical id have
/// their neighbor lists merged.
pub fn decode_weights(
    payload: &Payload,
    resolver: &RegionResolver,
) -> Result<WeightsTable, SourceError> {
    const KIND: SourceKind = SourceKind::Weights;

    let value = match payload.as_json() {
        Some(value) => value,
        None => {
            return Err(SourceError::UnexpectedPayload {
                kind: KIND,
                expected: PayloadKind::Json,
                got: payload.kind(),
            });
        }
    };

    let wire: HashMap<String, NeighborEntry> =
        HashMap::deserialize(value).map_err(|e| SourceError::Schema {
            kind: KIND,
            detail: e.to_string(),
        })?;

    if wire.is_empty() {
        return Err(SourceError::Validation {
            kind: KIND,
            detail: "weights table has no regions".to_string(),
        });
    }

    let mut regions: HashMap<String, Vec<String>> = HashMap::new();
    let mut dropped = 0usize;
    for (raw_region, entry) in wire {
        let region = resolver.normalize(&raw_region);
        if resolver.is_excluded(&region) {
            dropped += 1;
            continue;
        }

        let slot = regions.entry(region.clone()).or_default();
        for raw_neighbor in entry.neighbors {
            let neighbor = resolver.normalize(&raw_neighbor);
            if neighbor == region || resolver.is_excluded(&neighbor) {
                dropped += 1;
                continue;
            }
            slot.push(neighbor);
        }
    }
    for neighbors in regions.values_mut() {
        neighbors.sort();
        neighbors.dedup();
    }

    if dropped > 0 {
        debug!(dropped, "dropped excluded or self-referencing weight links");
    }
    Ok(WeightsTable { regions })
}
