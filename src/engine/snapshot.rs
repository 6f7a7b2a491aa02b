//! The assembled snapshot type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::query::MarketQuery;
use crate::merge::MergedRegions;
use crate::sources::{AnalysisDoc, FlowSet, SourceKind};
use crate::spatial::{Connectivity, Moran, NetworkMetrics};

/// Property keys probed for a region's commodity price, in order.
const PRICE_KEYS: &[&str] = &["price", "avg_price", "mean_price"];

/// A source that could not contribute to the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWarning {
    /// Which artifact degraded.
    pub kind: SourceKind,
    /// Human-readable cause.
    pub detail: String,
}

impl SourceWarning {
    pub(crate) fn new(kind: SourceKind, cause: impl ToString) -> Self {
        Self {
            kind,
            detail: cause.to_string(),
        }
    }
}

/// Everything one query produces: merged regions, flows, upstream
/// analysis, computed metrics, and the degradation record.
///
/// Snapshots serialize losslessly, which is what the query cache stores.
/// Merge provenance travels inside [`MergedRegions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// The query this snapshot answers.
    pub query: MarketQuery,
    /// Canonical region records with provenance.
    pub regions: MergedRegions,
    /// Accepted market-to-market flows.
    pub flows: FlowSet,
    /// Upstream cluster/shock/autocorrelation results, default when the
    /// analysis source degraded.
    pub analysis: AnalysisDoc,
    /// Per-region connectivity keyed by canonical id.
    pub connectivity: BTreeMap<String, Connectivity>,
    /// Whole-network flow statistics.
    pub network: NetworkMetrics,
    /// Moran's I over per-region prices, when defined.
    pub price_autocorrelation: Option<Moran>,
    /// Sources that failed to contribute.
    pub warnings: Vec<SourceWarning>,
}

impl MarketSnapshot {
    /// Whether any source degraded while assembling this snapshot.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Extracts per-region prices from merged record properties.
///
/// Regions without a numeric price under any known key are left out, so
/// the autocorrelation runs over the observed subset.
pub(crate) fn region_prices(merged: &MergedRegions) -> BTreeMap<String, f64> {
    merged
        .regions
        .iter()
        .filter_map(|(id, record)| {
            PRICE_KEYS
                .iter()
                .find_map(|key| record.extras.get(*key).and_then(Value::as_f64))
                .map(|price| (id.clone(), price))
        })
        .collect()
}
