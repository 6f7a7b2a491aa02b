//! Precomputed analysis payload schema.
//!
//! Clusters, shocks, and the upstream autocorrelation summary arrive as
//! opaque results of an external analytics pipeline. The engine
//! canonicalizes their region references and filters excluded regions,
//! but never recomputes or second-guesses the statistics themselves.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{SourceError, SourceKind};
use crate::fetch::{Payload, PayloadKind};
use crate::region::RegionResolver;

/// Cluster membership from the local spatial-association analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub region: String,
    /// Cluster label, e.g. "high-high" or "not-significant".
    pub category: String,
    #[serde(default)]
    pub p_value: Option<f64>,
}

/// A detected price shock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockRecord {
    pub region: String,
    pub date: NaiveDate,
    pub magnitude: f64,
    #[serde(default, rename = "type")]
    pub shock_type: Option<String>,
}

/// Global autocorrelation summary computed upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocorrelationSummary {
    pub moran_i: f64,
    pub p_value: f64,
    #[serde(default)]
    pub method: Option<String>,
}

/// The full analysis artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDoc {
    #[serde(default)]
    pub clusters: Vec<ClusterRecord>,
    #[serde(default)]
    pub shocks: Vec<ShockRecord>,
    #[serde(default)]
    pub autocorrelation: Option<AutocorrelationSummary>,
    /// Regression diagnostics are carried through uninspected.
    #[serde(default)]
    pub diagnostics: Option<Value>,
}

/// Decodes an analysis payload and canonicalizes its region references.
///
/// Cluster and shock entries for excluded regions are dropped and
/// counted in a diagnostic; everything else passes through untouched.
pub fn decode_analysis(
    payload: &Payload,
    resolver: &RegionResolver,
) -> Result<AnalysisDoc, SourceError> {
    const KIND: SourceKind = SourceKind::Analysis;

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

    let mut doc = AnalysisDoc::deserialize(value).map_err(|e| SourceError::Schema {
        kind: KIND,
        detail: e.to_string(),
    })?;

    let mut dropped = 0usize;
    doc.clusters = doc
        .clusters
        .into_iter()
        .filter_map(|mut cluster| {
            cluster.region = resolver.normalize(&cluster.region);
            if resolver.is_excluded(&cluster.region) {
                dropped += 1;
                None
            } else {
                Some(cluster)
            }
        })
        .collect();
    doc.shocks = doc
        .shocks
        .into_iter()
        .filter_map(|mut shock| {
            shock.region = resolver.normalize(&shock.region);
            if resolver.is_excluded(&shock.region) {
                dropped += 1;
                None
            } else {
                Some(shock)
            }
        })
        .collect();

    if dropped > 0 {
        debug!(dropped, "dropped analysis records for excluded regions");
    }
    Ok(doc)
}
