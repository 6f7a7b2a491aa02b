//! Source artifact schemas and validating decoders.
//!
//! Each of the five upstream artifacts has an explicit schema and a decode
//! step at the boundary: boundary polygons, the enhanced per-region dataset,
//! the spatial-weights table, the flow table, and the precomputed analysis
//! payload. Decoding validates structure up front and re-keys every region
//! reference to its canonical id, so nothing downstream sees raw spellings
//! or excluded regions.
//!
//! A validation failure aborts that one source only; the caller decides
//! whether the query degrades or fails. Malformed individual rows inside an
//! otherwise valid table are skipped and counted, never fatal.

mod analysis;
mod feature;
mod flows;
mod weights;

pub use analysis::{
    decode_analysis, AnalysisDoc, AutocorrelationSummary, ClusterRecord, ShockRecord,
};
pub use feature::{decode_features, Feature, FeatureDoc};
pub use flows::{decode_flows, FlowRecord, FlowSet};
pub use weights::{decode_weights, WeightsTable};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::PayloadKind;

/// The five upstream artifacts the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Administrative boundary polygons, one feature per region.
    Boundary,
    /// Per-region price/conflict/residual dataset.
    Enhanced,
    /// Spatial-weights table of neighbor relationships.
    Weights,
    /// Market-to-market flow table.
    Flows,
    /// Precomputed clusters, shocks, and autocorrelation summary.
    Analysis,
}

impl SourceKind {
    /// Short name used in logs, errors, and provenance warnings.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Boundary => "boundary",
            SourceKind::Enhanced => "enhanced",
            SourceKind::Weights => "weights",
            SourceKind::Flows => "flows",
            SourceKind::Analysis => "analysis",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while decoding one source artifact.
///
/// Every variant names the source it belongs to; a failure here aborts that
/// source, not the query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The payload parsed as the wrong kind for this source.
    #[error("{kind} source arrived as {got}, expected {expected}")]
    UnexpectedPayload {
        kind: SourceKind,
        expected: PayloadKind,
        got: PayloadKind,
    },

    /// The payload does not match the source's schema.
    #[error("{kind} source does not match its schema: {detail}")]
    Schema { kind: SourceKind, detail: String },

    /// The payload parsed but fails a structural requirement.
    #[error("{kind} source failed validation: {detail}")]
    Validation { kind: SourceKind, detail: String },
}
