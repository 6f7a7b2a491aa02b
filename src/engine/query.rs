//! Query identity and source-URL assembly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::sources::SourceKind;

/// One market snapshot request: a commodity on an observation date.
///
/// The commodity is normalized on construction so `"Wheat "` and
/// `"wheat"` address the same cache entry and the same source URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketQuery {
    commodity: String,
    date: NaiveDate,
}

impl MarketQuery {
    /// Creates a query for a commodity on a date.
    pub fn new(commodity: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            commodity: commodity.into().trim().to_lowercase(),
            date,
        }
    }

    /// The normalized commodity name.
    pub fn commodity(&self) -> &str {
        &self.commodity
    }

    /// The observation date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Cache key for the assembled snapshot.
    pub fn cache_key(&self) -> String {
        format!("snapshot:{}:{}", self.commodity, self.date)
    }

    /// URL of one source artifact under the configured base endpoint.
    ///
    /// Boundary polygons and the weights table are published per dataset
    /// revision, not per query; the remaining artifacts are keyed by
    /// commodity and date.
    pub fn source_url(&self, base: &str, kind: SourceKind) -> String {
        match kind {
            SourceKind::Boundary => format!("{}/boundaries/admin1.geojson", base),
            SourceKind::Enhanced => {
                format!("{}/enhanced/{}/{}.geojson", base, self.commodity, self.date)
            }
            SourceKind::Weights => format!("{}/spatial/weights.json", base),
            SourceKind::Flows => format!("{}/flows/{}/{}.csv", base, self.commodity, self.date),
            SourceKind::Analysis => {
                format!("{}/analysis/{}/{}.json", base, self.commodity, self.date)
            }
        }
    }
}
