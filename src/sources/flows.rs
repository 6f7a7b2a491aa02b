//! Flow-table schema and row decoding.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SourceError, SourceKind};
use crate::crs::CrsTransformer;
use crate::fetch::{DataTable, Payload, PayloadKind};
use crate::geometry::Position;
use crate::region::RegionResolver;

/// Column-name candidates per field, probed in order.
const SOURCE_KEYS: &[&str] = &["source", "source_region", "origin"];
const TARGET_KEYS: &[&str] = &["target", "target_region", "destination"];
const SOURCE_X_KEYS: &[&str] = &["source_x", "source_lon", "origin_x"];
const SOURCE_Y_KEYS: &[&str] = &["source_y", "source_lat", "origin_y"];
const TARGET_X_KEYS: &[&str] = &["target_x", "target_lon", "destination_x"];
const TARGET_Y_KEYS: &[&str] = &["target_y", "target_lat", "destination_y"];
const WEIGHT_KEYS: &[&str] = &["weight", "flow_weight", "flow"];
const PRICE_DIFF_KEYS: &[&str] = &["price_differential", "price_diff"];
const DATE_KEYS: &[&str] = &["date", "period"];
const COMMODITY_KEYS: &[&str] = &["commodity", "good"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One market-to-market flow after canonicalization.
///
/// Region ids are canonical, endpoints are WGS84, and every numeric field
/// is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub source: String,
    pub target: String,
    pub source_point: Position,
    pub target_point: Position,
    pub weight: f64,
    pub price_differential: f64,
    pub date: NaiveDate,
    pub commodity: String,
}

/// Decoded flow table plus bookkeeping on dropped rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSet {
    pub flows: Vec<FlowRecord>,
    /// Rows that failed to parse (bad number, bad date, missing cell).
    pub malformed_rows: usize,
    /// Rows whose endpoints canonicalized to the same region.
    pub self_loops: usize,
    /// Rows touching an excluded region on either end.
    pub excluded: usize,
}

impl FlowSet {
    /// Number of accepted flows.
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// Whether no flows were accepted.
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// Resolved column indexes for the flow table.
struct FlowColumns {
    source: usize,
    target: usize,
    source_x: usize,
    source_y: usize,
    target_x: usize,
    target_y: usize,
    weight: usize,
    price_differential: usize,
    date: usize,
    commodity: usize,
}

impl FlowColumns {
    fn locate(table: &DataTable) -> Result<Self, SourceError> {
        let find = |candidates: &[&str], field: &str| {
            candidates
                .iter()
                .find_map(|name| table.column_index(name))
                .ok_or_else(|| SourceError::Validation {
                    kind: SourceKind::Flows,
                    detail: format!("missing required column for {field}"),
                })
        };

        Ok(Self {
            source: find(SOURCE_KEYS, "source")?,
            target: find(TARGET_KEYS, "target")?,
            source_x: find(SOURCE_X_KEYS, "source x")?,
            source_y: find(SOURCE_Y_KEYS, "source y")?,
            target_x: find(TARGET_X_KEYS, "target x")?,
            target_y: find(TARGET_Y_KEYS, "target y")?,
            weight: find(WEIGHT_KEYS, "weight")?,
            price_differential: find(PRICE_DIFF_KEYS, "price differential")?,
            date: find(DATE_KEYS, "date")?,
            commodity: find(COMMODITY_KEYS, "commodity")?,
        })
    }
}

/// One raw row before canonicalization.
struct RawFlow<'a> {
    source: &'a str,
    target: &'a str,
    source_x: f64,
    source_y: f64,
    target_x: f64,
    target_y: f64,
    weight: f64,
    price_differential: f64,
    date: NaiveDate,
    commodity: &'a str,
}

/// Decodes and canonicalizes a flow-table payload.
///
/// A missing required column invalidates the whole source. Individual
/// rows that fail to parse are skipped and counted; so are self-loops
/// and rows touching excluded regions. Endpoint coordinates are
/// converted to WGS84.
pub fn decode_flows(
    payload: &Payload,
    resolver: &RegionResolver,
    transformer: &CrsTransformer,
) -> Result<FlowSet, SourceError> {
    const KIND: SourceKind = SourceKind::Flows;

    let table = match payload.as_table() {
        Some(table) => table,
        None => {
            return Err(SourceError::UnexpectedPayload {
                kind: KIND,
                expected: PayloadKind::Tabular,
                got: payload.kind(),
            });
        }
    };

    let columns = FlowColumns::locate(table)?;
    let mut set = FlowSet::default();

    for (index, row) in table.rows().iter().enumerate() {
        let raw = match decode_row(row, &columns) {
            Ok(raw) => raw,
            Err(reason) => {
                set.malformed_rows += 1;
                warn!(row = index, reason = %reason, "skipping malformed flow row");
                continue;
            }
        };

        let source = resolver.normalize(raw.source);
        let target = resolver.normalize(raw.target);
        if source == target {
            set.self_loops += 1;
            continue;
        }
        if resolver.is_excluded(&source) || resolver.is_excluded(&target) {
            set.excluded += 1;
            continue;
        }

        set.flows.push(FlowRecord {
            source,
            target,
            source_point: transformer.transform_point(raw.source_x, raw.source_y, None),
            target_point: transformer.transform_point(raw.target_x, raw.target_y, None),
            weight: raw.weight,
            price_differential: raw.price_differential,
            date: raw.date,
            commodity: raw.commodity.to_string(),
        });
    }

    if set.malformed_rows + set.self_loops + set.excluded > 0 {
        debug!(
            accepted = set.flows.len(),
            malformed = set.malformed_rows,
            self_loops = set.self_loops,
            excluded = set.excluded,
            "flow table decoded with drops"
        );
    }
    Ok(set)
}

fn decode_row<'a>(row: &'a [String], columns: &FlowColumns) -> Result<RawFlow<'a>, String> {
    Ok(RawFlow {
        source: text_cell(row, columns.source, "source")?,
        target: text_cell(row, columns.target, "target")?,
        source_x: finite_cell(row, columns.source_x, "source x")?,
        source_y: finite_cell(row, columns.source_y, "source y")?,
        target_x: finite_cell(row, columns.target_x, "target x")?,
        target_y: finite_cell(row, columns.target_y, "target y")?,
        weight: finite_cell(row, columns.weight, "weight")?,
        price_differential: finite_cell(row, columns.price_differential, "price differential")?,
        date: date_cell(row, columns.date)?,
        commodity: text_cell(row, columns.commodity, "commodity")?,
    })
}

fn text_cell<'a>(row: &'a [String], index: usize, field: &str) -> Result<&'a str, String> {
    let cell = row
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("{field} cell missing"))?;
    if cell.is_empty() {
        return Err(format!("{field} cell is empty"));
    }
    Ok(cell)
}

fn finite_cell(row: &[String], index: usize, field: &str) -> Result<f64, String> {
    let cell = text_cell(row, index, field)?;
    let value: f64 = cell
        .parse()
        .map_err(|_| format!("{field} is not a number: {cell:?}"))?;
    // "NaN" parses successfully, so finiteness is checked explicitly.
    if !value.is_finite() {
        return Err(format!("{field} is not finite: {cell:?}"));
    }
    Ok(value)
}

fn date_cell(row: &[String], index: usize) -> Result<NaiveDate, String> {
    let cell = text_cell(row, index, "date")?;
    NaiveDate::parse_from_str(cell, DATE_FORMAT).map_err(|_| format!("date is not valid: {cell:?}"))
}
