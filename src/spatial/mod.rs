//! Spatial metrics over the merged structure.
//!
//! Pure functions, no I/O: per-region connectivity from the weights
//! table, whole-network density and centralization from the flow list,
//! and Moran's I spatial autocorrelation over per-region values.
//!
//! Significance for Moran's I uses the normal approximation under the
//! randomization assumption with a two-sided p-value. Inputs too small
//! for the variance formula (fewer than four observations), constant
//! values, and empty weight structures yield `None` rather than NaN.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::merge::MergedRegions;
use crate::sources::{FlowRecord, WeightsTable};

/// Neighbor reach of one region within the weights structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connectivity {
    /// Direct neighbor count.
    pub direct: usize,
    /// Sum of the neighbors' own neighbor counts.
    pub secondary: usize,
    /// Reach score normalized by total region count: direct neighbors
    /// plus half-weighted secondary ones, over `n`.
    pub score: f64,
}

/// Whole-network statistics derived from the flow list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    /// Observed flows over the `n(n-1)` possible directed pairs.
    pub density: f64,
    /// Freeman degree centralization in `[0, 1]`; 1 for a perfect star.
    pub centralization: f64,
    /// Mean connectivity score over all regions, using the adjacency
    /// implied by flow partners.
    pub average_connectivity: f64,
}

/// Moran's I with its significance under the normal approximation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moran {
    /// The observed statistic.
    pub i: f64,
    /// Expected value under no autocorrelation, `-1/(n-1)`.
    pub expected: f64,
    /// Standard score under the randomization variance.
    pub z_score: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

/// Computes a region's connectivity within the weights structure.
///
/// `region_count` is the total number of regions in the merged output,
/// used to normalize the score. A region absent from the table scores
/// zero.
pub fn connectivity(region: &str, weights: &WeightsTable, region_count: usize) -> Connectivity {
    let neighbors = weights.neighbors(region);
    let direct = neighbors.len();
    let secondary = neighbors
        .iter()
        .map(|neighbor| weights.neighbors(neighbor).len())
        .sum();

    let score = if region_count == 0 {
        0.0
    } else {
        (direct as f64 + secondary as f64 / 2.0) / region_count as f64
    };
    Connectivity {
        direct,
        secondary,
        score,
    }
}

/// Computes density, centralization, and average connectivity.
///
/// Only flows whose endpoints both exist in the merged structure count.
/// Degrees use distinct partners regardless of flow direction.
pub fn network_metrics(regions: &MergedRegions, flows: &[FlowRecord]) -> NetworkMetrics {
    let n = regions.len();
    if n == 0 {
        return NetworkMetrics {
            density: 0.0,
            centralization: 0.0,
            average_connectivity: 0.0,
        };
    }

    let mut observed = 0usize;
    let mut partners: HashMap<&str, HashSet<&str>> = HashMap::new();
    for flow in flows {
        if regions.get(&flow.source).is_none() || regions.get(&flow.target).is_none() {
            continue;
        }
        observed += 1;
        partners
            .entry(flow.source.as_str())
            .or_default()
            .insert(flow.target.as_str());
        partners
            .entry(flow.target.as_str())
            .or_default()
            .insert(flow.source.as_str());
    }

    let density = if n < 2 {
        0.0
    } else {
        observed as f64 / (n * (n - 1)) as f64
    };

    let degrees: Vec<usize> = regions
        .ids()
        .map(|id| partners.get(id).map_or(0, HashSet::len))
        .collect();
    let max_degree = degrees.iter().copied().max().unwrap_or(0);
    let centralization = if n < 3 {
        0.0
    } else {
        let spread: usize = degrees.iter().map(|d| max_degree - d).sum();
        spread as f64 / ((n - 1) * (n - 2)) as f64
    };

    let adjacency = WeightsTable::from_entries(partners.into_iter().map(|(region, set)| {
        (
            region.to_string(),
            set.into_iter().map(str::to_string).collect::<Vec<_>>(),
        )
    }));
    let average_connectivity = regions
        .ids()
        .map(|id| connectivity(id, &adjacency, n).score)
        .sum::<f64>()
        / n as f64;

    NetworkMetrics {
        density,
        centralization,
        average_connectivity,
    }
}

/// Computes Moran's I over per-region values with binary weights.
///
/// Returns `None` when the statistic is undefined: fewer than four
/// observations, constant values, or no weight links among the
/// observed regions.
pub fn spatial_autocorrelation(
    values: &BTreeMap<String, f64>,
    weights: &WeightsTable,
) -> Option<Moran> {
    let n = values.len();
    if n < 4 {
        return None;
    }

    let mean = values.values().sum::<f64>() / n as f64;
    let deviations: BTreeMap<&str, f64> = values
        .iter()
        .map(|(region, value)| (region.as_str(), value - mean))
        .collect();

    let sum_sq: f64 = deviations.values().map(|z| z * z).sum();
    if sum_sq == 0.0 {
        return None;
    }

    // Binary links restricted to regions that carry a value. The table
    // is symmetric in practice, but the formulas do not assume it.
    let mut links: BTreeSet<(&str, &str)> = BTreeSet::new();
    for &region in deviations.keys() {
        for neighbor in weights.neighbors(region) {
            if deviations.contains_key(neighbor.as_str()) {
                links.insert((region, neighbor.as_str()));
            }
        }
    }
    if links.is_empty() {
        return None;
    }

    let s0 = links.len() as f64;
    let cross: f64 = links
        .iter()
        .map(|&(i, j)| deviations[i] * deviations[j])
        .sum();

    let mut s1 = 0.0f64;
    let mut row_sums: BTreeMap<&str, f64> = BTreeMap::new();
    let mut col_sums: BTreeMap<&str, f64> = BTreeMap::new();
    for &(i, j) in &links {
        *row_sums.entry(i).or_default() += 1.0;
        *col_sums.entry(j).or_default() += 1.0;
        let reciprocal = links.contains(&(j, i));
        if reciprocal && i > j {
            continue;
        }
        let pair_weight = if reciprocal { 2.0 } else { 1.0 };
        s1 += pair_weight * pair_weight;
    }

    let s2: f64 = deviations
        .keys()
        .map(|region| {
            let total = row_sums.get(region).copied().unwrap_or(0.0)
                + col_sums.get(region).copied().unwrap_or(0.0);
            total * total
        })
        .sum();

    let nf = n as f64;
    let i = (nf / s0) * (cross / sum_sq);
    let expected = -1.0 / (nf - 1.0);

    // Randomization variance (Cliff & Ord).
    let b2 = nf * deviations.values().map(|z| z.powi(4)).sum::<f64>() / (sum_sq * sum_sq);
    let numerator = nf * ((nf * nf - 3.0 * nf + 3.0) * s1 - nf * s2 + 3.0 * s0 * s0)
        - b2 * ((nf * nf - nf) * s1 - 2.0 * nf * s2 + 6.0 * s0 * s0);
    let denominator = (nf - 1.0) * (nf - 2.0) * (nf - 3.0) * s0 * s0;
    let variance = numerator / denominator - expected * expected;
    if !variance.is_finite() || variance <= 0.0 {
        return None;
    }

    let z_score = (i - expected) / variance.sqrt();
    let p_value = (2.0 * (1.0 - standard_normal_cdf(z_score.abs()))).clamp(0.0, 1.0);

    Some(Moran {
        i,
        expected,
        z_score,
        p_value,
    })
}

/// Standard normal CDF via the Abramowitz and Stegun erf approximation
/// (formula 7.1.26, absolute error below 1.5e-7).
fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use crate::merge::{MergeProvenance, RegionRecord};
    use crate::sources::SourceKind;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn merged_with(ids: &[&str]) -> MergedRegions {
        let regions = ids
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    RegionRecord {
                        id: id.to_string(),
                        display_name: id.to_string(),
                        aliases: BTreeSet::new(),
                        sources: vec![SourceKind::Boundary],
                        geometry: Geometry::Point {
                            coordinates: [44.0, 15.0],
                        },
                        extras: serde_json::Map::new(),
                    },
                )
            })
            .collect();
        MergedRegions {
            regions,
            provenance: MergeProvenance::default(),
        }
    }

    fn flow(source: &str, target: &str) -> FlowRecord {
        FlowRecord {
            source: source.to_string(),
            target: target.to_string(),
            source_point: [44.0, 15.0],
            target_point: [45.0, 13.0],
            weight: 1.0,
            price_differential: 0.0,
            date: NaiveDate::from_ymd_opt(2014, 6, 1).unwrap(),
            commodity: "wheat".to_string(),
        }
    }

    fn chain_weights() -> WeightsTable {
        WeightsTable::from_entries([
            ("a", vec!["b"]),
            ("b", vec!["a", "c"]),
            ("c", vec!["b", "d"]),
            ("d", vec!["c"]),
        ])
    }

    #[test]
    fn test_connectivity_counts_direct_and_secondary() {
        let weights = WeightsTable::from_entries([
            ("sanaa", vec!["amran", "dhamar"]),
            ("amran", vec!["sanaa", "hajjah"]),
            ("dhamar", vec!["sanaa"]),
            ("hajjah", vec!["amran"]),
        ]);

        let result = connectivity("sanaa", &weights, 4);
        assert_eq!(result.direct, 2);
        assert_eq!(result.secondary, 3);
        assert!((result.score - (2.0 + 1.5) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_connectivity_of_absent_region_is_zero() {
        let result = connectivity("marib", &chain_weights(), 4);
        assert_eq!(result.direct, 0);
        assert_eq!(result.secondary, 0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_density_over_possible_pairs() {
        let regions = merged_with(&["a", "b", "c"]);
        let flows = vec![flow("a", "b"), flow("b", "c")];

        let metrics = network_metrics(&regions, &flows);
        assert!((metrics.density - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_flows_outside_merged_regions_ignored() {
        let regions = merged_with(&["a", "b"]);
        let flows = vec![flow("a", "b"), flow("a", "ghost")];

        let metrics = network_metrics(&regions, &flows);
        assert!((metrics.density - 1.0 / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_star_network_has_full_centralization() {
        let regions = merged_with(&["hub", "s1", "s2", "s3"]);
        let flows = vec![flow("hub", "s1"), flow("hub", "s2"), flow("hub", "s3")];

        let metrics = network_metrics(&regions, &flows);
        assert!((metrics.centralization - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ring_network_has_zero_centralization() {
        let regions = merged_with(&["a", "b", "c", "d"]);
        let flows = vec![flow("a", "b"), flow("b", "c"), flow("c", "d"), flow("d", "a")];

        let metrics = network_metrics(&regions, &flows);
        assert_eq!(metrics.centralization, 0.0);
        assert!(metrics.average_connectivity > 0.0);
    }

    #[test]
    fn test_empty_inputs_yield_zero_metrics() {
        let metrics = network_metrics(&merged_with(&[]), &[]);
        assert_eq!(metrics.density, 0.0);
        assert_eq!(metrics.centralization, 0.0);
        assert_eq!(metrics.average_connectivity, 0.0);
    }

    #[test]
    fn test_moran_on_clustered_chain() {
        // Chain a-b-c-d with high values on one end: worked example with
        // S0=6, S1=12, S2=40, checked by hand.
        let values = BTreeMap::from([
            ("a".to_string(), 10.0),
            ("b".to_string(), 8.0),
            ("c".to_string(), 2.0),
            ("d".to_string(), 0.0),
        ]);

        let moran = spatial_autocorrelation(&values, &chain_weights()).unwrap();
        assert!((moran.i - 0.411765).abs() < 1e-5);
        assert!((moran.expected - (-1.0 / 3.0)).abs() < 1e-12);
        assert!((moran.z_score - 1.4747).abs() < 1e-3);
        assert!((moran.p_value - 0.1403).abs() < 1e-3);
    }

    #[test]
    fn test_moran_negative_for_alternating_values() {
        let values = BTreeMap::from([
            ("a".to_string(), 10.0),
            ("b".to_string(), 0.0),
            ("c".to_string(), 10.0),
            ("d".to_string(), 0.0),
        ]);

        let moran = spatial_autocorrelation(&values, &chain_weights()).unwrap();
        assert!((moran.i - (-1.0)).abs() < 1e-9);
        assert!(moran.i < moran.expected);
        assert!(moran.z_score < 0.0);
    }

    #[test]
    fn test_moran_undefined_for_small_samples() {
        let values = BTreeMap::from([
            ("a".to_string(), 1.0),
            ("b".to_string(), 2.0),
            ("c".to_string(), 3.0),
        ]);
        assert!(spatial_autocorrelation(&values, &chain_weights()).is_none());
    }

    #[test]
    fn test_moran_undefined_for_constant_values() {
        let values = BTreeMap::from([
            ("a".to_string(), 5.0),
            ("b".to_string(), 5.0),
            ("c".to_string(), 5.0),
            ("d".to_string(), 5.0),
        ]);
        assert!(spatial_autocorrelation(&values, &chain_weights()).is_none());
    }

    #[test]
    fn test_moran_undefined_without_links() {
        let values = BTreeMap::from([
            ("w".to_string(), 1.0),
            ("x".to_string(), 2.0),
            ("y".to_string(), 3.0),
            ("z".to_string(), 4.0),
        ]);
        // Chain weights cover different region ids entirely.
        assert!(spatial_autocorrelation(&values, &chain_weights()).is_none());
    }

    #[test]
    fn test_normal_cdf_reference_points() {
        assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((standard_normal_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((standard_normal_cdf(-1.96) - 0.025).abs() < 1e-4);
    }
}
