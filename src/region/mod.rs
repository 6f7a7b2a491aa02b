//! Region identity resolution.
//!
//! The five source datasets spell region names inconsistently: Arabic
//! transliterations with and without diacritics, underscore and space
//! separators, trailing "Governorate"/"City" suffixes. This module collapses
//! every spelling into one canonical id so that merged features, flows, and
//! clusters key consistently.
//!
//! Resolution is called once per incoming feature, flow endpoint, and
//! cluster member, so results are memoized per raw input string.

mod aliases;

use std::collections::HashMap;

use dashmap::DashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use aliases::{ADMIN_SUFFIXES, EXCLUDED_REGIONS, REGION_ALIASES};

/// Canonical id used for records whose region name is empty or missing.
pub const UNKNOWN_REGION: &str = "unknown";

/// Resolves raw region names to canonical identifiers.
///
/// # Example
///
/// ```
/// use marketmesh::region::RegionResolver;
///
/// let resolver = RegionResolver::new();
/// assert_eq!(resolver.normalize("Şan‘ā’ Governorate"), "sanaa");
/// assert_eq!(resolver.normalize("SANA'A_CITY"), "sanaa");
/// assert!(resolver.is_excluded("socotra"));
/// ```
#[derive(Debug)]
pub struct RegionResolver {
    /// Cleaned variant → canonical id, built once from the alias table.
    lookup: HashMap<String, &'static str>,
    /// Raw input → canonical id.
    memo: DashMap<String, String>,
}

impl RegionResolver {
    /// Builds the resolver from the static alias table.
    pub fn new() -> Self {
        let mut lookup = HashMap::new();
        for (canonical, variants) in REGION_ALIASES {
            lookup.insert(clean(canonical), *canonical);
            for variant in *variants {
                lookup.insert(clean(variant), *canonical);
            }
        }
        Self {
            lookup,
            memo: DashMap::new(),
        }
    }

    /// Normalizes a raw region name to its canonical id.
    ///
    /// Strips diacritics, lowercases, collapses punctuation and whitespace
    /// runs to `_`, drops a trailing administrative suffix, then consults
    /// the alias table. Unmatched names fall back to their own cleaned
    /// form; empty names resolve to [`UNKNOWN_REGION`].
    pub fn normalize(&self, raw: &str) -> String {
        if let Some(hit) = self.memo.get(raw) {
            return hit.clone();
        }
        let cleaned = clean(raw);
        let canonical = match self.lookup.get(cleaned.as_str()) {
            Some(id) => (*id).to_string(),
            None if cleaned.is_empty() => UNKNOWN_REGION.to_string(),
            None => cleaned,
        };
        self.memo.insert(raw.to_string(), canonical.clone());
        canonical
    }

    /// Whether a canonical id belongs to the fixed exclusion set.
    pub fn is_excluded(&self, canonical_id: &str) -> bool {
        EXCLUDED_REGIONS.contains(&canonical_id)
    }

    /// Number of distinct raw names resolved so far.
    pub fn memoized_names(&self) -> usize {
        self.memo.len()
    }
}

impl Default for RegionResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the cleaning pipeline shared by table construction and lookups.
fn clean(raw: &str) -> String {
    // NFD splits precomposed letters so their combining marks can be dropped.
    let stripped: String = raw.nfd().filter(|c| !is_combining_mark(*c)).collect();

    let mut lowered = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        if c.is_alphanumeric() {
            lowered.extend(c.to_lowercase());
        } else {
            lowered.push(' ');
        }
    }

    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    if tokens.len() > 1 {
        if let Some(last) = tokens.last() {
            if ADMIN_SUFFIXES.contains(last) {
                tokens.pop();
            }
        }
    }
    tokens.join("_")
}
