//! Subdivision Map
//!
//! Declares how region codes relate to unified country codes:
//! - rollups: unified code → its subdivisions (each subdivision belongs to exactly one country)
//! - shared: shared region → every country it is attributed to in full (fan-out, not split)
//! - extra_parts: codes whose boundary is appended to another code's boundary
//!   (geometry only, counts are unaffected)
//!
//! Loaded from JSON:
//!
//! ```json
//! {
//!   "rollups": { "ARG": ["AGE", "AGW"] },
//!   "shared": { "BOR": ["IDN", "MLY"] },
//!   "extra_parts": { "MLY": ["BOR"] }
//! }
//! ```
//!
//! Membership is one level deep: a unified code cannot itself be a subdivision.

use crate::error::{PipelineError, Result};
use crate::registry::RegionCode;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// On-disk shape of the subdivision map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubdivisionSpec {
    #[serde(default)]
    pub rollups: BTreeMap<RegionCode, Vec<RegionCode>>,
    #[serde(default)]
    pub shared: BTreeMap<RegionCode, Vec<RegionCode>>,
    #[serde(default)]
    pub extra_parts: BTreeMap<RegionCode, Vec<RegionCode>>,
}

/// Validated subdivision map
#[derive(Debug, Clone, Default)]
pub struct SubdivisionMap {
    rollups: BTreeMap<RegionCode, Vec<RegionCode>>,
    shared: BTreeMap<RegionCode, Vec<RegionCode>>,
    extra_parts: BTreeMap<RegionCode, Vec<RegionCode>>,
    parent_of: FxHashMap<RegionCode, RegionCode>,
    shared_sources: FxHashMap<RegionCode, Vec<RegionCode>>,
}

fn parse_codes(raw: &[(&str, &[&str])]) -> BTreeMap<RegionCode, Vec<RegionCode>> {
    raw.iter()
        .filter_map(|(key, values)| {
            let key = RegionCode::parse(key)?;
            let values = values.iter().filter_map(|v| RegionCode::parse(v)).collect();
            Some((key, values))
        })
        .collect()
}

impl SubdivisionMap {
    /// Validate a spec
    ///
    /// Rejected: a subdivision under two countries, nested rollups, a code that is
    /// both a subdivision and a shared region, empty lists, self references.
    pub fn new(spec: SubdivisionSpec) -> Result<Self> {
        let invalid = |msg: String| -> Result<Self> { Err(PipelineError::InvalidConfig(msg)) };

        let mut parent_of: FxHashMap<RegionCode, RegionCode> = FxHashMap::default();
        for (unified, subdivisions) in &spec.rollups {
            if subdivisions.is_empty() {
                return invalid(format!("rollup {} has no subdivisions", unified));
            }
            let mut seen = BTreeSet::new();
            for sub in subdivisions {
                if sub == unified {
                    return invalid(format!("{} is listed as its own subdivision", unified));
                }
                if !seen.insert(sub) {
                    return invalid(format!("{} appears twice under {}", sub, unified));
                }
                if let Some(other) = parent_of.insert(sub.clone(), unified.clone()) {
                    return invalid(format!(
                        "{} rolls up into both {} and {}",
                        sub, other, unified
                    ));
                }
            }
        }

        for unified in spec.rollups.keys() {
            if let Some(parent) = parent_of.get(unified) {
                return invalid(format!(
                    "{} is a unified code and also a subdivision of {}",
                    unified, parent
                ));
            }
        }

        let mut shared_sources: FxHashMap<RegionCode, Vec<RegionCode>> = FxHashMap::default();
        for (shared, targets) in &spec.shared {
            if targets.is_empty() {
                return invalid(format!("shared region {} has no targets", shared));
            }
            if let Some(parent) = parent_of.get(shared) {
                return invalid(format!(
                    "{} is both a shared region and a subdivision of {}",
                    shared, parent
                ));
            }
            if spec.rollups.contains_key(shared) {
                return invalid(format!("{} is both a shared region and a unified code", shared));
            }
            let mut seen = BTreeSet::new();
            for target in targets {
                if target == shared {
                    return invalid(format!("shared region {} targets itself", shared));
                }
                if !seen.insert(target) {
                    return invalid(format!("{} appears twice as a target of {}", target, shared));
                }
                // Fan-out lands on final map entries only, never on something that is
                // itself folded into a parent or fanned out further
                if let Some(parent) = parent_of.get(target) {
                    return invalid(format!(
                        "{} targets {}, which is a subdivision of {}",
                        shared, target, parent
                    ));
                }
                if spec.shared.contains_key(target) {
                    return invalid(format!(
                        "{} targets {}, which is itself a shared region",
                        shared, target
                    ));
                }
                shared_sources
                    .entry(target.clone())
                    .or_default()
                    .push(shared.clone());
            }
        }

        for (code, parts) in &spec.extra_parts {
            if parts.iter().any(|p| p == code) {
                return invalid(format!("{} lists itself as an extra part", code));
            }
        }

        Ok(Self {
            rollups: spec.rollups,
            shared: spec.shared,
            extra_parts: spec.extra_parts,
            parent_of,
            shared_sources,
        })
    }

    /// Load and validate a JSON subdivision map
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PipelineError::source_unavailable(path, e))?;
        let spec: SubdivisionSpec = serde_json::from_str(&contents)
            .map_err(|e| PipelineError::source_unavailable(path, e))?;
        let map = Self::new(spec)?;
        tracing::info!(
            "Loaded subdivision map: {} rollups, {} shared regions",
            map.rollups.len(),
            map.shared.len()
        );
        Ok(map)
    }

    /// Map used by the palm distribution data set
    pub fn builtin() -> Self {
        let spec = SubdivisionSpec {
            rollups: parse_codes(&[
                ("ARG", &["AGE", "AGW"]),
                ("BRA", &["BZC", "BZE", "BZL", "BZN", "BZS"]),
                ("CHN", &["CHC", "CHH", "CHS", "CHT"]),
                ("IDN", &["JAW", "LSI", "MOL", "SUL", "SUM"]),
                ("MEX", &["MXC", "MXE", "MXG", "MXI", "MXN", "MXS", "MXT"]),
            ]),
            shared: parse_codes(&[("BOR", &["IDN", "MLY"])]),
            extra_parts: parse_codes(&[("MLY", &["BOR"])]),
        };
        // Static table, validated by test_builtin_map_is_valid
        Self::new(spec).unwrap_or_default()
    }

    pub fn subdivisions_of(&self, unified: &RegionCode) -> &[RegionCode] {
        self.rollups.get(unified).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn parent_of(&self, code: &RegionCode) -> Option<&RegionCode> {
        self.parent_of.get(code)
    }

    pub fn is_subdivision(&self, code: &RegionCode) -> bool {
        self.parent_of.contains_key(code)
    }

    pub fn is_unified(&self, code: &RegionCode) -> bool {
        self.rollups.contains_key(code)
    }

    pub fn shared_targets(&self, shared: &RegionCode) -> &[RegionCode] {
        self.shared.get(shared).map(Vec::as_slice).unwrap_or_default()
    }

    /// Shared regions attributed in full to `target`, in declaration order
    pub fn shared_sources(&self, target: &RegionCode) -> &[RegionCode] {
        self.shared_sources.get(target).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn extra_parts(&self, code: &RegionCode) -> &[RegionCode] {
        self.extra_parts.get(code).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn unified_codes(&self) -> impl Iterator<Item = &RegionCode> {
        self.rollups.keys()
    }

    /// Every code the map mentions (parents, subdivisions, shared regions, targets)
    pub fn all_codes(&self) -> BTreeSet<&RegionCode> {
        let mut codes = BTreeSet::new();
        for (unified, subs) in &self.rollups {
            codes.insert(unified);
            codes.extend(subs);
        }
        for (shared, targets) in &self.shared {
            codes.insert(shared);
            codes.extend(targets);
        }
        codes
    }

    pub fn spec(&self) -> SubdivisionSpec {
        SubdivisionSpec {
            rollups: self.rollups.clone(),
            shared: self.shared.clone(),
            extra_parts: self.extra_parts.clone(),
        }
    }
}
