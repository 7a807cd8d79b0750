//! Species Count Aggregation
//!
//! Per-region species counts under the two rollup policies:
//!
//! - **Strict rollup**: a unified country counts the *union* of its subdivisions'
//!   species sets. A species native to two subdivisions counts once.
//! - **Fan-out**: a shared region's full species set is added to each target
//!   country independently, without splitting.
//!
//! For any code:
//!
//! ```text
//! count(code) = | raw(code) ∪ raw(sub) for sub in rollup(code)
//!                           ∪ raw(shared) for shared targeting code |
//! ```
//!
//! Unmapped codes reduce to their raw count.

use crate::index::SpeciesLocationIndex;
use crate::registry::RegionCode;
use crate::subdivision::SubdivisionMap;
use std::collections::{BTreeMap, BTreeSet};

/// A constituent of an aggregated region with its own count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constituent {
    pub code: RegionCode,
    pub count: usize,
}

/// Aggregated counts for every code in the run, ordered by code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionCounts {
    counts: BTreeMap<RegionCode, usize>,
}

impl RegionCounts {
    pub fn get(&self, code: &RegionCode) -> Option<usize> {
        self.counts.get(code).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionCode, usize)> {
        self.counts.iter().map(|(code, count)| (code, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

pub struct Aggregator<'a> {
    index: &'a SpeciesLocationIndex,
    map: &'a SubdivisionMap,
}

impl<'a> Aggregator<'a> {
    pub fn new(index: &'a SpeciesLocationIndex, map: &'a SubdivisionMap) -> Self {
        Self { index, map }
    }

    fn extend_with(&self, species: &mut BTreeSet<&'a str>, code: &RegionCode) {
        if let Some(set) = self.index.species_in(code) {
            species.extend(set.iter().map(String::as_str));
        }
    }

    /// Every species attributed to `code` under the applicable policy
    pub fn reachable_species(&self, code: &RegionCode) -> BTreeSet<&'a str> {
        let mut species = BTreeSet::new();
        self.extend_with(&mut species, code);

        // Strict rollup: union, never sum
        for sub in self.map.subdivisions_of(code) {
            self.extend_with(&mut species, sub);
        }

        // Fan-out: each shared source contributes its full set
        for shared in self.map.shared_sources(code) {
            self.extend_with(&mut species, shared);
        }

        species
    }

    pub fn count(&self, code: &RegionCode) -> usize {
        if self.map.subdivisions_of(code).is_empty() && self.map.shared_sources(code).is_empty() {
            return self.index.raw_count(code);
        }
        self.reachable_species(code).len()
    }

    /// Counts for every indexed code, every code in the subdivision map, and `extra_codes`
    ///
    /// Codes with no species are kept with count 0.
    pub fn aggregate<'c>(&self, extra_codes: impl IntoIterator<Item = &'c RegionCode>) -> RegionCounts {
        let mut universe: BTreeSet<&RegionCode> = self.index.codes();
        universe.extend(self.map.all_codes());
        // Extra codes may be borrowed for less time than the index; insert one by one
        // so the set's lifetime shrinks to the shorter of the two
        for code in extra_codes {
            universe.insert(code);
        }

        let counts: BTreeMap<RegionCode, usize> = universe
            .into_iter()
            .map(|code| (code.clone(), self.count(code)))
            .collect();

        let empty = counts.values().filter(|c| **c == 0).count();
        tracing::info!(
            "Aggregated {} regions ({} with no species)",
            counts.len(),
            empty
        );

        RegionCounts { counts }
    }

    /// Constituents of `code`: rollup subdivisions first, then shared sources
    ///
    /// Empty for codes that aggregate nothing.
    pub fn breakdown(&self, code: &RegionCode) -> Vec<Constituent> {
        self.map
            .subdivisions_of(code)
            .iter()
            .chain(self.map.shared_sources(code))
            .map(|c| Constituent {
                code: c.clone(),
                count: self.index.raw_count(c),
            })
            .collect()
    }
}
