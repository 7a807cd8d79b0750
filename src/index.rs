//! Species Location Index
//!
//! Two derived views over the occurrence rows:
//! - region → set of species native to it
//! - species → set of regions it is native to
//!
//! Set semantics throughout: duplicate rows or repeated codes never inflate a
//! count, and row order never changes the result.

use crate::error::{DefectKind, DefectLog};
use crate::occurrence::SpeciesOccurrence;
use crate::registry::{RegionCode, RegionRegistry};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

pub type SpeciesSet = BTreeSet<String>;

#[derive(Debug, Default, Clone)]
pub struct SpeciesLocationIndex {
    by_region: FxHashMap<RegionCode, SpeciesSet>,
    by_species: FxHashMap<String, BTreeSet<RegionCode>>,
}

impl SpeciesLocationIndex {
    pub fn build(occurrences: &[SpeciesOccurrence]) -> Self {
        let mut index = Self::default();

        for occurrence in occurrences {
            let species = occurrence.species.trim();
            if species.is_empty() {
                continue;
            }
            for code in &occurrence.regions {
                index
                    .by_region
                    .entry(code.clone())
                    .or_default()
                    .insert(species.to_string());
                index
                    .by_species
                    .entry(species.to_string())
                    .or_default()
                    .insert(code.clone());
            }
        }

        tracing::info!(
            "Indexed {} species across {} regions",
            index.by_species.len(),
            index.by_region.len()
        );
        index
    }

    /// Species native to `code` (empty set semantics: `None` means no species)
    pub fn species_in(&self, code: &RegionCode) -> Option<&SpeciesSet> {
        self.by_region.get(code)
    }

    /// Raw (unaggregated) species count for a code
    pub fn raw_count(&self, code: &RegionCode) -> usize {
        self.by_region.get(code).map_or(0, BTreeSet::len)
    }

    pub fn regions_of(&self, species: &str) -> Option<&BTreeSet<RegionCode>> {
        self.by_species.get(species.trim())
    }

    /// All codes with at least one species, sorted
    pub fn codes(&self) -> BTreeSet<&RegionCode> {
        self.by_region.keys().collect()
    }

    pub fn species_count(&self) -> usize {
        self.by_species.len()
    }

    pub fn region_count(&self) -> usize {
        self.by_region.len()
    }

    /// Record a missing-mapping warning for every indexed code the registry lacks
    ///
    /// The codes stay in the index; only the registry reference is missing.
    pub fn report_unknown_codes(&self, registry: &RegionRegistry, defects: &mut DefectLog) {
        for code in self.codes() {
            if !registry.contains(code) {
                defects.record(
                    DefectKind::UnknownRegion,
                    Some(code.as_str()),
                    format!(
                        "{} species reference a code missing from the registry",
                        self.raw_count(code)
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegionRecord;

    fn code(s: &str) -> RegionCode {
        RegionCode::parse(s).unwrap()
    }

    fn occ(species: &str, codes: &[&str]) -> SpeciesOccurrence {
        SpeciesOccurrence::new(species, codes.iter().map(|c| code(c)))
    }

    #[test]
    fn test_duplicate_rows_counted_once() {
        let rows = vec![
            occ("Sp1", &["AGE", "AGE"]),
            occ("Sp1", &["AGE"]),
            occ(" Sp1 ", &["AGW"]),
            occ("Sp2", &["AGE"]),
        ];
        let index = SpeciesLocationIndex::build(&rows);

        assert_eq!(index.raw_count(&code("AGE")), 2);
        assert_eq!(index.raw_count(&code("AGW")), 1);
        assert_eq!(index.regions_of("Sp1").unwrap().len(), 2);
        assert_eq!(index.species_count(), 2);
    }

    #[test]
    fn test_order_independent() {
        let rows = vec![
            occ("Sp1", &["AGE", "BZC"]),
            occ("Sp2", &["BZC"]),
            occ("Sp3", &["AGW", "AGE"]),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        let a = SpeciesLocationIndex::build(&rows);
        let b = SpeciesLocationIndex::build(&reversed);

        for c in ["AGE", "AGW", "BZC"] {
            assert_eq!(a.species_in(&code(c)), b.species_in(&code(c)));
        }
        assert_eq!(a.codes(), b.codes());
    }

    #[test]
    fn test_unknown_code_reported_but_kept() {
        let rows = vec![occ("Sp1", &["AGE", "ZZZ"])];
        let index = SpeciesLocationIndex::build(&rows);
        let registry = RegionRegistry::from_records(vec![RegionRecord::new(
            code("AGE"),
            "Argentina East",
            None,
        )]);

        let mut defects = DefectLog::new();
        index.report_unknown_codes(&registry, &mut defects);

        assert_eq!(defects.count(DefectKind::UnknownRegion), 1);
        assert_eq!(defects.for_code("ZZZ").count(), 1);
        assert_eq!(index.raw_count(&code("ZZZ")), 1);
    }
}
