//! Map summary: totals and top regions of an assembled document

use crate::assembler::MapDocument;
use crate::registry::RegionCode;
use serde::Serialize;
use std::cmp::Reverse;

pub const DEFAULT_TOP_REGIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionTally {
    pub code: RegionCode,
    pub name: String,
    pub species_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSummary {
    pub total_features: usize,
    pub regions_with_species: usize,
    /// Sum of per-feature counts; a species native to several regions is counted in each
    pub total_placements: usize,
    pub features_without_geometry: usize,
    /// Highest counts first, ties broken by code
    pub top_regions: Vec<RegionTally>,
}

impl MapSummary {
    pub fn from_document(document: &MapDocument, top_n: usize) -> Self {
        let features = &document.features;

        let mut ranked: Vec<RegionTally> = features
            .iter()
            .filter(|f| f.properties.species_count > 0)
            .map(|f| RegionTally {
                code: f.properties.location_code.clone(),
                name: f.properties.name.clone(),
                species_count: f.properties.species_count,
            })
            .collect();
        ranked.sort_by_key(|t| (Reverse(t.species_count), t.code.clone()));
        ranked.truncate(top_n);

        Self {
            total_features: features.len(),
            regions_with_species: features
                .iter()
                .filter(|f| f.properties.species_count > 0)
                .count(),
            total_placements: features.iter().map(|f| f.properties.species_count).sum(),
            features_without_geometry: features.iter().filter(|f| f.geometry.is_none()).count(),
            top_regions: ranked,
        }
    }

    pub fn log(&self) {
        tracing::info!("Map summary:");
        tracing::info!("  Total features: {}", self.total_features);
        tracing::info!("  Regions with species: {}", self.regions_with_species);
        tracing::info!("  Total species placements: {}", self.total_placements);
        if self.features_without_geometry > 0 {
            tracing::info!("  Features without geometry: {}", self.features_without_geometry);
        }
        tracing::info!("Top {} regions:", self.top_regions.len());
        for tally in &self.top_regions {
            tracing::info!("  {}: {} - {} species", tally.code, tally.name, tally.species_count);
        }
    }
}
