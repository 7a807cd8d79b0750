//! Map Assembly
//!
//! Joins counts, density classification and boundaries into one GeoJSON
//! FeatureCollection, one feature per code, sorted by code.
//!
//! Rules for codes without a boundary:
//! - count 0: emitted with `"geometry": null` (still shown as "No Data" in legends)
//! - count > 0: omitted from the document and listed in `AssemblyReport::omitted`

use crate::aggregator::{Aggregator, RegionCounts};
use crate::classify::{classify, DensityZone};
use crate::error::{DefectKind, DefectLog, Result};
use crate::geometry::Geometry;
use crate::registry::{RegionCode, RegionRegistry};
use crate::subdivision::SubdivisionMap;
use crate::utils::atomic_write::write_json_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Output Document
// ============================================================================

/// Constituent listed in a unified feature's properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubdivisionEntry {
    pub code: RegionCode,
    pub name: String,
    pub species_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    pub location_code: RegionCode,
    pub name: String,
    pub species_count: usize,
    pub density_zone: DensityZone,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivisions: Option<Vec<SubdivisionEntry>>,
}

/// One region on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct RegionFeature {
    pub properties: FeatureProperties,
    pub geometry: Option<Geometry>,
}

impl RegionFeature {
    pub fn code(&self) -> &RegionCode {
        &self.properties.location_code
    }
}

/// GeoJSON FeatureCollection, features sorted by code, codes unique
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct MapDocument {
    pub features: Vec<RegionFeature>,
}

impl MapDocument {
    pub fn feature(&self, code: &RegionCode) -> Option<&RegionFeature> {
        self.features
            .binary_search_by(|f| f.code().cmp(code))
            .ok()
            .map(|idx| &self.features[idx])
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Write compact JSON atomically; the previous file survives any failure
    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self, false)?;
        tracing::info!("Wrote {} features to {}", self.features.len(), path.display());
        Ok(())
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Which side of a strict rollup appears as its own feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubdivisionPolicy {
    /// Unified parents and their subdivisions (overlapping territory, distinct codes)
    #[default]
    Both,
    /// Parents only; subdivisions appear in the parent's breakdown
    UnifiedOnly,
    /// Subdivisions only; parents are not emitted
    SubdivisionsOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub emitted: usize,
    /// Codes with species but no boundary
    pub omitted: Vec<RegionCode>,
    /// Zero-count codes emitted with a null geometry
    pub without_geometry: Vec<RegionCode>,
    /// Codes skipped by the subdivision policy
    pub folded: Vec<RegionCode>,
}

pub struct MapAssembler<'a> {
    registry: &'a RegionRegistry,
    map: &'a SubdivisionMap,
    policy: SubdivisionPolicy,
}

impl<'a> MapAssembler<'a> {
    pub fn new(registry: &'a RegionRegistry, map: &'a SubdivisionMap, policy: SubdivisionPolicy) -> Self {
        Self { registry, map, policy }
    }

    fn emits(&self, code: &RegionCode) -> bool {
        match self.policy {
            SubdivisionPolicy::Both => true,
            SubdivisionPolicy::UnifiedOnly => !self.map.is_subdivision(code),
            SubdivisionPolicy::SubdivisionsOnly => !self.map.is_unified(code),
        }
    }

    fn breakdown(&self, aggregator: &Aggregator<'_>, code: &RegionCode) -> Option<Vec<SubdivisionEntry>> {
        let constituents = aggregator.breakdown(code);
        if constituents.is_empty() {
            return None;
        }
        Some(
            constituents
                .into_iter()
                .map(|c| SubdivisionEntry {
                    name: self.registry.display_name(&c.code),
                    code: c.code,
                    species_count: c.count,
                })
                .collect(),
        )
    }

    /// Build the document from aggregated counts and resolved boundaries
    ///
    /// Codes with species but no boundary are recorded as `MissingBoundary`.
    pub fn assemble(
        &self,
        counts: &RegionCounts,
        aggregator: &Aggregator<'_>,
        geometries: &BTreeMap<RegionCode, Geometry>,
        defects: &mut DefectLog,
    ) -> (MapDocument, AssemblyReport) {
        let mut report = AssemblyReport::default();
        let mut features = Vec::with_capacity(counts.len());

        // RegionCounts iterates in code order, so features come out sorted and unique
        for (code, count) in counts.iter() {
            if !self.emits(code) {
                report.folded.push(code.clone());
                continue;
            }

            let geometry = geometries.get(code).cloned();
            if geometry.is_none() {
                if count > 0 {
                    defects.record(
                        DefectKind::MissingBoundary,
                        Some(code.as_str()),
                        format!("{} species but no boundary, omitted from map", count),
                    );
                    report.omitted.push(code.clone());
                    continue;
                }
                report.without_geometry.push(code.clone());
            }

            let classification = classify(count);
            let record = self.registry.lookup(code);
            features.push(RegionFeature {
                properties: FeatureProperties {
                    location_code: code.clone(),
                    name: self.registry.display_name(code),
                    species_count: count,
                    density_zone: classification.zone,
                    color: classification.color.to_string(),
                    flag: record.and_then(|r| r.flag.clone()),
                    subdivisions: self.breakdown(aggregator, code),
                },
                geometry,
            });
        }

        report.emitted = features.len();
        tracing::info!(
            "Assembled {} features ({} omitted, {} without geometry, {} folded)",
            report.emitted,
            report.omitted.len(),
            report.without_geometry.len(),
            report.folded.len()
        );
        (MapDocument { features }, report)
    }
}
