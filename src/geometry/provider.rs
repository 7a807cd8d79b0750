//! Boundary providers
//!
//! A provider answers "what is the boundary of this code?" and may return nothing.
//! Two implementations ship: a directory of GeoJSON files and an in-memory table.

use super::types::Geometry;
use crate::error::{DefectKind, DefectLog};
use crate::registry::RegionCode;
use anyhow::{Context, Result};
use geojson::GeoJson;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub trait BoundaryProvider {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// Boundary for `code`, `None` when this provider has none
    ///
    /// Data problems in a found source are recorded in `defects`; `Err` means the
    /// provider itself failed and the resolver moves on to the next one.
    fn fetch(&self, code: &RegionCode, defects: &mut DefectLog) -> Result<Option<Geometry>>;
}

// ============================================================================
// GeoJSON document parsing
// ============================================================================

fn polygonal(geometry: Option<geojson::Geometry>, code: &str, source: &str, defects: &mut DefectLog) -> Option<Geometry> {
    let Some(geometry) = geometry else {
        defects.record(
            DefectKind::UnsupportedGeometry,
            Some(code),
            format!("{}: feature has null geometry", source),
        );
        return None;
    };

    match Geometry::from_geojson(geometry.value) {
        Ok(geometry) => Some(geometry),
        Err(kind) => {
            defects.record(
                DefectKind::UnsupportedGeometry,
                Some(code),
                format!("{}: geometry type {} is not a polygon", source, kind),
            );
            None
        }
    }
}

/// Extract one geometry from a GeoJSON document
///
/// Accepts a bare geometry, a Feature, or a FeatureCollection. Only the first
/// feature of a collection is used; any further feature is recorded as a
/// `DuplicateFeature` defect.
pub fn parse_boundary_document(
    document: GeoJson,
    code: &str,
    source: &str,
    defects: &mut DefectLog,
) -> Option<Geometry> {
    match document {
        GeoJson::FeatureCollection(collection) => {
            let total = collection.features.len();
            let Some(first) = collection.features.into_iter().next() else {
                defects.record(
                    DefectKind::UnsupportedGeometry,
                    Some(code),
                    format!("{}: empty FeatureCollection", source),
                );
                return None;
            };
            if total > 1 {
                defects.record(
                    DefectKind::DuplicateFeature,
                    Some(code),
                    format!("{}: {} features, only the first is used", source, total),
                );
            }
            polygonal(first.geometry, code, source, defects)
        }
        GeoJson::Feature(feature) => polygonal(feature.geometry, code, source, defects),
        GeoJson::Geometry(geometry) => polygonal(Some(geometry), code, source, defects),
    }
}

// ============================================================================
// Directory provider
// ============================================================================

/// Code prefix of a boundary file name: `AGE.geojson`, `AGE_Argentina East.json`, `age.json`
fn code_from_file_name(path: &Path) -> Option<RegionCode> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    if extension != "geojson" && extension != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let prefix = stem.split('_').next()?;
    RegionCode::parse(prefix)
}

/// Boundary files in one directory, indexed by code at construction
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    label: String,
    files: BTreeMap<RegionCode, Vec<PathBuf>>,
}

impl DirectoryProvider {
    /// Scan `dir` for boundary files
    ///
    /// A missing directory yields an empty provider (logged), not an error.
    pub fn scan(dir: &Path) -> Result<Self> {
        let label = dir.display().to_string();
        let mut files: BTreeMap<RegionCode, Vec<PathBuf>> = BTreeMap::new();

        if !dir.is_dir() {
            tracing::warn!("Boundary directory {} not found, provider is empty", label);
            return Ok(Self { label, files });
        }

        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to list boundary directory {}", label))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to read entry in {}", label))?
                .path();
            if !path.is_file() {
                continue;
            }
            if let Some(code) = code_from_file_name(&path) {
                files.entry(code).or_default().push(path);
            }
        }
        for paths in files.values_mut() {
            paths.sort();
        }

        tracing::info!("Boundary directory {}: {} codes", label, files.len());
        Ok(Self { label, files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl BoundaryProvider for DirectoryProvider {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch(&self, code: &RegionCode, defects: &mut DefectLog) -> Result<Option<Geometry>> {
        let Some(paths) = self.files.get(code) else {
            return Ok(None);
        };
        let Some(path) = paths.first() else {
            return Ok(None);
        };
        if paths.len() > 1 {
            defects.record(
                DefectKind::DuplicateFeature,
                Some(code.as_str()),
                format!(
                    "{} files for one code in {}, using {}",
                    paths.len(),
                    self.label,
                    path.display()
                ),
            );
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let source = path.display().to_string();
        let document = match contents.parse::<GeoJson>() {
            Ok(document) => document,
            Err(e) => {
                defects.record(
                    DefectKind::UnsupportedGeometry,
                    Some(code.as_str()),
                    format!("{}: invalid GeoJSON: {}", source, e),
                );
                return Ok(None);
            }
        };

        Ok(parse_boundary_document(document, code.as_str(), &source, defects))
    }
}

// ============================================================================
// Static provider
// ============================================================================

/// In-memory boundaries (manual fixes, tests)
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    label: String,
    geometries: BTreeMap<RegionCode, Geometry>,
}

impl StaticProvider {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            geometries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, code: RegionCode, geometry: Geometry) -> Option<Geometry> {
        self.geometries.insert(code, geometry)
    }

    pub fn with(mut self, code: RegionCode, geometry: Geometry) -> Self {
        self.insert(code, geometry);
        self
    }
}

impl BoundaryProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch(&self, code: &RegionCode, _defects: &mut DefectLog) -> Result<Option<Geometry>> {
        Ok(self.geometries.get(code).cloned())
    }
}
