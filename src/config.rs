//! Pipeline configuration
//!
//! One JSON file describes a run:
//!
//! ```json
//! {
//!   "registry": "region_codes.json",
//!   "occurrences": { "path": "location.csv", "layout": "long" },
//!   "subdivision_map": "subdivisions.json",
//!   "boundary_dirs": ["boundaries/fixes", "boundaries/areas"],
//!   "output": "map.geojson",
//!   "areas_csv": "areas.csv",
//!   "closure": "auto_close",
//!   "subdivisions": "both",
//!   "include_registry_codes": false
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use crate::assembler::SubdivisionPolicy;
use crate::error::{PipelineError, Result};
use crate::geometry::ClosurePolicy;
use crate::occurrence::CsvOccurrenceSource;
use crate::registry::RegionCode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Shape of the occurrence table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceLayout {
    /// One row per species, codes as a delimited list (`SpecName`, `NativeRegion`)
    #[default]
    Wide,
    /// One row per code/species pair (`Area_code_L3`, `SpecName`)
    Long,
}

impl OccurrenceLayout {
    pub fn default_species_column(self) -> &'static str {
        "SpecName"
    }

    pub fn default_region_column(self) -> &'static str {
        match self {
            OccurrenceLayout::Wide => "NativeRegion",
            OccurrenceLayout::Long => "Area_code_L3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OccurrenceConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub layout: OccurrenceLayout,
    #[serde(default)]
    pub species_column: Option<String>,
    #[serde(default)]
    pub region_column: Option<String>,
}

impl OccurrenceConfig {
    pub fn source(&self) -> CsvOccurrenceSource {
        CsvOccurrenceSource::new(
            &self.path,
            self.species_column
                .as_deref()
                .unwrap_or(self.layout.default_species_column()),
            self.region_column
                .as_deref()
                .unwrap_or(self.layout.default_region_column()),
        )
    }
}

/// Registry record to add before the run (maintenance fixes such as missing islands)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryAddition {
    pub code: RegionCode,
    pub name: String,
    #[serde(default)]
    pub flag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub registry: PathBuf,
    pub occurrences: OccurrenceConfig,
    /// Subdivision map file; the built-in map is used when absent
    #[serde(default)]
    pub subdivision_map: Option<PathBuf>,
    /// Boundary directories in priority order
    #[serde(default)]
    pub boundary_dirs: Vec<PathBuf>,
    pub output: PathBuf,
    #[serde(default)]
    pub areas_csv: Option<PathBuf>,
    #[serde(default)]
    pub closure: ClosurePolicy,
    #[serde(default)]
    pub subdivisions: SubdivisionPolicy,
    /// Emit every registry code, even those no species references
    #[serde(default)]
    pub include_registry_codes: bool,
    #[serde(default)]
    pub registry_additions: Vec<RegistryAddition>,
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl PipelineConfig {
    /// Minimal config with defaults for every optional field
    pub fn new(
        registry: impl Into<PathBuf>,
        occurrences: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry: registry.into(),
            occurrences: OccurrenceConfig {
                path: occurrences.into(),
                layout: OccurrenceLayout::default(),
                species_column: None,
                region_column: None,
            },
            subdivision_map: None,
            boundary_dirs: Vec::new(),
            output: output.into(),
            areas_csv: None,
            closure: ClosurePolicy::default(),
            subdivisions: SubdivisionPolicy::default(),
            include_registry_codes: false,
            registry_additions: Vec::new(),
        }
    }

    /// Load a config file and resolve its relative paths
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: PipelineConfig = serde_json::from_str(&contents).map_err(|e| {
            PipelineError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;

        tracing::info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Make every relative path relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        resolve(base, &mut self.registry);
        resolve(base, &mut self.occurrences.path);
        resolve(base, &mut self.output);
        if let Some(path) = self.subdivision_map.as_mut() {
            resolve(base, path);
        }
        if let Some(path) = self.areas_csv.as_mut() {
            resolve(base, path);
        }
        for dir in &mut self.boundary_dirs {
            resolve(base, dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.file_name().is_none() {
            return Err(PipelineError::InvalidConfig(format!(
                "output path {} has no file name",
                self.output.display()
            )));
        }
        if self.areas_csv.as_ref() == Some(&self.output) {
            return Err(PipelineError::InvalidConfig(
                "areas_csv and output point at the same file".to_string(),
            ));
        }
        Ok(())
    }
}
