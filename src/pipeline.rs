//! Map Build Pipeline
//!
//! Three separate stages:
//! 1. read: registry, subdivision map, occurrence rows (fatal on unreadable sources)
//! 2. transform: index → aggregate → classify → resolve boundaries → assemble (defects only)
//! 3. write: optional area counts table, updated registry, then the map document (atomic)
//!
//! Nothing is written until the transform stage has finished, so a failed run
//! leaves every previous output untouched. The map goes last: if a supplementary
//! output fails, the published map still matches the previous run's tables.

use crate::aggregator::{Aggregator, RegionCounts};
use crate::assembler::{AssemblyReport, MapAssembler, MapDocument};
use crate::config::PipelineConfig;
use crate::error::{DefectLog, PipelineError, Result};
use crate::geometry::{DirectoryProvider, GeometryResolver};
use crate::index::SpeciesLocationIndex;
use crate::occurrence::{OccurrenceSource, SpeciesOccurrence};
use crate::registry::{RegionRecord, RegionRegistry, UpsertOutcome};
use crate::subdivision::SubdivisionMap;
use crate::summary::{MapSummary, DEFAULT_TOP_REGIONS};
use crate::utils::atomic_write::write_atomic;
use polars::prelude::*;
use std::io;
use std::path::Path;

/// Everything the read stage produces
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub registry: RegionRegistry,
    pub map: SubdivisionMap,
    pub occurrences: Vec<SpeciesOccurrence>,
    /// Registry additions changed the registry; it is saved in the write stage
    pub registry_changed: bool,
}

/// Everything the transform stage produces
#[derive(Debug, Clone)]
pub struct MapOutput {
    pub document: MapDocument,
    pub counts: RegionCounts,
    pub assembly: AssemblyReport,
    pub summary: MapSummary,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub summary: MapSummary,
    pub assembly: AssemblyReport,
    pub defects: DefectLog,
    pub registry_saved: bool,
}

pub struct Pipeline {
    config: PipelineConfig,
    resolver: GeometryResolver,
}

impl Pipeline {
    /// Pipeline with one directory provider per configured boundary directory
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let mut resolver = GeometryResolver::new(config.closure);
        for dir in &config.boundary_dirs {
            let provider = DirectoryProvider::scan(dir)
                .map_err(|e| PipelineError::source_unavailable(dir, format!("{:#}", e)))?;
            resolver.push_provider(Box::new(provider));
        }
        Ok(Self::with_resolver(config, resolver))
    }

    /// Pipeline with a caller-built resolver; `boundary_dirs` is ignored
    pub fn with_resolver(config: PipelineConfig, resolver: GeometryResolver) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ========================================================================
    // Read
    // ========================================================================

    pub fn read_inputs(&self, source: &dyn OccurrenceSource, defects: &mut DefectLog) -> Result<PipelineInputs> {
        let mut registry = RegionRegistry::load(&self.config.registry, defects)?;

        let mut registry_changed = false;
        for addition in &self.config.registry_additions {
            let record = RegionRecord::new(addition.code.clone(), addition.name.clone(), addition.flag.clone());
            match registry.upsert(record, defects) {
                UpsertOutcome::Inserted | UpsertOutcome::FlagFilled => registry_changed = true,
                UpsertOutcome::Unchanged | UpsertOutcome::NameConflict => {}
            }
        }

        let map = match &self.config.subdivision_map {
            Some(path) => SubdivisionMap::load(path)?,
            None => SubdivisionMap::builtin(),
        };

        let occurrences = source.load(defects)?;

        Ok(PipelineInputs {
            registry,
            map,
            occurrences,
            registry_changed,
        })
    }

    // ========================================================================
    // Transform
    // ========================================================================

    pub fn transform(&self, inputs: &PipelineInputs, defects: &mut DefectLog) -> MapOutput {
        let index = SpeciesLocationIndex::build(&inputs.occurrences);
        index.report_unknown_codes(&inputs.registry, defects);

        let aggregator = Aggregator::new(&index, &inputs.map);
        let counts = if self.config.include_registry_codes {
            aggregator.aggregate(inputs.registry.codes())
        } else {
            aggregator.aggregate(std::iter::empty())
        };

        let geometries = self
            .resolver
            .resolve_all(counts.iter().map(|(code, _)| code), &inputs.map, defects);

        let assembler = MapAssembler::new(&inputs.registry, &inputs.map, self.config.subdivisions);
        let (document, assembly) = assembler.assemble(&counts, &aggregator, &geometries, defects);
        let summary = MapSummary::from_document(&document, DEFAULT_TOP_REGIONS);

        MapOutput {
            document,
            counts,
            assembly,
            summary,
        }
    }

    // ========================================================================
    // Write
    // ========================================================================

    /// Write supplementary outputs first and the map last
    ///
    /// Returns whether the registry was saved.
    pub fn write(&self, inputs: &PipelineInputs, output: &MapOutput) -> Result<bool> {
        if let Some(path) = &self.config.areas_csv {
            write_area_counts(path, &output.counts, &inputs.registry)?;
        }

        if inputs.registry_changed {
            inputs.registry.save(&self.config.registry)?;
            tracing::info!("Saved updated registry to {}", self.config.registry.display());
        }

        output.document.write(&self.config.output)?;
        Ok(inputs.registry_changed)
    }

    /// Run all stages with the configured occurrence table
    pub fn run(&self) -> Result<PipelineReport> {
        let source = self.config.occurrences.source();
        self.run_with(&source)
    }

    /// Run all stages with a caller-supplied occurrence source
    pub fn run_with(&self, source: &dyn OccurrenceSource) -> Result<PipelineReport> {
        let mut defects = DefectLog::new();

        let inputs = self.read_inputs(source, &mut defects)?;
        let output = self.transform(&inputs, &mut defects);
        let registry_saved = self.write(&inputs, &output)?;

        if !defects.is_empty() {
            tracing::warn!("Run finished with {} defects", defects.len());
        }

        Ok(PipelineReport {
            summary: output.summary,
            assembly: output.assembly,
            defects,
            registry_saved,
        })
    }
}

/// Area counts table (`AreaCode,Name,SpeciesCount`), sorted by code
pub fn area_counts_frame(counts: &RegionCounts, registry: &RegionRegistry) -> PolarsResult<DataFrame> {
    let codes: Vec<&str> = counts.iter().map(|(code, _)| code.as_str()).collect();
    let names: Vec<String> = counts.iter().map(|(code, _)| registry.display_name(code)).collect();
    let species: Vec<u64> = counts.iter().map(|(_, count)| count as u64).collect();

    DataFrame::new(vec![
        Series::new("AreaCode".into(), codes).into(),
        Series::new("Name".into(), names).into(),
        Series::new("SpeciesCount".into(), species).into(),
    ])
}

pub fn write_area_counts(path: &Path, counts: &RegionCounts, registry: &RegionRegistry) -> Result<()> {
    let mut df = area_counts_frame(counts, registry).map_err(|e| PipelineError::write_failure(path, e))?;

    write_atomic(path, |w| {
        CsvWriter::new(w)
            .include_header(true)
            .finish(&mut df)
            .map_err(io::Error::other)
    })?;

    tracing::info!("Wrote {} area counts to {}", df.height(), path.display());
    Ok(())
}
