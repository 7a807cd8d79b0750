//! Species Distribution Map Builder
//!
//! Reconciles species occurrence rows against a region registry, aggregates
//! per-region species counts (strict rollup for subdivided countries, fan-out for
//! shared regions), classifies regions into density zones, resolves and merges
//! boundaries, and writes one GeoJSON FeatureCollection atomically.
//!
//! Module layout, leaves first:
//! - `registry`: region code → name/flag
//! - `occurrence`: species rows loaded with Polars
//! - `index`: region ↔ species set indices
//! - `subdivision` / `aggregator`: rollup and fan-out counting
//! - `classify`: count → density zone and color
//! - `geometry`: boundary providers, ring validation, multi-part merge
//! - `assembler` / `summary`: output document and its totals
//! - `pipeline`: read → transform → write

pub mod aggregator;
pub mod assembler;
pub mod classify;
pub mod config;
pub mod error;
pub mod geometry;
pub mod index;
pub mod occurrence;
pub mod pipeline;
pub mod registry;
pub mod subdivision;
pub mod summary;
pub mod utils;

// Re-export commonly used types
pub use aggregator::{Aggregator, Constituent, RegionCounts};
pub use assembler::{AssemblyReport, MapAssembler, MapDocument, RegionFeature, SubdivisionPolicy};
pub use classify::{classify, Classification, DensityZone};
pub use config::{OccurrenceLayout, PipelineConfig};
pub use error::{Defect, DefectKind, DefectLog, PipelineError, Result};
pub use geometry::{BoundaryProvider, ClosurePolicy, Geometry, GeometryResolver};
pub use index::SpeciesLocationIndex;
pub use occurrence::{CsvOccurrenceSource, OccurrenceSource, SpeciesOccurrence, StaticOccurrences};
pub use pipeline::{Pipeline, PipelineReport};
pub use registry::{RegionCode, RegionRecord, RegionRegistry};
pub use subdivision::{SubdivisionMap, SubdivisionSpec};
pub use summary::MapSummary;
