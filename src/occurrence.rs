//! Occurrence Loading
//!
//! Reads species → native-region rows using Polars. Two table shapes occur in
//! the data and both go through the same parser:
//! - wide: one row per species, region codes as a delimited list (`SpecName`, `NativeRegion`)
//! - long: one row per code/species pair (`Area_code_L3`, `SpecName`)
//!
//! Validation happens here, at the load boundary: rows without a species or
//! without any valid code become defects instead of errors.

use crate::error::{DefectKind, DefectLog, PipelineError, Result};
use crate::registry::RegionCode;
use crate::utils::region_list::split_region_field;
use anyhow::Context;
use polars::prelude::*;
use smallvec::SmallVec;
use std::path::PathBuf;

/// Immutable source row: one species and the regions it is native to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesOccurrence {
    pub species: String,
    pub regions: SmallVec<[RegionCode; 4]>,
}

impl SpeciesOccurrence {
    pub fn new(species: impl Into<String>, regions: impl IntoIterator<Item = RegionCode>) -> Self {
        Self {
            species: species.into(),
            regions: regions.into_iter().collect(),
        }
    }
}

/// Anything that can hand the pipeline its occurrence rows
pub trait OccurrenceSource {
    /// Load all rows; malformed rows are recorded in `defects` and skipped
    fn load(&self, defects: &mut DefectLog) -> Result<Vec<SpeciesOccurrence>>;
}

/// Pre-built rows (tests, callers that already hold parsed data)
#[derive(Debug, Clone, Default)]
pub struct StaticOccurrences(pub Vec<SpeciesOccurrence>);

impl OccurrenceSource for StaticOccurrences {
    fn load(&self, _defects: &mut DefectLog) -> Result<Vec<SpeciesOccurrence>> {
        Ok(self.0.clone())
    }
}

/// CSV occurrence table
#[derive(Debug, Clone)]
pub struct CsvOccurrenceSource {
    pub path: PathBuf,
    pub species_column: String,
    pub region_column: String,
}

impl CsvOccurrenceSource {
    pub fn new(
        path: impl Into<PathBuf>,
        species_column: impl Into<String>,
        region_column: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            species_column: species_column.into(),
            region_column: region_column.into(),
        }
    }

    fn read_frame(&self) -> anyhow::Result<DataFrame> {
        // Schema length 0: every column is read as String, codes like "NAN" stay text
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(self.path.clone()))
            .with_context(|| format!("Failed to create CSV reader: {}", self.path.display()))?
            .finish()
            .with_context(|| "Failed to load occurrence CSV")
    }
}

impl OccurrenceSource for CsvOccurrenceSource {
    fn load(&self, defects: &mut DefectLog) -> Result<Vec<SpeciesOccurrence>> {
        let df = self
            .read_frame()
            .map_err(|e| PipelineError::source_unavailable(&self.path, format!("{:#}", e)))?;

        let rows = occurrences_from_frame(&df, &self.species_column, &self.region_column, defects)
            .map_err(|e| PipelineError::source_unavailable(&self.path, format!("{:#}", e)))?;

        tracing::info!(
            "Loaded {} occurrence rows from {} ({} input rows)",
            rows.len(),
            self.path.display(),
            df.height()
        );
        Ok(rows)
    }
}

/// Get a column as strings, casting numeric columns if needed
fn string_column(df: &DataFrame, name: &str) -> anyhow::Result<StringChunked> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;
    let cast = column
        .cast(&DataType::String)
        .with_context(|| format!("Column '{}' cannot be read as text", name))?;
    Ok(cast.str()?.clone())
}

/// Convert a loaded table into occurrence rows
///
/// Missing columns are an error (the source is unusable); bad cells are defects.
pub fn occurrences_from_frame(
    df: &DataFrame,
    species_column: &str,
    region_column: &str,
    defects: &mut DefectLog,
) -> anyhow::Result<Vec<SpeciesOccurrence>> {
    let species_col = string_column(df, species_column)?;
    let region_col = string_column(df, region_column)?;

    let mut rows = Vec::with_capacity(df.height());

    for idx in 0..df.height() {
        // Line number as seen in the file (header is line 1)
        let line = idx + 2;

        let species = match species_col.get(idx).map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s,
            None => {
                defects.record(
                    DefectKind::MalformedRow,
                    None,
                    format!("line {}: empty species name", line),
                );
                continue;
            }
        };

        let field = region_col.get(idx).unwrap_or("");
        let mut regions: SmallVec<[RegionCode; 4]> = SmallVec::new();
        for token in split_region_field(field) {
            match RegionCode::parse(token) {
                Some(code) => regions.push(code),
                None => defects.record(
                    DefectKind::InvalidCode,
                    None,
                    format!("line {}: '{}' for {} is not a region code", line, token, species),
                ),
            }
        }

        if regions.is_empty() {
            defects.record(
                DefectKind::MalformedRow,
                None,
                format!("line {}: {} has no usable region codes", line, species),
            );
            continue;
        }

        rows.push(SpeciesOccurrence {
            species: species.to_string(),
            regions,
        });
    }

    Ok(rows)
}
