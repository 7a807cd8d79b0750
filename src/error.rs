//! Error taxonomy for the map pipeline
//!
//! Two families:
//! - `PipelineError`: fatal conditions that abort the run before any output is replaced
//! - `Defect`: non-fatal data problems (bad rows, open rings, unknown codes) that are
//!   logged, collected in a `DefectLog`, and reported alongside the output

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Registry, occurrence or mapping input could not be read or parsed
    #[error("source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// Configuration or subdivision map violates its invariants
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Output could not be written; the previous output is left untouched
    #[error("failed to write {path}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },
}

impl PipelineError {
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PipelineError::SourceUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failure(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PipelineError::WriteFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Category of a non-fatal problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    /// Occurrence row without a species name or with an unparsable region field
    MalformedRow,
    /// Region field entry that is not a 3-letter code
    InvalidCode,
    /// Ring whose first and last positions differ
    OpenRing,
    /// Ring too short, or containing non-finite coordinates
    DegenerateRing,
    /// Boundary source holding more than one feature
    DuplicateFeature,
    /// Geometry that is neither Polygon nor MultiPolygon, or unreadable
    UnsupportedGeometry,
    /// Code referenced by occurrences but absent from the registry
    UnknownRegion,
    /// Code with species but no boundary geometry
    MissingBoundary,
    /// Registry upsert that tried to rename a curated record, or two registry
    /// keys naming the same code
    RegistryConflict,
    /// Boundary provider that failed outright (unreadable file, backend error)
    ProviderFailure,
}

impl DefectKind {
    /// Defects are data problems; missing mappings are reference gaps
    pub fn is_missing_mapping(self) -> bool {
        matches!(self, DefectKind::UnknownRegion | DefectKind::MissingBoundary)
    }
}

/// A single non-fatal problem, attributed to a region code when one is known
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Defect {
    pub kind: DefectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub detail: String,
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{:?} [{}]: {}", self.kind, code, self.detail),
            None => write!(f, "{:?}: {}", self.kind, self.detail),
        }
    }
}

/// Append-only collection of defects found during one run
///
/// Every recorded defect is also emitted as a `warn!` event.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DefectLog {
    defects: Vec<Defect>,
}

impl DefectLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: DefectKind, code: Option<&str>, detail: impl Into<String>) {
        let defect = Defect {
            kind,
            code: code.map(str::to_string),
            detail: detail.into(),
        };
        tracing::warn!("{}", defect);
        self.defects.push(defect);
    }

    pub fn extend(&mut self, other: DefectLog) {
        self.defects.extend(other.defects);
    }

    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn len(&self) -> usize {
        self.defects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defects.is_empty()
    }

    pub fn count(&self, kind: DefectKind) -> usize {
        self.defects.iter().filter(|d| d.kind == kind).count()
    }

    pub fn for_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Defect> + 'a {
        self.defects
            .iter()
            .filter(move |d| d.code.as_deref() == Some(code))
    }
}
