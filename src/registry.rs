//! Region Registry
//!
//! Canonical code → name/flag lookup, loaded once per run from `region_codes.json`:
//!
//! ```json
//! { "AGE": { "name": "Argentina East", "flag": "https://flagcdn.com/w20/ar.png" } }
//! ```
//!
//! The registry is passed by reference through the pipeline. The only mutation is
//! `upsert`, used by maintenance passes that discover an undocumented code.

use crate::error::{DefectKind, DefectLog, PipelineError, Result};
use crate::utils::atomic_write::write_json_atomic;
use crate::utils::region_list::split_region_field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Three-letter region identifier (TDWG level-3 style), always upper-case
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionCode(String);

impl RegionCode {
    /// Parse a code: exactly 3 ASCII letters, case-insensitive
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() == 3 && raw.bytes().all(|b| b.is_ascii_alphabetic()) {
            Some(RegionCode(raw.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RegionCode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        RegionCode::parse(&value).ok_or_else(|| format!("invalid region code '{}'", value))
    }
}

impl From<RegionCode> for String {
    fn from(code: RegionCode) -> Self {
        code.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    pub code: RegionCode,
    pub name: String,
    pub flag: Option<String>,
}

impl RegionRecord {
    pub fn new(code: RegionCode, name: impl Into<String>, flag: Option<String>) -> Self {
        Self {
            code,
            name: name.into(),
            flag: flag.filter(|f| !f.trim().is_empty()),
        }
    }
}

/// On-disk shape of a registry entry (the code is the map key)
#[derive(Debug, Serialize, Deserialize)]
struct RegionEntry {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flag: Option<String>,
}

/// Result of an `upsert` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Existing record gained a flag it did not have
    FlagFilled,
    Unchanged,
    /// Existing record has a different name; the curated name was kept
    NameConflict,
}

#[derive(Debug, Default, Clone)]
pub struct RegionRegistry {
    records: BTreeMap<RegionCode, RegionRecord>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `region_codes.json`
    ///
    /// Keys that are not valid codes are recorded as defects and skipped.
    /// An unreadable or unparsable file is fatal.
    pub fn load(path: &Path, defects: &mut DefectLog) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PipelineError::source_unavailable(path, e))?;
        let raw: BTreeMap<String, RegionEntry> = serde_json::from_str(&contents)
            .map_err(|e| PipelineError::source_unavailable(path, e))?;

        // Keys iterate in byte order, so an upper-case key beats its lower-case spelling
        let mut registry = Self::new();
        for (key, entry) in raw {
            match RegionCode::parse(&key) {
                Some(code) => {
                    if let Some(existing) = registry.records.get(&code) {
                        defects.record(
                            DefectKind::RegistryConflict,
                            Some(code.as_str()),
                            format!(
                                "registry key '{}' ({}) duplicates {} ({}), first entry kept",
                                key, entry.name, code, existing.name
                            ),
                        );
                        continue;
                    }
                    registry
                        .records
                        .insert(code.clone(), RegionRecord::new(code, entry.name, entry.flag));
                }
                None => defects.record(
                    DefectKind::InvalidCode,
                    None,
                    format!("registry key '{}' is not a 3-letter code", key),
                ),
            }
        }

        tracing::info!("Loaded {} region codes from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn from_records(records: impl IntoIterator<Item = RegionRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.code.clone(), r))
                .collect(),
        }
    }

    pub fn lookup(&self, code: &RegionCode) -> Option<&RegionRecord> {
        self.records.get(code)
    }

    pub fn contains(&self, code: &RegionCode) -> bool {
        self.records.contains_key(code)
    }

    /// Registry name, or the code itself when the code is undocumented
    pub fn display_name(&self, code: &RegionCode) -> String {
        self.lookup(code)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| code.to_string())
    }

    /// Render a delimited code list ("HAI, FRA") as names ("Haiti, France")
    ///
    /// Tokens that are not codes are passed through unchanged.
    pub fn describe_codes(&self, codes: &str) -> String {
        split_region_field(codes)
            .into_iter()
            .map(|token| match RegionCode::parse(token) {
                Some(code) => self.display_name(&code),
                None => token.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Insert a newly discovered code
    ///
    /// Never renames an existing record: a differing name is logged as a
    /// `RegistryConflict` and the curated value is kept. A missing flag may be filled.
    pub fn upsert(&mut self, record: RegionRecord, defects: &mut DefectLog) -> UpsertOutcome {
        match self.records.get_mut(&record.code) {
            None => {
                tracing::info!("Registry: added {} ({})", record.code, record.name);
                self.records.insert(record.code.clone(), record);
                UpsertOutcome::Inserted
            }
            Some(existing) if existing.name != record.name => {
                defects.record(
                    DefectKind::RegistryConflict,
                    Some(record.code.as_str()),
                    format!(
                        "kept curated name '{}', ignored '{}'",
                        existing.name, record.name
                    ),
                );
                UpsertOutcome::NameConflict
            }
            Some(existing) => {
                if existing.flag.is_none() && record.flag.is_some() {
                    existing.flag = record.flag;
                    UpsertOutcome::FlagFilled
                } else {
                    UpsertOutcome::Unchanged
                }
            }
        }
    }

    /// Write the registry back in its on-disk shape (sorted keys, atomic)
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw: BTreeMap<&str, RegionEntry> = self
            .records
            .values()
            .map(|r| {
                (
                    r.code.as_str(),
                    RegionEntry {
                        name: r.name.clone(),
                        flag: r.flag.clone(),
                    },
                )
            })
            .collect();
        write_json_atomic(path, &raw, true)
    }

    pub fn codes(&self) -> impl Iterator<Item = &RegionCode> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> RegionCode {
        RegionCode::parse(s).unwrap()
    }

    fn sample_registry() -> RegionRegistry {
        RegionRegistry::from_records(vec![
            RegionRecord::new(code("HAI"), "Haiti", Some("https://flagcdn.com/w20/ht.png".into())),
            RegionRecord::new(code("FRA"), "France", None),
        ])
    }

    #[test]
    fn test_region_code_parse() {
        assert_eq!(code("age").as_str(), "AGE");
        assert_eq!(code(" BZC ").as_str(), "BZC");
        assert!(RegionCode::parse("AG").is_none());
        assert!(RegionCode::parse("AGEW").is_none());
        assert!(RegionCode::parse("A1E").is_none());
    }

    #[test]
    fn test_lookup_and_display_name() {
        let registry = sample_registry();
        assert_eq!(registry.lookup(&code("HAI")).unwrap().name, "Haiti");
        assert!(registry.lookup(&code("XYZ")).is_none());
        assert_eq!(registry.display_name(&code("XYZ")), "XYZ");
    }

    #[test]
    fn test_describe_codes() {
        let registry = sample_registry();
        assert_eq!(registry.describe_codes("HAI, FRA"), "Haiti, France");
        assert_eq!(registry.describe_codes("HAI|XYZ"), "Haiti, XYZ");
    }

    #[test]
    fn test_upsert_never_renames() {
        let mut registry = sample_registry();
        let mut defects = DefectLog::new();

        let outcome = registry.upsert(RegionRecord::new(code("HAI"), "Hayti", None), &mut defects);

        assert_eq!(outcome, UpsertOutcome::NameConflict);
        assert_eq!(registry.lookup(&code("HAI")).unwrap().name, "Haiti");
        assert_eq!(defects.count(DefectKind::RegistryConflict), 1);
    }

    #[test]
    fn test_upsert_inserts_and_fills_flag() {
        let mut registry = sample_registry();
        let mut defects = DefectLog::new();

        let tdc = RegionRecord::new(
            code("TDC"),
            "Tristan da Cunha",
            Some("https://flagcdn.com/w20/ta.png".into()),
        );
        assert_eq!(registry.upsert(tdc, &mut defects), UpsertOutcome::Inserted);
        assert!(registry.contains(&code("TDC")));

        let fra = RegionRecord::new(code("FRA"), "France", Some("https://flagcdn.com/w20/fr.png".into()));
        assert_eq!(registry.upsert(fra.clone(), &mut defects), UpsertOutcome::FlagFilled);
        assert_eq!(registry.upsert(fra, &mut defects), UpsertOutcome::Unchanged);
        assert!(defects.is_empty());
    }

    #[test]
    fn test_load_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region_codes.json");
        fs::write(
            &path,
            r#"{"AGE": {"name": "Argentina East", "flag": "https://flagcdn.com/w20/ar.png"},
                "EAI": {"name": "East Africa Islands", "flag": ""},
                "bad-key": {"name": "Broken"}}"#,
        )
        .unwrap();

        let mut defects = DefectLog::new();
        let registry = RegionRegistry::load(&path, &mut defects).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(&code("EAI")).unwrap().flag, None);
        assert_eq!(defects.count(DefectKind::InvalidCode), 1);

        let saved = dir.path().join("saved.json");
        registry.save(&saved).unwrap();
        let reloaded = RegionRegistry::load(&saved, &mut DefectLog::new()).unwrap();
        assert_eq!(reloaded.lookup(&code("AGE")), registry.lookup(&code("AGE")));
    }

    #[test]
    fn test_load_keeps_first_of_case_duplicate_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region_codes.json");
        fs::write(
            &path,
            r#"{"age": {"name": "typo"}, "AGE": {"name": "Argentina Northeast"}}"#,
        )
        .unwrap();

        let mut defects = DefectLog::new();
        let registry = RegionRegistry::load(&path, &mut defects).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.display_name(&code("AGE")), "Argentina Northeast");
        assert_eq!(defects.count(DefectKind::RegistryConflict), 1);
        assert_eq!(defects.for_code("AGE").count(), 1);
    }

    #[test]
    fn test_missing_registry_is_fatal() {
        let result = RegionRegistry::load(Path::new("/nonexistent/region_codes.json"), &mut DefectLog::new());
        assert!(matches!(result, Err(PipelineError::SourceUnavailable { .. })));
    }
}
