//! Geometry resolution over an ordered provider list
//!
//! Providers are tried in priority order; the first one returning a geometry that
//! survives validation wins. Every code is resolved at most once per run, and
//! composite boundaries (unified countries, extra parts) are merged from the
//! cached results.

use super::provider::BoundaryProvider;
use super::types::{merge, validate_geometry, ClosurePolicy, Geometry};
use crate::error::{DefectKind, DefectLog};
use crate::registry::RegionCode;
use crate::subdivision::SubdivisionMap;
use std::collections::{BTreeMap, BTreeSet};

pub struct GeometryResolver {
    providers: Vec<Box<dyn BoundaryProvider>>,
    policy: ClosurePolicy,
}

impl GeometryResolver {
    pub fn new(policy: ClosurePolicy) -> Self {
        Self {
            providers: Vec::new(),
            policy,
        }
    }

    /// Append a provider with lower priority than those already added
    pub fn with_provider(mut self, provider: impl BoundaryProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn push_provider(&mut self, provider: Box<dyn BoundaryProvider>) {
        self.providers.push(provider);
    }

    pub fn policy(&self) -> ClosurePolicy {
        self.policy
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Own boundary of `code`, validated under the closure policy
    pub fn resolve(&self, code: &RegionCode, defects: &mut DefectLog) -> Option<Geometry> {
        for provider in &self.providers {
            match provider.fetch(code, defects) {
                Ok(Some(geometry)) => {
                    if let Some(valid) = validate_geometry(geometry, code.as_str(), self.policy, defects) {
                        tracing::debug!("{}: boundary from {}", code, provider.name());
                        return Some(valid);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    defects.record(
                        DefectKind::ProviderFailure,
                        Some(code.as_str()),
                        format!("provider {} failed: {:#}", provider.name(), e),
                    );
                }
            }
        }
        None
    }

    /// Boundary of `code` composed from its own geometry and its parts
    ///
    /// Own geometry plus `extra` parts when the code has one; otherwise the merge of
    /// `parts` and `extra`. Parts without geometry are skipped.
    pub fn resolve_merged(
        &self,
        code: &RegionCode,
        parts: &[RegionCode],
        extra: &[RegionCode],
        defects: &mut DefectLog,
    ) -> Option<Geometry> {
        let mut cache = BTreeMap::new();
        let needed = std::iter::once(code).chain(parts).chain(extra);
        for c in needed {
            if !cache.contains_key(c) {
                let geometry = self.resolve(c, defects);
                cache.insert(c.clone(), geometry);
            }
        }
        compose(code, parts, extra, &cache)
    }

    /// Resolve every code in `codes`, composing unified and extra-part boundaries via `map`
    ///
    /// Codes with no resulting geometry are absent from the returned map.
    pub fn resolve_all<'c>(
        &self,
        codes: impl IntoIterator<Item = &'c RegionCode>,
        map: &SubdivisionMap,
        defects: &mut DefectLog,
    ) -> BTreeMap<RegionCode, Geometry> {
        let requested: BTreeSet<&RegionCode> = codes.into_iter().collect();

        let mut needed: BTreeSet<&RegionCode> = requested.clone();
        for code in &requested {
            needed.extend(map.subdivisions_of(code));
            needed.extend(map.extra_parts(code));
        }

        let own: BTreeMap<RegionCode, Option<Geometry>> = needed
            .into_iter()
            .map(|code| (code.clone(), self.resolve(code, defects)))
            .collect();

        let resolved: BTreeMap<RegionCode, Geometry> = requested
            .into_iter()
            .filter_map(|code| {
                compose(code, map.subdivisions_of(code), map.extra_parts(code), &own)
                    .map(|geometry| (code.clone(), geometry))
            })
            .collect();

        tracing::info!(
            "Resolved boundaries for {} of {} codes",
            resolved.len(),
            own.len()
        );
        resolved
    }
}

fn compose(
    code: &RegionCode,
    parts: &[RegionCode],
    extra: &[RegionCode],
    own: &BTreeMap<RegionCode, Option<Geometry>>,
) -> Option<Geometry> {
    let lookup = |c: &RegionCode| own.get(c).and_then(|g| g.clone());

    match lookup(code) {
        Some(geometry) if extra.is_empty() => Some(geometry),
        Some(geometry) => merge(std::iter::once(geometry).chain(extra.iter().filter_map(lookup))),
        None => merge(parts.iter().chain(extra).filter_map(lookup)),
    }
}
