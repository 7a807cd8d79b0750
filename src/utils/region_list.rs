//! Region list parsing
//!
//! Occurrence tables store native regions as a delimited list in one field,
//! e.g. "AGE, AGW" or "BZC|BZE". Separators seen in the data: ',', ';', '|' and
//! plain whitespace.

use smallvec::SmallVec;

const SEPARATORS: [char; 3] = [',', ';', '|'];

/// Split a region field into trimmed, non-empty tokens (input order, duplicates kept)
///
/// Most species are native to fewer than 8 regions, so tokens stay on the stack.
pub fn split_region_field(raw: &str) -> SmallVec<[&str; 8]> {
    raw.split(|c: char| SEPARATORS.contains(&c) || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
