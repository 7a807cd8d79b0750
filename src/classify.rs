//! Density classification for map regions.
//!
//! One canonical 10-tier table maps a species count to a density zone and a
//! fill color. Lower bounds are inclusive; each tier ends where the next begins.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Density Zones
// ============================================================================

/// Density zone, ordered from no data to exceptional
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DensityZone {
    #[serde(rename = "No Data")]
    NoData,
    #[serde(rename = "Very Low")]
    VeryLow,
    #[serde(rename = "Low")]
    Low,
    #[serde(rename = "Medium-Low")]
    MediumLow,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Medium-High")]
    MediumHigh,
    #[serde(rename = "High")]
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
    #[serde(rename = "Extremely High")]
    ExtremelyHigh,
    #[serde(rename = "Exceptional")]
    Exceptional,
}

impl DensityZone {
    pub fn label(self) -> &'static str {
        match self {
            DensityZone::NoData => "No Data",
            DensityZone::VeryLow => "Very Low",
            DensityZone::Low => "Low",
            DensityZone::MediumLow => "Medium-Low",
            DensityZone::Medium => "Medium",
            DensityZone::MediumHigh => "Medium-High",
            DensityZone::High => "High",
            DensityZone::VeryHigh => "Very High",
            DensityZone::ExtremelyHigh => "Extremely High",
            DensityZone::Exceptional => "Exceptional",
        }
    }
}

impl fmt::Display for DensityZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Threshold Table
// ============================================================================

/// One tier: counts >= `min_count` (up to the next tier) fall in `zone`
#[derive(Debug, Clone, Copy)]
pub struct DensityTier {
    pub min_count: usize,
    pub zone: DensityZone,
    pub color: &'static str,
}

/// Ascending, gap-free: the first tier starts at 0 and each `min_count` is strictly greater
/// than the previous one.
#[rustfmt::skip]
pub static DENSITY_TIERS: &[DensityTier] = &[
    DensityTier { min_count: 0, zone: DensityZone::NoData, color: "#f0f0f0" },
    DensityTier { min_count: 1, zone: DensityZone::VeryLow, color: "#ffffcc" },
    DensityTier { min_count: 6, zone: DensityZone::Low, color: "#fff2aa" },
    DensityTier { min_count: 16, zone: DensityZone::MediumLow, color: "#ffe066" },
    DensityTier { min_count: 31, zone: DensityZone::Medium, color: "#ffcc33" },
    DensityTier { min_count: 61, zone: DensityZone::MediumHigh, color: "#ff9933" },
    DensityTier { min_count: 101, zone: DensityZone::High, color: "#ff6600" },
    DensityTier { min_count: 151, zone: DensityZone::VeryHigh, color: "#e65500" },
    DensityTier { min_count: 201, zone: DensityZone::ExtremelyHigh, color: "#cc3300" },
    DensityTier { min_count: 301, zone: DensityZone::Exceptional, color: "#990000" },
];

/// Display attributes derived from a count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub zone: DensityZone,
    pub color: &'static str,
}

/// Classify a species count.
///
/// Pure step function: the last tier whose lower bound is <= `count`.
pub fn classify(count: usize) -> Classification {
    let tier = DENSITY_TIERS
        .iter()
        .rev()
        .find(|t| count >= t.min_count)
        .unwrap_or(&DENSITY_TIERS[0]);
    Classification {
        zone: tier.zone,
        color: tier.color,
    }
}

/// Inclusive count range covered by a zone (`None` upper bound = open-ended)
pub fn zone_range(zone: DensityZone) -> Option<(usize, Option<usize>)> {
    let idx = DENSITY_TIERS.iter().position(|t| t.zone == zone)?;
    let upper = DENSITY_TIERS.get(idx + 1).map(|next| next.min_count - 1);
    Some((DENSITY_TIERS[idx].min_count, upper))
}
