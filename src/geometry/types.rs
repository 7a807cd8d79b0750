//! Geometry types, ring validation and multi-part merge
//!
//! Positions and rings are the `geojson` crate's raw coordinate types: `[lon, lat]`
//! with an optional third value kept untouched. A polygon is an exterior ring
//! followed by holes. Only polygonal geometry is representable here; everything
//! else is rejected at the provider boundary.

use crate::error::{DefectKind, DefectLog};
use serde::{Deserialize, Serialize};

/// `[longitude, latitude]` or `[longitude, latitude, altitude]`
pub type Position = geojson::Position;
pub type Ring = Vec<Position>;
pub type PolygonRings = geojson::PolygonType;

/// Minimum positions in a closed ring (triangle + closing point)
pub const MIN_RING_POSITIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(PolygonRings),
    MultiPolygon(Vec<PolygonRings>),
}

impl Geometry {
    pub fn polygons(&self) -> Vec<&PolygonRings> {
        match self {
            Geometry::Polygon(rings) => vec![rings],
            Geometry::MultiPolygon(polygons) => polygons.iter().collect(),
        }
    }

    pub fn into_polygons(self) -> Vec<PolygonRings> {
        match self {
            Geometry::Polygon(rings) => vec![rings],
            Geometry::MultiPolygon(polygons) => polygons,
        }
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons().into_iter().flatten()
    }

    pub fn polygon_count(&self) -> usize {
        match self {
            Geometry::Polygon(_) => 1,
            Geometry::MultiPolygon(polygons) => polygons.len(),
        }
    }

    /// Every ring starts and ends on the same position
    pub fn is_closed(&self) -> bool {
        self.rings().all(|ring| is_ring_closed(ring))
    }

    /// Take the polygonal part of a GeoJSON geometry value
    ///
    /// A GeometryCollection keeps its polygon members; other types are returned
    /// as `Err` with their type name.
    pub fn from_geojson(value: geojson::Value) -> Result<Self, &'static str> {
        match value {
            geojson::Value::Polygon(rings) => Ok(Geometry::Polygon(rings)),
            geojson::Value::MultiPolygon(polygons) => Ok(Geometry::MultiPolygon(polygons)),
            geojson::Value::GeometryCollection(members) => {
                let polygons: Vec<PolygonRings> = members
                    .into_iter()
                    .filter_map(|g| Geometry::from_geojson(g.value).ok())
                    .flat_map(Geometry::into_polygons)
                    .collect();
                if polygons.is_empty() {
                    Err("GeometryCollection")
                } else {
                    Ok(Geometry::MultiPolygon(polygons))
                }
            }
            geojson::Value::Point(_) => Err("Point"),
            geojson::Value::MultiPoint(_) => Err("MultiPoint"),
            geojson::Value::LineString(_) => Err("LineString"),
            geojson::Value::MultiLineString(_) => Err("MultiLineString"),
        }
    }
}

impl From<Geometry> for geojson::Value {
    fn from(geometry: Geometry) -> Self {
        match geometry {
            Geometry::Polygon(rings) => geojson::Value::Polygon(rings),
            Geometry::MultiPolygon(polygons) => geojson::Value::MultiPolygon(polygons),
        }
    }
}

pub fn is_ring_closed(ring: &Ring) -> bool {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) => ring.len() > 1 && first == last,
        _ => false,
    }
}

/// What to do with a ring whose first and last positions differ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosurePolicy {
    /// Append the first position and record an `OpenRing` defect
    #[default]
    AutoClose,
    /// Drop the ring and record an `OpenRing` defect
    Reject,
}

fn check_ring(
    mut ring: Ring,
    label: &str,
    code: &str,
    policy: ClosurePolicy,
    defects: &mut DefectLog,
) -> Option<Ring> {
    if ring
        .iter()
        .any(|p| p.len() < 2 || p.iter().any(|v| !v.is_finite()))
    {
        defects.record(
            DefectKind::DegenerateRing,
            Some(code),
            format!("{}: malformed or non-finite position, ring dropped", label),
        );
        return None;
    }

    if !ring.is_empty() && !is_ring_closed(&ring) {
        match policy {
            ClosurePolicy::AutoClose => {
                let first = ring[0].clone();
                ring.push(first);
                defects.record(DefectKind::OpenRing, Some(code), format!("{}: auto-closed", label));
            }
            ClosurePolicy::Reject => {
                defects.record(DefectKind::OpenRing, Some(code), format!("{}: open ring rejected", label));
                return None;
            }
        }
    }

    if ring.len() < MIN_RING_POSITIONS {
        defects.record(
            DefectKind::DegenerateRing,
            Some(code),
            format!("{}: {} positions, ring dropped", label, ring.len()),
        );
        return None;
    }

    Some(ring)
}

fn check_polygon(
    rings: PolygonRings,
    polygon_idx: usize,
    code: &str,
    policy: ClosurePolicy,
    defects: &mut DefectLog,
) -> Option<PolygonRings> {
    let mut kept = Vec::with_capacity(rings.len());
    for (ring_idx, ring) in rings.into_iter().enumerate() {
        let label = format!("polygon {} ring {}", polygon_idx, ring_idx);
        match check_ring(ring, &label, code, policy, defects) {
            Some(ring) => kept.push(ring),
            // Without its exterior ring the holes mean nothing
            None if ring_idx == 0 => return None,
            None => {}
        }
    }
    if kept.is_empty() {
        None
    } else {
        Some(kept)
    }
}

/// Validate every ring of a geometry under `policy`
///
/// Coordinates are never changed; the only edit is the closing position appended
/// under `AutoClose`. Returns `None` when no polygon survives.
pub fn validate_geometry(
    geometry: Geometry,
    code: &str,
    policy: ClosurePolicy,
    defects: &mut DefectLog,
) -> Option<Geometry> {
    match geometry {
        Geometry::Polygon(rings) => {
            check_polygon(rings, 0, code, policy, defects).map(Geometry::Polygon)
        }
        Geometry::MultiPolygon(polygons) => {
            let kept: Vec<PolygonRings> = polygons
                .into_iter()
                .enumerate()
                .filter_map(|(idx, rings)| check_polygon(rings, idx, code, policy, defects))
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Geometry::MultiPolygon(kept))
            }
        }
    }
}

/// Merge several geometries into one
///
/// A single geometry is returned as-is (merging one Polygon is the identity).
/// Two or more become one MultiPolygon holding every polygon in input order.
pub fn merge(geometries: impl IntoIterator<Item = Geometry>) -> Option<Geometry> {
    let mut parts: Vec<Geometry> = geometries.into_iter().collect();
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Geometry::MultiPolygon(
            parts.into_iter().flat_map(Geometry::into_polygons).collect(),
        )),
    }
}
