//! Region boundaries: types, providers and resolution

pub mod provider;
pub mod resolver;
pub mod types;

pub use provider::{parse_boundary_document, BoundaryProvider, DirectoryProvider, StaticProvider};
pub use resolver::GeometryResolver;
pub use types::{merge, validate_geometry, ClosurePolicy, Geometry, PolygonRings, Position, Ring};
