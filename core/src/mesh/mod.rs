//! Mesh types and geometry operations.
//!
//! - [`VertexLayout`] - Ordered attribute schema of one vertex row
//! - [`Mesh`] - Vertex rows plus the [`PrimitiveGroup`]s drawing from them
//! - Geometry: bounding boxes, transforms, ray picking, normal and tangent
//!   generation, vertex deduplication

mod data;
mod geometry;
mod layout;
mod normals;
mod tangents;
mod uniquify;

pub use data::{Mesh, MeshError, PrimitiveGroup, PrimitiveKind};
pub use geometry::PickResult;
pub use layout::{VertexAttribute, VertexFormat, VertexLayout, VertexSemantic};
pub use normals::{NormalError, DEFAULT_WELD_TOLERANCE};
pub use tangents::TangentError;
