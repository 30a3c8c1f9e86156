//! # CMOD Core
//!
//! Reading, writing and conditioning of CMOD polygonal models.
//!
//! - [`cmod`]: text and binary codecs behind a header-sniffing dispatcher
//! - [`model`]: the in-memory model and its conditioning pipeline
//! - [`mesh`]: vertex layouts, vertex buffers and primitive groups
//! - [`material`]: surface materials and texture handles

pub mod cmod;
pub mod material;
pub mod math;
pub mod mesh;
pub mod model;
pub mod profiling;

pub use cmod::{load_model, save_model, CmodError, ModelFormat};
pub use material::{Material, TextureHandle, TextureRegistry};
pub use mesh::{Mesh, PrimitiveGroup, PrimitiveKind, VertexLayout};
pub use model::Model;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
