//! Math type aliases and helper types.
//!
//! Vertex data is stored as `f32`; picking works in `f64` so long rays over
//! large models do not lose precision.

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 3D vector (f64), used for ray queries.
pub type DVec3 = nalgebra::Vector3<f64>;

/// Axis-aligned bounding box.
///
/// A freshly created box is empty: `min` is `+inf` and `max` is `-inf`, so
/// extending it by any point makes it the degenerate box around that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Create an empty box.
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// Create a box from two corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// True if no point has been added.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow the box to contain `point`.
    pub fn include(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Grow the box to contain a sphere of `radius` around `center`.
    pub fn include_sphere(&mut self, center: &Vec3, radius: f32) {
        let r = Vec3::repeat(radius.abs());
        self.include(&(center - r));
        self.include(&(center + r));
    }

    /// Grow the box to contain another box.
    pub fn include_box(&mut self, other: &BoundingBox) {
        if !other.is_empty() {
            self.include(&other.min);
            self.include(&other.max);
        }
    }

    /// Center point. Meaningless for an empty box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Size along each axis (zero for an empty box).
    pub fn extents(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::zeros()
        } else {
            self.max - self.min
        }
    }

    /// Length of the longest axis.
    pub fn max_extent(&self) -> f32 {
        self.extents().max()
    }
}
