//! Geometric queries and transforms over mesh vertex data.

use crate::math::{BoundingBox, DVec3, Vec3};

use super::data::{Mesh, PrimitiveGroup, PrimitiveKind};
use super::layout::{VertexFormat, VertexSemantic};

/// Nearest ray hit inside one mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickResult {
    /// Distance along the ray, in units of the ray direction's length.
    pub distance: f64,
    /// Index of the primitive group that was hit.
    pub group: usize,
    /// Index of the triangle within that group.
    pub primitive: usize,
}

impl PrimitiveGroup {
    /// Vertex indices of triangle `primitive`, or `None` for non-triangle
    /// groups and out-of-range primitives.
    pub fn triangle(&self, primitive: usize) -> Option<[u32; 3]> {
        let idx = &self.indices;
        match self.kind {
            PrimitiveKind::TriList => idx
                .get(primitive * 3..primitive * 3 + 3)
                .map(|t| [t[0], t[1], t[2]]),
            PrimitiveKind::TriStrip => idx
                .get(primitive..primitive + 3)
                .map(|t| [t[0], t[1], t[2]]),
            PrimitiveKind::TriFan => Some([
                *idx.first()?,
                *idx.get(primitive + 1)?,
                *idx.get(primitive + 2)?,
            ]),
            _ => None,
        }
    }

    /// Iterate the triangles of a triangle list, strip or fan.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        let count = if self.kind.is_triangles() {
            self.primitive_count()
        } else {
            0
        };
        (0..count).filter_map(move |p| self.triangle(p))
    }
}

impl Mesh {
    /// Axis-aligned bounds of the `Float3` positions.
    ///
    /// When the layout carries a `pointsize f1` attribute every vertex is a
    /// sprite, and the box grows by each point's size. Meshes without
    /// `Float3` positions return an empty box.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        let Some(position) = self
            .layout()
            .attribute_with_format(VertexSemantic::Position, VertexFormat::Float3)
            .copied()
        else {
            return bbox;
        };
        let point_size = self
            .layout()
            .attribute_with_format(VertexSemantic::PointSize, VertexFormat::Float1)
            .copied();

        for i in 0..self.vertex_count() {
            let p = self.read_vec3(i, position.offset);
            match point_size {
                Some(size) => bbox.include_sphere(&p, self.read_f32(i, size.offset)),
                None => bbox.include(&p),
            }
        }
        bbox
    }

    /// Apply `v' = (v + translation) * scale` to every position.
    ///
    /// Point sizes are scaled with the positions. Normals are never
    /// translated and keep unit length; a negative scale mirrors them.
    pub fn transform(&mut self, translation: &Vec3, scale: f32) {
        let layout = self.layout().clone();
        let Some(position) =
            layout.attribute_with_format(VertexSemantic::Position, VertexFormat::Float3)
        else {
            return;
        };

        for i in 0..self.vertex_count() {
            let v = self.read_vec3(i, position.offset);
            self.write_vec3(i, position.offset, &((v + translation) * scale));
        }

        if let Some(size) =
            layout.attribute_with_format(VertexSemantic::PointSize, VertexFormat::Float1)
        {
            for i in 0..self.vertex_count() {
                let s = self.read_f32(i, size.offset);
                self.write_f32(i, size.offset, s * scale);
            }
        }

        if scale < 0.0 {
            if let Some(normal) =
                layout.attribute_with_format(VertexSemantic::Normal, VertexFormat::Float3)
            {
                for i in 0..self.vertex_count() {
                    let n = self.read_vec3(i, normal.offset);
                    self.write_vec3(i, normal.offset, &-n);
                }
            }
        }
    }

    /// Intersect a ray with the triangle groups of this mesh.
    ///
    /// Returns the nearest hit in front of the origin. Rays lying in a
    /// triangle's plane miss it.
    pub fn pick(&self, origin: &DVec3, direction: &DVec3) -> Option<PickResult> {
        let position = *self
            .layout()
            .attribute_with_format(VertexSemantic::Position, VertexFormat::Float3)?;
        let vertex = |i: u32| self.read_vec3(i, position.offset).cast::<f64>();

        let mut nearest: Option<PickResult> = None;
        for (group_index, group) in self.groups().iter().enumerate() {
            for (primitive, [i0, i1, i2]) in group.triangles().enumerate() {
                let Some(t) = intersect_triangle(
                    origin,
                    direction,
                    &vertex(i0),
                    &vertex(i1),
                    &vertex(i2),
                ) else {
                    continue;
                };
                if nearest.map_or(true, |n| t < n.distance) {
                    nearest = Some(PickResult {
                        distance: t,
                        group: group_index,
                        primitive,
                    });
                }
            }
        }
        nearest
    }
}

/// Ray parameter of the hit between a ray and triangle `v0 v1 v2`.
fn intersect_triangle(
    origin: &DVec3,
    direction: &DVec3,
    v0: &DVec3,
    v1: &DVec3,
    v2: &DVec3,
) -> Option<f64> {
    let e0 = v1 - v0;
    let e1 = v2 - v0;
    let n = e0.cross(&e1);

    let c = n.dot(direction);
    if c == 0.0 {
        return None;
    }
    let t = n.dot(&(v0 - origin)) / c;
    if t <= 0.0 {
        return None;
    }

    // Barycentric coordinates of the plane hit point.
    let m00 = e0.dot(&e0);
    let m01 = e0.dot(&e1);
    let m11 = e1.dot(&e1);
    let det = m00 * m11 - m01 * m01;
    if det == 0.0 {
        return None;
    }
    let q = origin + direction * t - v0;
    let q0 = e0.dot(&q);
    let q1 = e1.dot(&q);
    let s0 = (m11 * q0 - m01 * q1) / det;
    let s1 = (m00 * q1 - m01 * q0) / det;

    (s0 >= 0.0 && s1 >= 0.0 && s0 + s1 <= 1.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexLayout;

    fn quad(z: f32) -> Mesh {
        #[rustfmt::skip]
        let positions = [
            -1.0, -1.0, z,
             1.0, -1.0, z,
             1.0,  1.0, z,
            -1.0,  1.0, z,
        ];
        Mesh::from_floats(VertexLayout::position_only(), &positions)
            .unwrap()
            .with_group(PrimitiveGroup::new(
                PrimitiveKind::TriList,
                Some(0),
                vec![0, 1, 2, 0, 2, 3],
            ))
            .unwrap()
    }

    #[test]
    fn test_triangles_by_kind() {
        let strip = PrimitiveGroup::new(PrimitiveKind::TriStrip, None, vec![0, 1, 2, 3]);
        assert_eq!(
            strip.triangles().collect::<Vec<_>>(),
            vec![[0, 1, 2], [1, 2, 3]]
        );

        let fan = PrimitiveGroup::new(PrimitiveKind::TriFan, None, vec![0, 1, 2, 3]);
        assert_eq!(fan.triangles().collect::<Vec<_>>(), vec![[0, 1, 2], [0, 2, 3]]);

        let lines = PrimitiveGroup::new(PrimitiveKind::LineList, None, vec![0, 1, 2, 3]);
        assert_eq!(lines.triangles().count(), 0);

        // Trailing indices that do not complete a triangle are ignored.
        let ragged = PrimitiveGroup::new(PrimitiveKind::TriList, None, vec![0, 1, 2, 3]);
        assert_eq!(ragged.triangles().count(), 1);
    }

    #[test]
    fn test_bounding_box() {
        let bbox = quad(0.5).bounding_box();
        assert_eq!(bbox.min, Vec3::new(-1.0, -1.0, 0.5));
        assert_eq!(bbox.max, Vec3::new(1.0, 1.0, 0.5));
    }

    #[test]
    fn test_bounding_box_point_sprites() {
        let layout = VertexLayout::position_only()
            .with_attribute(VertexSemantic::PointSize, VertexFormat::Float1);
        let mesh = Mesh::from_floats(layout, &[0.0, 0.0, 0.0, 0.5, 2.0, 0.0, 0.0, 1.0]).unwrap();
        let bbox = mesh.bounding_box();
        assert_eq!(bbox.min, Vec3::new(-0.5, -1.0, -1.0));
        assert_eq!(bbox.max, Vec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn test_bounding_box_without_positions() {
        let layout = VertexLayout::new().with_attribute(VertexSemantic::Normal, VertexFormat::Float3);
        let mesh = Mesh::from_floats(layout, &[0.0, 0.0, 1.0]).unwrap();
        assert!(mesh.bounding_box().is_empty());
    }

    #[test]
    fn test_transform() {
        let layout = VertexLayout::position_normal()
            .with_attribute(VertexSemantic::PointSize, VertexFormat::Float1);
        let mut mesh =
            Mesh::from_floats(layout, &[1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 0.25]).unwrap();

        mesh.transform(&Vec3::new(-1.0, 0.0, 1.0), 2.0);
        assert_eq!(mesh.read_vec3(0, 0), Vec3::new(0.0, 4.0, 8.0));
        assert_eq!(mesh.read_vec3(0, 12), Vec3::new(0.0, 0.0, 1.0), "normals untouched");
        assert_eq!(mesh.read_f32(0, 24), 0.5);

        mesh.transform(&Vec3::zeros(), -1.0);
        assert_eq!(mesh.read_vec3(0, 0), Vec3::new(0.0, -4.0, -8.0));
        assert_eq!(mesh.read_vec3(0, 12), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_pick_hits_nearest_triangle() {
        let mesh = quad(0.0);
        let hit = mesh
            .pick(&DVec3::new(0.5, -0.5, 5.0), &DVec3::new(0.0, 0.0, -1.0))
            .expect("ray through the quad must hit");
        assert!((hit.distance - 5.0).abs() < 1e-9);
        assert_eq!(hit.group, 0);
        assert_eq!(hit.primitive, 0);

        let hit = mesh
            .pick(&DVec3::new(-0.5, 0.5, 5.0), &DVec3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_eq!(hit.primitive, 1);
    }

    #[test]
    fn test_pick_misses() {
        let mesh = quad(0.0);
        // Behind the origin.
        assert!(mesh
            .pick(&DVec3::new(0.0, 0.0, -5.0), &DVec3::new(0.0, 0.0, -1.0))
            .is_none());
        // Outside the quad.
        assert!(mesh
            .pick(&DVec3::new(3.0, 0.0, 5.0), &DVec3::new(0.0, 0.0, -1.0))
            .is_none());
        // Parallel to the plane.
        assert!(mesh
            .pick(&DVec3::new(0.0, 0.0, 0.0), &DVec3::new(1.0, 0.0, 0.0))
            .is_none());
    }
}
