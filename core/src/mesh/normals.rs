//! Per-vertex normal generation with angle-limited smoothing.

use std::cmp::Ordering;

use thiserror::Error;

use crate::math::Vec3;
use crate::profile_function;

use super::data::{Mesh, MeshError, PrimitiveGroup, PrimitiveKind};
use super::layout::{VertexFormat, VertexSemantic};

/// Reasons a mesh cannot receive generated normals.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalError {
    #[error("vertex position must be f3")]
    MissingPosition,

    #[error("mesh should contain only triangle lists, strips or fans, found {0:?}")]
    NotTriangles(PrimitiveKind),

    #[error("{kind:?} group {group} has {count} indices, which is not a whole number of triangles")]
    BadIndexCount {
        group: usize,
        kind: PrimitiveKind,
        count: usize,
    },

    #[error("mesh has no triangles")]
    NoTriangles,

    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Position tolerance used when welding is requested without an explicit one.
pub const DEFAULT_WELD_TOLERANCE: f32 = 1.0e-6;

impl Mesh {
    /// Build a copy of this mesh with a generated `normal f3` attribute.
    ///
    /// Face normals follow the winding of each triangle, alternating for
    /// strips. A vertex normal averages the normals of the faces sharing
    /// that vertex whose angle to the current face is below `smooth_angle`
    /// (radians). With `weld_tolerance`, vertices whose positions agree
    /// within it count as shared even when they are distinct rows.
    ///
    /// The result is un-indexed like [`Mesh::generate_tangents`], and every
    /// group becomes a triangle list. An existing `f3` normal keeps its slot
    /// and is overwritten; a normal of any other format is dropped.
    pub fn generate_normals(
        &self,
        smooth_angle: f32,
        weld_tolerance: Option<f32>,
    ) -> Result<Mesh, NormalError> {
        profile_function!();

        let layout = self.layout();
        let position = *layout
            .attribute_with_format(VertexSemantic::Position, VertexFormat::Float3)
            .ok_or(NormalError::MissingPosition)?;
        for (index, group) in self.groups().iter().enumerate() {
            if !group.kind.is_triangles() {
                return Err(NormalError::NotTriangles(group.kind));
            }
            let count = group.indices.len();
            if count < 3 || (group.kind == PrimitiveKind::TriList && count % 3 != 0) {
                return Err(NormalError::BadIndexCount {
                    group: index,
                    kind: group.kind,
                    count,
                });
            }
        }

        let faces: Vec<[u32; 3]> = self.groups().iter().flat_map(wound_triangles).collect();
        if faces.is_empty() {
            return Err(NormalError::NoTriangles);
        }
        let face_normals: Vec<Vec3> = faces
            .iter()
            .map(|face| self.face_normal(face, position.offset))
            .collect();

        let points = match weld_tolerance {
            Some(tolerance) => self.weld_points(position.offset, tolerance),
            None => (0..self.vertex_count()).collect(),
        };
        let mut point_faces: Vec<Vec<usize>> = vec![Vec::new(); self.vertex_count() as usize];
        for (f, face) in faces.iter().enumerate() {
            for &v in face {
                point_faces[points[v as usize] as usize].push(f);
            }
        }

        let cos_smooth = smooth_angle.cos();
        let keep_normal = layout
            .attribute_with_format(VertexSemantic::Normal, VertexFormat::Float3)
            .is_some();
        let new_layout = if keep_normal {
            layout.clone()
        } else {
            layout.with_replaced(VertexSemantic::Normal, VertexFormat::Float3)
        };
        let normal_offset = new_layout
            .attribute(VertexSemantic::Normal)
            .map(|a| a.offset as usize)
            .unwrap_or_default();
        let new_stride = new_layout.stride() as usize;
        // (old byte range, new offset) for every attribute carried over.
        let copies: Vec<(std::ops::Range<usize>, usize)> = layout
            .attributes()
            .iter()
            .filter(|a| a.semantic != VertexSemantic::Normal)
            .zip(
                new_layout
                    .attributes()
                    .iter()
                    .filter(|a| a.semantic != VertexSemantic::Normal),
            )
            .map(|(old, new)| (old.range(), new.offset as usize))
            .collect();

        let old_stride = self.stride() as usize;
        let old_data = self.vertex_data();
        let mut data = vec![0u8; faces.len() * 3 * new_stride];
        for (f, face) in faces.iter().enumerate() {
            for (corner, &v) in face.iter().enumerate() {
                let shared = &point_faces[points[v as usize] as usize];
                let normal = smooth_normal(&face_normals, f, shared, cos_smooth);
                let old_row = &old_data[v as usize * old_stride..(v as usize + 1) * old_stride];
                let start = (f * 3 + corner) * new_stride;
                let row = &mut data[start..start + new_stride];
                for (src, dst) in &copies {
                    row[*dst..*dst + src.len()].copy_from_slice(&old_row[src.clone()]);
                }
                let n: [f32; 3] = [normal.x, normal.y, normal.z];
                row[normal_offset..normal_offset + 12].copy_from_slice(bytemuck::bytes_of(&n));
            }
        }

        let mut mesh = Mesh::new(new_layout, data)?;
        if let Some(label) = self.label() {
            mesh = mesh.with_label(label);
        }
        let mut next = 0u32;
        for group in self.groups() {
            let count = (group.primitive_count() * 3) as u32;
            mesh.add_group(PrimitiveGroup::new(
                PrimitiveKind::TriList,
                group.material,
                (next..next + count).collect(),
            ))?;
            next += count;
        }

        log::debug!(
            "Generated normals for {} faces ({} -> {} vertices, weld: {:?})",
            faces.len(),
            self.vertex_count(),
            mesh.vertex_count(),
            weld_tolerance
        );
        Ok(mesh)
    }

    fn face_normal(&self, face: &[u32; 3], position: u32) -> Vec3 {
        let p0 = self.read_vec3(face[0], position);
        let p1 = self.read_vec3(face[1], position);
        let p2 = self.read_vec3(face[2], position);
        let normal = (p1 - p0).cross(&(p2 - p1));
        if normal.norm_squared() > 0.0 {
            normal.normalize()
        } else {
            normal
        }
    }

    /// Map every vertex to the lowest-sorted vertex whose position matches
    /// it within `tolerance` on each axis.
    fn weld_points(&self, position: u32, tolerance: f32) -> Vec<u32> {
        let count = self.vertex_count();
        let positions: Vec<Vec3> = (0..count).map(|i| self.read_vec3(i, position)).collect();
        let mut order: Vec<u32> = (0..count).collect();
        order.sort_by(|&a, &b| lexicographic(&positions[a as usize], &positions[b as usize]));

        let mut points: Vec<u32> = (0..count).collect();
        let mut anchor = None;
        for &v in &order {
            match anchor {
                Some(a) if within(&positions[a as usize], &positions[v as usize], tolerance) => {
                    points[v as usize] = a;
                }
                _ => anchor = Some(v),
            }
        }
        points
    }
}

/// Triangles of a group with strip winding restored, so every face normal
/// points out of the same side.
fn wound_triangles(group: &PrimitiveGroup) -> impl Iterator<Item = [u32; 3]> + '_ {
    let strip = group.kind == PrimitiveKind::TriStrip;
    group.triangles().enumerate().map(move |(p, [a, b, c])| {
        if strip && p % 2 == 1 {
            [b, a, c]
        } else {
            [a, b, c]
        }
    })
}

fn lexicographic(a: &Vec3, b: &Vec3) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(a.z.total_cmp(&b.z))
}

fn within(a: &Vec3, b: &Vec3, tolerance: f32) -> bool {
    (a - b).iter().all(|d| d.abs() <= tolerance)
}

/// Sum the normals of the faces in `shared` that are `this_face` or lie
/// within the smoothing cone around it. Falls back to +X for degenerate
/// input.
fn smooth_normal(normals: &[Vec3], this_face: usize, shared: &[usize], cos_smooth: f32) -> Vec3 {
    let this = normals[this_face];
    let sum = shared
        .iter()
        .filter(|&&f| f == this_face || this.dot(&normals[f]) > cos_smooth)
        .fold(Vec3::zeros(), |acc, &f| acc + normals[f]);

    if sum.norm_squared() == 0.0 {
        Vec3::x()
    } else {
        sum.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexLayout;
    use std::f32::consts::FRAC_PI_2;

    const SHARP: f32 = 60.0 * std::f32::consts::PI / 180.0;
    const SMOOTH: f32 = 120.0 * std::f32::consts::PI / 180.0;

    fn assert_close(actual: Vec3, expected: Vec3) {
        assert!(
            (actual - expected).norm() < 1e-5,
            "expected {expected:?}, got {actual:?}"
        );
    }

    /// Two triangles folded 90 degrees along the edge (0,0,0)-(1,0,0): one in
    /// the z=0 plane facing +Z, one in the y=0 plane facing +Y. Without
    /// `shared_rows` the second face uses its own copies of the edge.
    fn folded(shared_rows: bool) -> Mesh {
        let mut positions = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, -1.0],
        ];
        let second = if shared_rows {
            vec![0, 1, 3]
        } else {
            positions.push([0.0, 0.0, 0.0]);
            positions.push([1.0, 0.0, 0.0]);
            vec![4, 5, 3]
        };
        let values: Vec<f32> = positions.iter().flatten().copied().collect();
        let mut indices = vec![0, 1, 2];
        indices.extend(second);
        Mesh::from_floats(VertexLayout::position_only(), &values)
            .unwrap()
            .with_label("fold")
            .with_group(PrimitiveGroup::new(PrimitiveKind::TriList, Some(1), indices))
            .unwrap()
    }

    fn normal_at(mesh: &Mesh, vertex: u32) -> Vec3 {
        let normal = *mesh.layout().attribute(VertexSemantic::Normal).unwrap();
        mesh.read_vec3(vertex, normal.offset)
    }

    #[test]
    fn test_generate_normals_flat() {
        let mesh = folded(true).generate_normals(SHARP, None).unwrap();

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.stride(), 24);
        assert_eq!(mesh.label(), Some("fold"));
        assert_eq!(mesh.groups()[0].kind, PrimitiveKind::TriList);
        assert_eq!(mesh.groups()[0].material, Some(1));
        assert_eq!(mesh.groups()[0].indices, vec![0, 1, 2, 3, 4, 5]);

        // 90 degrees exceeds the 60 degree threshold, so the edge stays hard.
        for i in 0..3 {
            assert_close(normal_at(&mesh, i), Vec3::z());
        }
        for i in 3..6 {
            assert_close(normal_at(&mesh, i), Vec3::y());
        }
        assert_eq!(mesh.read_vec3(5, 0), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_generate_normals_smooths_below_threshold() {
        let mesh = folded(true).generate_normals(SMOOTH, None).unwrap();
        let diagonal = Vec3::new(0.0, 1.0, 1.0).normalize();

        // Shared edge vertices average both faces; the others see one face.
        assert_close(normal_at(&mesh, 0), diagonal);
        assert_close(normal_at(&mesh, 1), diagonal);
        assert_close(normal_at(&mesh, 2), Vec3::z());
        assert_close(normal_at(&mesh, 3), diagonal);
        assert_close(normal_at(&mesh, 4), diagonal);
        assert_close(normal_at(&mesh, 5), Vec3::y());
    }

    #[test]
    fn test_smoothing_threshold() {
        let mesh = folded(true)
            .generate_normals(FRAC_PI_2 + 1e-3, None)
            .unwrap();
        assert_close(normal_at(&mesh, 0), Vec3::new(0.0, 1.0, 1.0).normalize());

        let mesh = folded(true).generate_normals(FRAC_PI_2 - 1e-3, None).unwrap();
        assert_close(normal_at(&mesh, 0), Vec3::z());
    }

    #[test]
    fn test_weld_joins_duplicate_positions() {
        let split = folded(false);
        let diagonal = Vec3::new(0.0, 1.0, 1.0).normalize();

        let unwelded = split.generate_normals(SMOOTH, None).unwrap();
        assert_close(normal_at(&unwelded, 0), Vec3::z());
        assert_close(normal_at(&unwelded, 3), Vec3::y());

        let welded = split
            .generate_normals(SMOOTH, Some(DEFAULT_WELD_TOLERANCE))
            .unwrap();
        assert_close(normal_at(&welded, 0), diagonal);
        assert_close(normal_at(&welded, 3), diagonal);
        assert_close(normal_at(&welded, 4), diagonal);
        assert_close(normal_at(&welded, 5), Vec3::y());
    }

    #[test]
    fn test_strip_winding_alternates() {
        #[rustfmt::skip]
        let values = [
            0.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            1.0, 0.0, 0.0,
            1.0, 1.0, 0.0,
        ];
        let strip = Mesh::from_floats(VertexLayout::position_only(), &values)
            .unwrap()
            .with_group(PrimitiveGroup::new(PrimitiveKind::TriStrip, None, vec![0, 1, 2, 3]))
            .unwrap();

        let mesh = strip.generate_normals(SHARP, None).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.groups()[0].kind, PrimitiveKind::TriList);
        // Both faces of the quad point the same way.
        for i in 0..6 {
            assert_close(normal_at(&mesh, i), -Vec3::z());
        }
        // The second face is emitted with its first two corners swapped.
        assert_eq!(mesh.read_vec3(3, 0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(mesh.read_vec3(4, 0), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_fan() {
        #[rustfmt::skip]
        let values = [
            0.0, 0.0, 0.0,
            1.0, 0.0, 0.0,
            1.0, 1.0, 0.0,
            0.0, 1.0, 0.0,
        ];
        let fan = Mesh::from_floats(VertexLayout::position_only(), &values)
            .unwrap()
            .with_group(PrimitiveGroup::new(PrimitiveKind::TriFan, None, vec![0, 1, 2, 3]))
            .unwrap();

        let mesh = fan.generate_normals(SHARP, None).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.read_vec3(3, 0), Vec3::zeros());
        for i in 0..6 {
            assert_close(normal_at(&mesh, i), Vec3::z());
        }
    }

    #[test]
    fn test_existing_normal_slot() {
        let uv = VertexLayout::position_normal_uv();
        let values = [
            0.0, 0.0, 0.0, 9.0, 9.0, 9.0, 0.5, 0.5, //
            1.0, 0.0, 0.0, 9.0, 9.0, 9.0, 0.5, 0.5, //
            0.0, 1.0, 0.0, 9.0, 9.0, 9.0, 0.5, 0.5,
        ];
        let mesh = Mesh::from_floats(uv.clone(), &values)
            .unwrap()
            .with_group(PrimitiveGroup::new(PrimitiveKind::TriList, None, vec![0, 1, 2]))
            .unwrap();
        let result = mesh.generate_normals(SHARP, None).unwrap();
        assert_eq!(result.layout(), &uv);
        assert_close(result.read_vec3(1, 12), Vec3::z());
        assert_eq!(result.read_f32(1, 24), 0.5);

        let packed = VertexLayout::position_only()
            .with_attribute(VertexSemantic::Normal, VertexFormat::UByte4)
            .with_attribute(VertexSemantic::Texture0, VertexFormat::Float2);
        let mut bytes = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            bytes.extend(p.iter().flat_map(|v| v.to_ne_bytes()));
            bytes.extend_from_slice(&[1, 2, 3, 4]);
            bytes.extend([0.25f32, 0.75].iter().flat_map(|v| v.to_ne_bytes()));
        }
        let mesh = Mesh::new(packed, bytes)
            .unwrap()
            .with_group(PrimitiveGroup::new(PrimitiveKind::TriList, None, vec![0, 1, 2]))
            .unwrap();
        let result = mesh.generate_normals(SHARP, None).unwrap();
        assert_eq!(result.stride(), 32);
        let normal = *result.layout().attribute(VertexSemantic::Normal).unwrap();
        assert_eq!(normal.format, VertexFormat::Float3);
        assert_eq!(normal.offset, 20);
        assert_eq!(result.read_f32(2, 16), 0.75);
        assert_close(result.read_vec3(2, 20), Vec3::z());
    }

    #[test]
    fn test_generate_normals_requirements() {
        let lines = folded(true)
            .with_group(PrimitiveGroup::new(PrimitiveKind::LineList, None, vec![0, 1]))
            .unwrap();
        assert_eq!(
            lines.generate_normals(SHARP, None).unwrap_err(),
            NormalError::NotTriangles(PrimitiveKind::LineList)
        );

        let short_strip = folded(true)
            .with_group(PrimitiveGroup::new(PrimitiveKind::TriStrip, None, vec![0, 1]))
            .unwrap();
        assert_eq!(
            short_strip.generate_normals(SHARP, None).unwrap_err(),
            NormalError::BadIndexCount {
                group: 1,
                kind: PrimitiveKind::TriStrip,
                count: 2
            }
        );

        let flat = Mesh::from_floats(
            VertexLayout::new().with_attribute(VertexSemantic::Position, VertexFormat::Float2),
            &[0.0; 2],
        )
        .unwrap();
        assert_eq!(
            flat.generate_normals(SHARP, None).unwrap_err(),
            NormalError::MissingPosition
        );

        let empty = Mesh::from_floats(VertexLayout::position_only(), &[0.0; 3]).unwrap();
        assert_eq!(
            empty.generate_normals(SHARP, None).unwrap_err(),
            NormalError::NoTriangles
        );
    }

    #[test]
    fn test_degenerate_faces_fall_back_to_x() {
        let values = [0.0; 9];
        let mesh = Mesh::from_floats(VertexLayout::position_only(), &values)
            .unwrap()
            .with_group(PrimitiveGroup::new(PrimitiveKind::TriList, None, vec![0, 1, 2]))
            .unwrap()
            .generate_normals(SHARP, None)
            .unwrap();
        assert_eq!(normal_at(&mesh, 0), Vec3::x());
    }
}
