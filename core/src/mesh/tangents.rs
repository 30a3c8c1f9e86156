//! Per-vertex tangent generation for normal mapping.

use thiserror::Error;

use crate::math::Vec3;
use crate::profile_function;

use super::data::{Mesh, MeshError, PrimitiveGroup, PrimitiveKind};
use super::layout::{VertexFormat, VertexSemantic};

/// Reasons a mesh cannot receive generated tangents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TangentError {
    #[error("vertex position must be f3")]
    MissingPosition,

    #[error("an f3 vertex normal is required")]
    MissingNormal,

    #[error("texture coordinates must be present to generate tangents")]
    MissingTexCoord,

    #[error("texture coordinate must be f2, found {0:?}")]
    TexCoordFormat(VertexFormat),

    #[error("mesh should contain only triangle lists, found {0:?}")]
    NotTriangleList(PrimitiveKind),

    #[error("mesh has no triangles")]
    NoTriangles,

    #[error(transparent)]
    Mesh(#[from] MeshError),
}

impl Mesh {
    /// Build a copy of this mesh with a `tangent f3` attribute.
    ///
    /// Each face's tangent follows the direction of increasing `u` in
    /// texcoord0. Vertex tangents average the tangents of every face sharing
    /// the vertex that points into the same half-space as the current face.
    /// The result is un-indexed: every face corner gets its own vertex, and
    /// each group becomes a triangle list over a sequential index range.
    pub fn generate_tangents(&self) -> Result<Mesh, TangentError> {
        profile_function!();

        let layout = self.layout();
        let position = *layout
            .attribute_with_format(VertexSemantic::Position, VertexFormat::Float3)
            .ok_or(TangentError::MissingPosition)?;
        layout
            .attribute_with_format(VertexSemantic::Normal, VertexFormat::Float3)
            .ok_or(TangentError::MissingNormal)?;
        let texcoord = *layout
            .attribute(VertexSemantic::Texture0)
            .ok_or(TangentError::MissingTexCoord)?;
        if texcoord.format != VertexFormat::Float2 {
            return Err(TangentError::TexCoordFormat(texcoord.format));
        }
        if let Some(group) = self
            .groups()
            .iter()
            .find(|g| g.kind != PrimitiveKind::TriList)
        {
            return Err(TangentError::NotTriangleList(group.kind));
        }

        let faces: Vec<[u32; 3]> = self.groups().iter().flat_map(|g| g.triangles()).collect();
        if faces.is_empty() {
            return Err(TangentError::NoTriangles);
        }
        let face_tangents: Vec<Vec3> = faces
            .iter()
            .map(|face| self.face_tangent(face, position.offset, texcoord.offset))
            .collect();

        let mut vertex_faces: Vec<Vec<usize>> = vec![Vec::new(); self.vertex_count() as usize];
        for (f, face) in faces.iter().enumerate() {
            for &v in face {
                vertex_faces[v as usize].push(f);
            }
        }

        let new_layout = layout.with_replaced(VertexSemantic::Tangent, VertexFormat::Float3);
        let new_stride = new_layout.stride() as usize;
        let tangent_offset = new_stride - VertexFormat::Float3.size() as usize;
        // (old byte range, new offset) for every attribute carried over.
        let copies: Vec<(std::ops::Range<usize>, usize)> = layout
            .attributes()
            .iter()
            .filter(|a| a.semantic != VertexSemantic::Tangent)
            .zip(
                new_layout
                    .attributes()
                    .iter()
                    .filter(|a| a.semantic != VertexSemantic::Tangent),
            )
            .map(|(old, new)| (old.range(), new.offset as usize))
            .collect();

        let old_stride = self.stride() as usize;
        let old_data = self.vertex_data();
        let mut data = vec![0u8; faces.len() * 3 * new_stride];
        for (f, face) in faces.iter().enumerate() {
            for (corner, &v) in face.iter().enumerate() {
                let tangent = average_face_vectors(&face_tangents, f, &vertex_faces[v as usize]);
                let old_row = &old_data[v as usize * old_stride..(v as usize + 1) * old_stride];
                let start = (f * 3 + corner) * new_stride;
                let row = &mut data[start..start + new_stride];
                for (src, dst) in &copies {
                    row[*dst..*dst + src.len()].copy_from_slice(&old_row[src.clone()]);
                }
                let t: [f32; 3] = [tangent.x, tangent.y, tangent.z];
                row[tangent_offset..tangent_offset + 12].copy_from_slice(bytemuck::bytes_of(&t));
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
            "Generated tangents for {} faces ({} -> {} vertices)",
            faces.len(),
            self.vertex_count(),
            mesh.vertex_count()
        );
        Ok(mesh)
    }

    fn face_tangent(&self, face: &[u32; 3], position: u32, texcoord: u32) -> Vec3 {
        let [i0, i1, i2] = *face;
        let p0 = self.read_vec3(i0, position);
        let p1 = self.read_vec3(i1, position);
        let p2 = self.read_vec3(i2, position);
        let uv = |i: u32| (self.read_f32(i, texcoord), self.read_f32(i, texcoord + 4));
        let (u0, v0) = uv(i0);
        let (u1, v1) = uv(i1);
        let (u2, v2) = uv(i2);

        let s1 = u1 - u0;
        let s2 = u2 - u0;
        let t1 = v1 - v0;
        let t2 = v2 - v0;
        let a = s1 * t2 - s2 * t1;
        if a != 0.0 {
            ((p1 - p0) * t2 - (p2 - p0) * t1) / a
        } else {
            Vec3::zeros()
        }
    }
}

/// Average the vectors of the faces sharing a vertex that lie within 90
/// degrees of `this_face`. Falls back to +X for degenerate input.
fn average_face_vectors(vectors: &[Vec3], this_face: usize, vertex_faces: &[usize]) -> Vec3 {
    let this = vectors[this_face];
    let sum = vertex_faces
        .iter()
        .filter(|&&f| f == this_face || this.dot(&vectors[f]) > 0.0)
        .fold(Vec3::zeros(), |acc, &f| acc + vectors[f]);

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

    fn textured_quad() -> Mesh {
        #[rustfmt::skip]
        let vertices = [
            // position          normal          uv
            -1.0, -1.0, 0.0,     0.0, 0.0, 1.0,  0.0, 0.0,
             1.0, -1.0, 0.0,     0.0, 0.0, 1.0,  1.0, 0.0,
             1.0,  1.0, 0.0,     0.0, 0.0, 1.0,  1.0, 1.0,
            -1.0,  1.0, 0.0,     0.0, 0.0, 1.0,  0.0, 1.0,
        ];
        Mesh::from_floats(VertexLayout::position_normal_uv(), &vertices)
            .unwrap()
            .with_label("quad")
            .with_group(PrimitiveGroup::new(
                PrimitiveKind::TriList,
                Some(3),
                vec![0, 1, 2, 0, 2, 3],
            ))
            .unwrap()
    }

    #[test]
    fn test_generate_tangents() {
        let mesh = textured_quad().generate_tangents().unwrap();

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.stride(), 44);
        assert_eq!(mesh.label(), Some("quad"));
        let tangent = *mesh.layout().attribute(VertexSemantic::Tangent).unwrap();
        assert_eq!(tangent.format, VertexFormat::Float3);

        for i in 0..mesh.vertex_count() {
            let t = mesh.read_vec3(i, tangent.offset);
            assert!((t - Vec3::x()).norm() < 1e-6, "tangent {i} was {t:?}");
        }

        // Original attributes are copied for each face corner.
        assert_eq!(mesh.read_vec3(2, 0), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(mesh.read_vec3(5, 0), Vec3::new(-1.0, 1.0, 0.0));
        assert_eq!(mesh.read_f32(4, 28), 1.0);

        assert_eq!(mesh.group_count(), 1);
        assert_eq!(mesh.groups()[0].material, Some(3));
        assert_eq!(mesh.groups()[0].indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_generate_tangents_replaces_existing() {
        let layout = VertexLayout::position_normal_uv()
            .with_attribute(VertexSemantic::Tangent, VertexFormat::Float4);
        let mut values = Vec::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            values.extend_from_slice(&[x, y, 0.0, 0.0, 0.0, 1.0, x, y, 9.0, 9.0, 9.0, 9.0]);
        }
        let mesh = Mesh::from_floats(layout, &values)
            .unwrap()
            .with_group(PrimitiveGroup::new(PrimitiveKind::TriList, None, vec![0, 1, 2]))
            .unwrap();

        let result = mesh.generate_tangents().unwrap();
        assert_eq!(result.layout().len(), 4);
        assert_eq!(result.stride(), 44);
        let t = result.read_vec3(0, 32);
        assert!((t - Vec3::x()).norm() < 1e-6);
    }

    #[test]
    fn test_generate_tangents_requirements() {
        let no_uv = Mesh::from_floats(VertexLayout::position_normal(), &[0.0; 6]).unwrap();
        assert_eq!(no_uv.generate_tangents().unwrap_err(), TangentError::MissingTexCoord);

        let no_normal = Mesh::from_floats(
            VertexLayout::position_only()
                .with_attribute(VertexSemantic::Texture0, VertexFormat::Float2),
            &[0.0; 5],
        )
        .unwrap();
        assert_eq!(no_normal.generate_tangents().unwrap_err(), TangentError::MissingNormal);

        let uv3 = Mesh::from_floats(
            VertexLayout::position_normal()
                .with_attribute(VertexSemantic::Texture0, VertexFormat::Float3),
            &[0.0; 9],
        )
        .unwrap();
        assert_eq!(
            uv3.generate_tangents().unwrap_err(),
            TangentError::TexCoordFormat(VertexFormat::Float3)
        );

        let strip = textured_quad()
            .with_group(PrimitiveGroup::new(PrimitiveKind::TriStrip, None, vec![0, 1, 2]))
            .unwrap();
        assert_eq!(
            strip.generate_tangents().unwrap_err(),
            TangentError::NotTriangleList(PrimitiveKind::TriStrip)
        );

        let empty = Mesh::from_floats(VertexLayout::position_normal_uv(), &[0.0; 8]).unwrap();
        assert_eq!(empty.generate_tangents().unwrap_err(), TangentError::NoTriangles);
    }

    #[test]
    fn test_degenerate_uvs_fall_back_to_x() {
        let vectors = [Vec3::zeros(), Vec3::new(0.0, 2.0, 0.0)];
        assert_eq!(average_face_vectors(&vectors, 0, &[0, 1]), Vec3::x());
        assert_eq!(average_face_vectors(&vectors, 1, &[0, 1]), Vec3::y());
    }
}
