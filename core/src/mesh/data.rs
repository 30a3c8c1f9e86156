//! Mesh data structures.
//!
//! This module provides:
//! - [`PrimitiveKind`] - How indices are assembled into primitives
//! - [`PrimitiveGroup`] - A batch of indices sharing one topology and material
//! - [`Mesh`] - A vertex buffer, its layout and the groups drawing from it
//!
//! Vertex rows hold values in host byte order; the codecs convert to and from
//! the on-disk order.

use thiserror::Error;

use super::layout::VertexLayout;

/// Primitive topology of a [`PrimitiveGroup`].
///
/// The discriminants are the codes used by the binary model format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum PrimitiveKind {
    /// Every three indices form a triangle.
    #[default]
    TriList = 0,
    TriStrip = 1,
    TriFan = 2,
    /// Every two indices form a line.
    LineList = 3,
    LineStrip = 4,
    PointList = 5,
    /// Point sprites, sized by the `PointSize` vertex attribute.
    SpriteList = 6,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 7] = [
        Self::TriList,
        Self::TriStrip,
        Self::TriFan,
        Self::LineList,
        Self::LineStrip,
        Self::PointList,
        Self::SpriteList,
    ];

    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::TriList => "trilist",
            Self::TriStrip => "tristrip",
            Self::TriFan => "trifan",
            Self::LineList => "linelist",
            Self::LineStrip => "linestrip",
            Self::PointList => "points",
            Self::SpriteList => "sprites",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == keyword)
    }

    /// True for topologies whose primitives are independent, so two index
    /// lists of this kind can be concatenated without creating new primitives.
    pub fn is_list(self) -> bool {
        matches!(
            self,
            Self::TriList | Self::LineList | Self::PointList | Self::SpriteList
        )
    }

    pub fn is_triangles(self) -> bool {
        matches!(self, Self::TriList | Self::TriStrip | Self::TriFan)
    }

    /// Number of primitives drawn from `index_count` indices.
    pub fn primitive_count(self, index_count: usize) -> usize {
        match self {
            Self::TriList => index_count / 3,
            Self::TriStrip | Self::TriFan => index_count.saturating_sub(2),
            Self::LineList => index_count / 2,
            Self::LineStrip => index_count.saturating_sub(1),
            Self::PointList | Self::SpriteList => index_count,
        }
    }
}

/// A batch of indices sharing one topology and one material reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrimitiveGroup {
    pub kind: PrimitiveKind,
    /// Index into the owning model's material list, `None` when unbound.
    pub material: Option<u32>,
    pub indices: Vec<u32>,
}

impl PrimitiveGroup {
    pub fn new(kind: PrimitiveKind, material: Option<u32>, indices: Vec<u32>) -> Self {
        Self {
            kind,
            material,
            indices,
        }
    }

    pub fn primitive_count(&self) -> usize {
        self.kind.primitive_count(self.indices.len())
    }

    /// Sort key for the material reference; unbound sorts last.
    pub fn material_key(&self) -> u32 {
        self.material.unwrap_or(u32::MAX)
    }
}

/// Errors raised when mesh contents break their structural invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("vertex layout has no attributes")]
    EmptyLayout,

    #[error("vertex layout has {count} attributes, at most {max} are allowed", max = VertexLayout::MAX_ATTRIBUTES)]
    TooManyAttributes { count: usize },

    #[error("mesh has no vertices")]
    NoVertices,

    #[error("vertex data length {len} is not a multiple of stride {stride}")]
    VertexDataLength { len: usize, stride: u32 },

    #[error("vertex count does not fit in 32 bits")]
    TooManyVertices,

    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: u32 },
}

/// A vertex buffer, its layout and the primitive groups that draw from it.
///
/// The vertex buffer is exclusively owned and always exactly
/// `stride * vertex_count` bytes; every group index is below `vertex_count`.
#[derive(Debug, Clone)]
pub struct Mesh {
    layout: VertexLayout,
    vertices: Vec<u8>,
    vertex_count: u32,
    groups: Vec<PrimitiveGroup>,
    label: Option<String>,
}

impl Mesh {
    /// Create a mesh from a layout and raw vertex rows.
    pub fn new(layout: VertexLayout, vertices: Vec<u8>) -> Result<Self, MeshError> {
        if layout.is_empty() {
            return Err(MeshError::EmptyLayout);
        }
        if layout.len() > VertexLayout::MAX_ATTRIBUTES {
            return Err(MeshError::TooManyAttributes {
                count: layout.len(),
            });
        }
        let stride = layout.stride() as usize;
        if vertices.len() % stride != 0 {
            return Err(MeshError::VertexDataLength {
                len: vertices.len(),
                stride: layout.stride(),
            });
        }
        let vertex_count =
            u32::try_from(vertices.len() / stride).map_err(|_| MeshError::TooManyVertices)?;
        if vertex_count == 0 {
            return Err(MeshError::NoVertices);
        }

        Ok(Self {
            layout,
            vertices,
            vertex_count,
            groups: Vec::new(),
            label: None,
        })
    }

    /// Create a mesh from `f32` vertex values laid out per `layout`.
    ///
    /// Convenient for layouts without `UByte4` attributes.
    pub fn from_floats(layout: VertexLayout, values: &[f32]) -> Result<Self, MeshError> {
        Self::new(layout, bytemuck::cast_slice(values).to_vec())
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a primitive group.
    pub fn with_group(mut self, group: PrimitiveGroup) -> Result<Self, MeshError> {
        self.add_group(group)?;
        Ok(self)
    }

    /// Append a primitive group after checking its indices.
    pub fn add_group(&mut self, group: PrimitiveGroup) -> Result<(), MeshError> {
        if let Some(&index) = group.indices.iter().find(|&&i| i >= self.vertex_count) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count: self.vertex_count,
            });
        }
        self.groups.push(group);
        Ok(())
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn stride(&self) -> u32 {
        self.layout.stride()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Raw vertex rows, `stride * vertex_count` bytes.
    pub fn vertex_data(&self) -> &[u8] {
        &self.vertices
    }

    /// Raw bytes of one vertex row.
    pub fn vertex(&self, index: u32) -> Option<&[u8]> {
        if index >= self.vertex_count {
            return None;
        }
        let stride = self.stride() as usize;
        let start = index as usize * stride;
        self.vertices.get(start..start + stride)
    }

    pub fn groups(&self) -> &[PrimitiveGroup] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Option<&PrimitiveGroup> {
        self.groups.get(index)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Total number of primitives across all groups.
    pub fn primitive_count(&self) -> usize {
        self.groups.iter().map(PrimitiveGroup::primitive_count).sum()
    }

    /// Material reference used to order meshes: that of the last group,
    /// material 0 for a mesh without groups, unbound sorting last.
    pub fn material_key(&self) -> u32 {
        self.groups.last().map_or(0, PrimitiveGroup::material_key)
    }

    /// True if any group references `material`.
    pub fn uses_material(&self, material: u32) -> bool {
        self.groups.iter().any(|g| g.material == Some(material))
    }

    /// Rewrite every bound material reference through `map`
    /// (`map[old] == new`). References outside `map` are left untouched.
    pub fn remap_materials(&mut self, map: &[u32]) {
        for group in &mut self.groups {
            if let Some(material) = group.material {
                if let Some(&new) = map.get(material as usize) {
                    group.material = Some(new);
                }
            }
        }
    }

    /// Merge primitive groups that share a material.
    ///
    /// Groups are stably ordered by `(material, kind)`; adjacent list groups
    /// with identical kind and material are concatenated. Strips and fans are
    /// reordered but never joined.
    pub fn aggregate_by_material(&mut self) {
        if self.groups.len() < 2 {
            return;
        }
        self.groups.sort_by_key(|g| (g.material_key(), g.kind));

        let mut merged: Vec<PrimitiveGroup> = Vec::with_capacity(self.groups.len());
        for group in self.groups.drain(..) {
            match merged.last_mut() {
                Some(last)
                    if last.kind.is_list()
                        && last.kind == group.kind
                        && last.material == group.material =>
                {
                    last.indices.extend_from_slice(&group.indices);
                }
                _ => merged.push(group),
            }
        }
        self.groups = merged;
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [PrimitiveGroup] {
        &mut self.groups
    }

    /// Swap in new vertex rows of the same layout. Callers remap indices.
    pub(crate) fn set_vertices(&mut self, vertices: Vec<u8>, vertex_count: u32) {
        debug_assert_eq!(vertices.len(), vertex_count as usize * self.stride() as usize);
        self.vertices = vertices;
        self.vertex_count = vertex_count;
    }

    /// Move the groups out, leaving the mesh without any.
    pub(crate) fn take_groups(&mut self) -> Vec<PrimitiveGroup> {
        std::mem::take(&mut self.groups)
    }

    /// Read one `f32` at `offset` inside vertex row `index`.
    pub(crate) fn read_f32(&self, index: u32, offset: u32) -> f32 {
        let start = index as usize * self.stride() as usize + offset as usize;
        bytemuck::pod_read_unaligned(&self.vertices[start..start + 4])
    }

    /// Read three consecutive `f32`s at `offset` inside vertex row `index`.
    pub(crate) fn read_vec3(&self, index: u32, offset: u32) -> crate::math::Vec3 {
        let start = index as usize * self.stride() as usize + offset as usize;
        let v: [f32; 3] = bytemuck::pod_read_unaligned(&self.vertices[start..start + 12]);
        crate::math::Vec3::from(v)
    }

    pub(crate) fn write_f32(&mut self, index: u32, offset: u32, value: f32) {
        let start = index as usize * self.stride() as usize + offset as usize;
        self.vertices[start..start + 4].copy_from_slice(bytemuck::bytes_of(&value));
    }

    pub(crate) fn write_vec3(&mut self, index: u32, offset: u32, value: &crate::math::Vec3) {
        let start = index as usize * self.stride() as usize + offset as usize;
        let v: [f32; 3] = [value.x, value.y, value.z];
        self.vertices[start..start + 12].copy_from_slice(bytemuck::bytes_of(&v));
    }
}

/// Meshes compare by content; labels are ignored.
impl PartialEq for Mesh {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout
            && self.vertex_count == other.vertex_count
            && self.vertices == other.vertices
            && self.groups == other.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{VertexFormat, VertexSemantic};

    fn triangle() -> Mesh {
        Mesh::from_floats(
            VertexLayout::position_only(),
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn test_new_mesh() {
        let mesh = triangle().with_label("tri");
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.stride(), 12);
        assert_eq!(mesh.vertex_data().len(), 36);
        assert_eq!(mesh.label(), Some("tri"));
        assert_eq!(mesh.vertex(2).map(<[u8]>::len), Some(12));
        assert!(mesh.vertex(3).is_none());
    }

    #[test]
    fn test_new_mesh_rejects_bad_input() {
        assert_eq!(
            Mesh::new(VertexLayout::new(), vec![0; 12]).unwrap_err(),
            MeshError::EmptyLayout
        );
        assert_eq!(
            Mesh::new(VertexLayout::position_only(), vec![]).unwrap_err(),
            MeshError::NoVertices
        );
        assert_eq!(
            Mesh::new(VertexLayout::position_only(), vec![0; 13]).unwrap_err(),
            MeshError::VertexDataLength { len: 13, stride: 12 }
        );

        let mut layout = VertexLayout::new();
        for _ in 0..17 {
            layout.push(VertexSemantic::PointSize, VertexFormat::Float1);
        }
        assert_eq!(
            Mesh::new(layout, vec![0; 68]).unwrap_err(),
            MeshError::TooManyAttributes { count: 17 }
        );
    }

    #[test]
    fn test_add_group_checks_indices() {
        let mut mesh = triangle();
        assert!(mesh
            .add_group(PrimitiveGroup::new(PrimitiveKind::TriList, Some(0), vec![0, 1, 2]))
            .is_ok());
        let err = mesh
            .add_group(PrimitiveGroup::new(PrimitiveKind::TriList, None, vec![0, 1, 3]))
            .unwrap_err();
        assert_eq!(
            err,
            MeshError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            }
        );
        assert_eq!(mesh.group_count(), 1, "rejected group must not be added");
    }

    #[test]
    fn test_primitive_counts() {
        assert_eq!(PrimitiveKind::TriList.primitive_count(9), 3);
        assert_eq!(PrimitiveKind::TriStrip.primitive_count(5), 3);
        assert_eq!(PrimitiveKind::TriFan.primitive_count(1), 0);
        assert_eq!(PrimitiveKind::LineList.primitive_count(4), 2);
        assert_eq!(PrimitiveKind::LineStrip.primitive_count(4), 3);
        assert_eq!(PrimitiveKind::LineStrip.primitive_count(0), 0);
        assert_eq!(PrimitiveKind::PointList.primitive_count(7), 7);
        assert_eq!(PrimitiveKind::SpriteList.primitive_count(2), 2);
    }

    #[test]
    fn test_aggregate_by_material() {
        let mut mesh = triangle();
        let groups = [
            (PrimitiveKind::TriList, Some(1), vec![0, 1, 2]),
            (PrimitiveKind::TriStrip, Some(0), vec![0, 1, 2]),
            (PrimitiveKind::TriList, Some(0), vec![2, 1, 0]),
            (PrimitiveKind::TriList, Some(1), vec![1, 2, 0]),
            (PrimitiveKind::TriStrip, Some(0), vec![2, 1, 0]),
            (PrimitiveKind::TriList, None, vec![0, 2, 1]),
        ];
        for (kind, material, indices) in groups {
            mesh.add_group(PrimitiveGroup::new(kind, material, indices))
                .unwrap();
        }

        mesh.aggregate_by_material();

        let summary: Vec<_> = mesh
            .groups()
            .iter()
            .map(|g| (g.kind, g.material, g.indices.len()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (PrimitiveKind::TriList, Some(0), 3),
                (PrimitiveKind::TriStrip, Some(0), 3),
                (PrimitiveKind::TriStrip, Some(0), 3),
                (PrimitiveKind::TriList, Some(1), 6),
                (PrimitiveKind::TriList, None, 3),
            ]
        );
        assert_eq!(mesh.groups()[3].indices, vec![0, 1, 2, 1, 2, 0]);
        assert_eq!(mesh.material_key(), u32::MAX);
    }

    #[test]
    fn test_remap_materials() {
        let mut mesh = triangle()
            .with_group(PrimitiveGroup::new(PrimitiveKind::PointList, Some(2), vec![0]))
            .unwrap()
            .with_group(PrimitiveGroup::new(PrimitiveKind::PointList, None, vec![1]))
            .unwrap();
        mesh.remap_materials(&[0, 0, 1]);
        assert_eq!(mesh.groups()[0].material, Some(1));
        assert_eq!(mesh.groups()[1].material, None);
        assert!(mesh.uses_material(1));
        assert!(!mesh.uses_material(2));
    }

    #[test]
    fn test_vertex_access() {
        let mut mesh = triangle();
        assert_eq!(mesh.read_vec3(1, 0), crate::math::Vec3::new(1.0, 0.0, 0.0));
        mesh.write_vec3(1, 0, &crate::math::Vec3::new(4.0, 5.0, 6.0));
        mesh.write_f32(0, 8, -1.0);
        assert_eq!(mesh.read_f32(1, 4), 5.0);
        assert_eq!(mesh.read_f32(0, 8), -1.0);
    }
}
