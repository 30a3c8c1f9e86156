//! The in-memory model.
//!
//! A [`Model`] owns a list of [`Material`]s and a list of [`Mesh`]es whose
//! primitive groups reference materials by index. Decoders append materials
//! first and meshes second; the conditioning pipeline in [`condition`] then
//! deduplicates materials and orders meshes for rendering.

mod condition;
mod ops;

pub use condition::{opacity_order, ConditioningStage, MeshComparator};

use crate::material::{Material, TextureSemantic};
use crate::math::{BoundingBox, DVec3, Vec3};
use crate::mesh::{Mesh, PickResult};

/// Nearest ray hit inside a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPickResult {
    /// Index of the mesh that was hit.
    pub mesh: usize,
    pub hit: PickResult,
}

/// Materials plus the meshes that reference them.
#[derive(Debug, Clone)]
pub struct Model {
    materials: Vec<Material>,
    meshes: Vec<Mesh>,
    opaque: bool,
    normalized: bool,
    texture_usage: [bool; TextureSemantic::COUNT],
    stage: ConditioningStage,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            materials: Vec::new(),
            meshes: Vec::new(),
            opaque: true,
            normalized: false,
            texture_usage: [false; TextureSemantic::COUNT],
            stage: ConditioningStage::Decoded,
        }
    }
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a material and return its index.
    pub fn add_material(&mut self, material: Material) -> u32 {
        for semantic in TextureSemantic::ALL {
            if material.map(semantic).is_some() {
                self.texture_usage[semantic.index()] = true;
            }
        }
        if material.is_translucent() {
            self.opaque = false;
        }
        self.materials.push(material);
        self.stage = ConditioningStage::Decoded;
        (self.materials.len() - 1) as u32
    }

    /// Append a mesh and return its index.
    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.stage = ConditioningStage::Decoded;
        self.meshes.len() - 1
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, index: u32) -> Option<&Material> {
        self.materials.get(index as usize)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn mesh(&self, index: usize) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// False if any material needs blending.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// True once [`Model::normalize`] has fitted the model into the unit box.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// True if any material binds a map of this semantic.
    pub fn uses_texture_type(&self, semantic: TextureSemantic) -> bool {
        self.texture_usage[semantic.index()]
    }

    /// Furthest conditioning step applied since the last addition.
    pub fn stage(&self) -> ConditioningStage {
        self.stage
    }

    /// Total vertices across all meshes.
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertex_count() as usize).sum()
    }

    /// Total primitives across all meshes.
    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(Mesh::primitive_count).sum()
    }

    /// True if every bound material reference points into the material list.
    pub fn material_references_valid(&self) -> bool {
        let count = self.materials.len();
        self.meshes.iter().all(|mesh| {
            mesh.groups()
                .iter()
                .filter_map(|g| g.material)
                .all(|m| (m as usize) < count)
        })
    }

    /// Union of the bounding boxes of all meshes.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for mesh in &self.meshes {
            bbox.include_box(&mesh.bounding_box());
        }
        bbox
    }

    /// Apply `v' = (v + translation) * scale` to every mesh.
    pub fn transform(&mut self, translation: &Vec3, scale: f32) {
        for mesh in &mut self.meshes {
            mesh.transform(translation, scale);
        }
    }

    /// Center the model on `center_offset` and scale its longest axis to 2.
    ///
    /// Models without positions, or whose positions are all the same point,
    /// are left unchanged.
    pub fn normalize(&mut self, center_offset: &Vec3) {
        let bbox = self.bounding_box();
        let max_extent = bbox.max_extent();
        if bbox.is_empty() || max_extent <= 0.0 {
            log::warn!("Model has no extent, skipping normalization");
            return;
        }
        let center = bbox.center() + center_offset;
        self.transform(&-center, 2.0 / max_extent);
        self.normalized = true;
    }

    /// Nearest intersection of a ray with the triangles of any mesh.
    pub fn pick(&self, origin: &DVec3, direction: &DVec3) -> Option<ModelPickResult> {
        self.meshes
            .iter()
            .enumerate()
            .filter_map(|(mesh, m)| {
                m.pick(origin, direction)
                    .map(|hit| ModelPickResult { mesh, hit })
            })
            .min_by(|a, b| a.hit.distance.total_cmp(&b.hit.distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{BlendMode, TextureHandle};
    use crate::mesh::{PrimitiveGroup, PrimitiveKind, VertexLayout};

    fn square(offset: f32, material: Option<u32>) -> Mesh {
        #[rustfmt::skip]
        let positions = [
            offset,       0.0, 0.0,
            offset + 1.0, 0.0, 0.0,
            offset + 1.0, 1.0, 0.0,
            offset,       1.0, 0.0,
        ];
        Mesh::from_floats(VertexLayout::position_only(), &positions)
            .unwrap()
            .with_group(PrimitiveGroup::new(
                PrimitiveKind::TriFan,
                material,
                vec![0, 1, 2, 3],
            ))
            .unwrap()
    }

    #[test]
    fn test_add_material_updates_flags() {
        let mut model = Model::new();
        assert!(model.is_opaque());
        assert_eq!(model.add_material(Material::new()), 0);
        assert!(model.is_opaque());
        assert!(!model.uses_texture_type(TextureSemantic::Normal));

        let index = model.add_material(
            Material::new()
                .with_blend(BlendMode::Additive)
                .with_map(TextureSemantic::Normal, TextureHandle(0)),
        );
        assert_eq!(index, 1);
        assert!(!model.is_opaque());
        assert!(model.uses_texture_type(TextureSemantic::Normal));
        assert!(!model.uses_texture_type(TextureSemantic::Diffuse));
    }

    #[test]
    fn test_statistics() {
        let mut model = Model::new();
        model.add_material(Material::new());
        model.add_mesh(square(0.0, Some(0)));
        model.add_mesh(square(2.0, None));

        assert_eq!(model.mesh_count(), 2);
        assert_eq!(model.vertex_count(), 8);
        assert_eq!(model.primitive_count(), 4);
        assert!(model.material_references_valid());

        model.add_mesh(square(4.0, Some(1)));
        assert!(!model.material_references_valid());
    }

    #[test]
    fn test_normalize() {
        let mut model = Model::new();
        model.add_mesh(square(0.0, None));
        model.add_mesh(square(3.0, None));

        model.normalize(&Vec3::zeros());
        assert!(model.is_normalized());

        let bbox = model.bounding_box();
        assert!((bbox.min - Vec3::new(-1.0, -0.25, 0.0)).norm() < 1e-6);
        assert!((bbox.max - Vec3::new(1.0, 0.25, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_normalize_degenerate_model() {
        let mut model = Model::new();
        model.add_mesh(Mesh::from_floats(VertexLayout::position_only(), &[1.0, 1.0, 1.0]).unwrap());
        model.normalize(&Vec3::zeros());
        assert!(!model.is_normalized());
    }

    #[test]
    fn test_pick_nearest_mesh() {
        let mut model = Model::new();
        model.add_mesh(square(0.0, None));
        let mut near = square(0.0, None);
        near.transform(&Vec3::new(0.0, 0.0, 1.0), 1.0);
        model.add_mesh(near);

        let hit = model
            .pick(&DVec3::new(0.5, 0.5, 10.0), &DVec3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_eq!(hit.mesh, 1);
        assert!((hit.hit.distance - 9.0).abs() < 1e-9);

        assert!(model
            .pick(&DVec3::new(5.0, 5.0, 10.0), &DVec3::new(0.0, 0.0, -1.0))
            .is_none());
    }
}
