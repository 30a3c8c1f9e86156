//! Post-load conditioning: material deduplication, mesh ordering and
//! opacity classification.
//!
//! The steps are meant to run in the order of [`ConditioningStage`], which
//! [`Model::condition`] does. Each step is idempotent.

use std::cmp::Ordering;

use crate::material::TextureSemantic;
use crate::mesh::Mesh;
use crate::{profile_function, profile_scope};

use super::Model;

/// Progress of a model through the conditioning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ConditioningStage {
    /// Freshly decoded or modified since the last conditioning.
    #[default]
    Decoded,
    MaterialsDeduplicated,
    MeshesOrdered,
    OpacityClassified,
}

/// Ordering strategy for [`Model::sort_meshes`].
pub type MeshComparator = fn(&Mesh, &Mesh) -> Ordering;

/// Default mesh order: ascending material index of each mesh's last group.
///
/// After deduplication materials are sorted opaque first, then additive,
/// then by falling opacity, so this roughly draws translucent meshes after
/// opaque ones. It works at
/// mesh granularity only; meshes mixing opaque and translucent groups are
/// ordered by their last group.
pub fn opacity_order(a: &Mesh, b: &Mesh) -> Ordering {
    a.material_key().cmp(&b.material_key())
}

impl Model {
    /// Run the whole pipeline with the default mesh order.
    pub fn condition(&mut self) {
        profile_function!();
        self.uniquify_materials();
        self.sort_meshes(opacity_order);
        self.determine_opacity();
    }

    /// Sort materials into canonical order, drop duplicates and remap every
    /// primitive group to the surviving material.
    ///
    /// Returns the number of materials removed.
    pub fn uniquify_materials(&mut self) -> usize {
        profile_function!();

        let before = self.materials.len();
        if before > 1 {
            let mut order: Vec<usize> = (0..before).collect();
            order.sort_by(|&a, &b| self.materials[a].canonical_cmp(&self.materials[b]));

            let mut map = vec![0u32; before];
            let mut unique = Vec::with_capacity(before);
            for &original in &order {
                let material = &self.materials[original];
                let is_duplicate = unique.last().is_some_and(|&last: &usize| {
                    self.materials[last].canonical_cmp(material) == Ordering::Equal
                });
                if !is_duplicate {
                    unique.push(original);
                }
                map[original] = (unique.len() - 1) as u32;
            }

            let mut old = std::mem::take(&mut self.materials);
            self.materials = unique
                .iter()
                .map(|&i| std::mem::take(&mut old[i]))
                .collect();
            for mesh in &mut self.meshes {
                mesh.remap_materials(&map);
            }
            self.recompute_texture_usage();

            log::debug!(
                "Material deduplication: {} -> {} materials",
                before,
                self.materials.len()
            );
        }

        self.advance(ConditioningStage::MaterialsDeduplicated);
        before - self.materials.len()
    }

    /// Aggregate each mesh's groups by material, then stably sort the meshes.
    pub fn sort_meshes(&mut self, mut comparator: impl FnMut(&Mesh, &Mesh) -> Ordering) {
        profile_function!();
        {
            profile_scope!("aggregate_by_material");
            for mesh in &mut self.meshes {
                mesh.aggregate_by_material();
            }
        }
        self.meshes.sort_by(|a, b| comparator(a, b));
        self.advance(ConditioningStage::MeshesOrdered);
    }

    /// Recompute the opaque flag and texture usage from the material list.
    pub fn determine_opacity(&mut self) {
        self.opaque = !self.materials.iter().any(|m| m.is_translucent());
        self.recompute_texture_usage();
        self.advance(ConditioningStage::OpacityClassified);
    }

    fn recompute_texture_usage(&mut self) {
        for semantic in TextureSemantic::ALL {
            self.texture_usage[semantic.index()] =
                self.materials.iter().any(|m| m.map(semantic).is_some());
        }
    }

    fn advance(&mut self, stage: ConditioningStage) {
        self.stage = self.stage.max(stage);
    }
}
