//! Whole-model geometry operations used by `cmodfix`.

use crate::material::TextureSemantic;
use crate::mesh::{Mesh, MeshError, NormalError, PrimitiveGroup, VertexSemantic};
use crate::profile_function;

use super::{ConditioningStage, Model};

impl Model {
    /// Merge meshes that share an identical vertex layout.
    ///
    /// Each merged mesh takes the position of the first mesh of its layout.
    /// Vertex rows are concatenated and group indices offset accordingly.
    /// Returns the number of meshes removed.
    pub fn merge_meshes(&mut self) -> Result<usize, MeshError> {
        profile_function!();

        let mut buckets: Vec<Vec<usize>> = Vec::new();
        for (i, mesh) in self.meshes.iter().enumerate() {
            match buckets
                .iter_mut()
                .find(|b| self.meshes[b[0]].layout() == mesh.layout())
            {
                Some(bucket) => bucket.push(i),
                None => buckets.push(vec![i]),
            }
        }
        if buckets.len() == self.meshes.len() {
            return Ok(0);
        }
        for bucket in &buckets {
            let total: u64 = bucket
                .iter()
                .map(|&i| u64::from(self.meshes[i].vertex_count()))
                .sum();
            if total > u64::from(u32::MAX) {
                return Err(MeshError::TooManyVertices);
            }
        }

        let before = self.meshes.len();
        let mut old: Vec<Option<Mesh>> = std::mem::take(&mut self.meshes)
            .into_iter()
            .map(Some)
            .collect();
        for bucket in buckets {
            let mut parts: Vec<Mesh> = bucket.iter().filter_map(|&i| old[i].take()).collect();
            if parts.len() == 1 {
                self.meshes.extend(parts);
                continue;
            }

            let layout = parts[0].layout().clone();
            let label = parts[0].label().map(str::to_owned);
            let mut vertices = Vec::new();
            let mut groups = Vec::new();
            let mut base = 0u32;
            for part in &mut parts {
                vertices.extend_from_slice(part.vertex_data());
                for mut group in part.take_groups() {
                    for index in &mut group.indices {
                        *index += base;
                    }
                    groups.push(group);
                }
                base += part.vertex_count();
            }

            let mut merged = Mesh::new(layout, vertices)?;
            if let Some(label) = label {
                merged = merged.with_label(label);
            }
            for group in groups {
                merged.add_group(group)?;
            }
            self.meshes.push(merged);
        }

        self.stage = ConditioningStage::Decoded;
        log::debug!("Merged {} meshes into {}", before, self.meshes.len());
        Ok(before - self.meshes.len())
    }

    /// Replace the normals of every mesh with generated ones.
    ///
    /// `smooth_angle` is in radians. Fails without touching the model when
    /// any mesh cannot take normals. Returns the number of meshes rewritten.
    pub fn generate_normals(
        &mut self,
        smooth_angle: f32,
        weld_tolerance: Option<f32>,
    ) -> Result<usize, NormalError> {
        profile_function!();

        let meshes = self
            .meshes
            .iter()
            .enumerate()
            .map(|(index, mesh)| {
                mesh.generate_normals(smooth_angle, weld_tolerance)
                    .map_err(|e| {
                        log::warn!("Cannot generate normals for mesh {}: {}", index, e);
                        e
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.meshes = meshes;
        Ok(self.meshes.len())
    }

    /// Generate tangents for meshes that use a normal-mapped material but
    /// have no tangent attribute.
    ///
    /// Meshes that cannot receive tangents are left unchanged and logged.
    /// Returns the number of meshes rewritten.
    pub fn generate_missing_tangents(&mut self) -> usize {
        profile_function!();

        let normal_mapped: Vec<u32> = self
            .materials
            .iter()
            .enumerate()
            .filter(|(_, m)| m.map(TextureSemantic::Normal).is_some())
            .map(|(i, _)| i as u32)
            .collect();

        let mut generated = 0;
        for (index, mesh) in self.meshes.iter_mut().enumerate() {
            let needs_tangents = !mesh.layout().has_semantic(VertexSemantic::Tangent)
                && normal_mapped.iter().any(|&m| mesh.uses_material(m));
            if !needs_tangents {
                continue;
            }
            match mesh.generate_tangents() {
                Ok(with_tangents) => {
                    *mesh = with_tangents;
                    generated += 1;
                }
                Err(e) => log::warn!("Cannot generate tangents for mesh {}: {}", index, e),
            }
        }
        generated
    }

    /// Remove duplicate vertex rows from every mesh. Returns the number of
    /// rows removed.
    pub fn uniquify_vertices(&mut self) -> usize {
        self.meshes.iter_mut().map(Mesh::uniquify_vertices).sum()
    }

    /// All primitive groups of all meshes, in mesh order.
    pub fn groups(&self) -> impl Iterator<Item = &PrimitiveGroup> {
        self.meshes.iter().flat_map(|m| m.groups())
    }
}
