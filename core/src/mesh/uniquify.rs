//! Removal of duplicate vertex rows.

use crate::profile_function;

use super::data::Mesh;

impl Mesh {
    /// Collapse byte-identical vertex rows into one and remap every index.
    ///
    /// Surviving rows keep their relative order. Returns the number of rows
    /// removed.
    pub fn uniquify_vertices(&mut self) -> usize {
        profile_function!();

        let count = self.vertex_count() as usize;
        let stride = self.stride() as usize;
        let data = self.vertex_data();
        let row = |i: usize| &data[i * stride..(i + 1) * stride];

        // Stable sort, so the lowest index of each run of equal rows comes first.
        let mut order: Vec<usize> = (0..count).collect();
        order.sort_by(|&a, &b| row(a).cmp(row(b)));

        let mut representative: Vec<usize> = (0..count).collect();
        for pair in order.windows(2) {
            if row(pair[0]) == row(pair[1]) {
                representative[pair[1]] = representative[pair[0]];
            }
        }

        let mut new_index = vec![0u32; count];
        let mut unique = Vec::with_capacity(data.len());
        let mut next = 0u32;
        for i in 0..count {
            if representative[i] == i {
                new_index[i] = next;
                unique.extend_from_slice(row(i));
                next += 1;
            } else {
                new_index[i] = new_index[representative[i]];
            }
        }

        let removed = count - next as usize;
        if removed == 0 {
            return 0;
        }

        self.set_vertices(unique, next);
        for group in self.groups_mut() {
            for index in &mut group.indices {
                *index = new_index[*index as usize];
            }
        }
        log::debug!("Removed {} duplicate vertices, {} remain", removed, next);
        removed
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh::{Mesh, PrimitiveGroup, PrimitiveKind, VertexLayout};

    #[test]
    fn test_uniquify_vertices() {
        #[rustfmt::skip]
        let positions = [
            1.0, 0.0, 0.0,
            0.0, 0.0, 0.0,
            1.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            0.0, 0.0, 0.0,
        ];
        let mut mesh = Mesh::from_floats(VertexLayout::position_only(), &positions)
            .unwrap()
            .with_group(PrimitiveGroup::new(
                PrimitiveKind::TriList,
                None,
                vec![0, 1, 3, 2, 4, 3],
            ))
            .unwrap();

        assert_eq!(mesh.uniquify_vertices(), 2);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.groups()[0].indices, vec![0, 1, 2, 0, 1, 2]);
        let values: Vec<f32> = mesh
            .vertex_data()
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(values, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);

        assert_eq!(mesh.uniquify_vertices(), 0, "second pass is a no-op");
    }
}
