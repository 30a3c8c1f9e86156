use crate::material::{TextureHandle, TextureRegistry};
use crate::model::Model;

use super::{CmodError, BINARY_HEADER};


/// One red material and a single triangle with positions and normals.
const RED_TRIANGLE: &str = "#celmodel__ascii

material
diffuse 1 0 0
end_material

mesh
vertexdesc
position f3
normal f3
end_vertexdesc

vertices 3
0 0 0 0 0 1
1 0 0 0 0 1
0 1 0 0 0 1

trilist 0 3
0 1 2

end_mesh
";

/// Resolver for files that must not declare textures.
fn no_textures(name: &str) -> TextureHandle {
    panic!("unexpected texture {name}")
}

/// Decode `data`, interning texture names in `registry`.
fn load_with(registry: &mut TextureRegistry, data: &[u8]) -> Result<Model, CmodError> {
    super::load_model_from_bytes(data, |name| registry.handle(name))
}

/// Structural equality: materials, layouts, vertex data and groups.
fn assert_same_content(a: &Model, b: &Model) {
    assert_eq!(a.materials(), b.materials(), "materials differ");
    assert_eq!(a.mesh_count(), b.mesh_count(), "mesh counts differ");
    for (i, (x, y)) in a.meshes().iter().zip(b.meshes()).enumerate() {
        assert_eq!(x.layout(), y.layout(), "mesh {i} layout");
        assert_eq!(x.vertex_data(), y.vertex_data(), "mesh {i} vertex data");
        assert_eq!(x.groups(), y.groups(), "mesh {i} groups");
    }
}

/// Hand-assembles binary model streams.
#[derive(Default)]
struct BinaryBuilder {
    data: Vec<u8>,
}

impl BinaryBuilder {
    fn new() -> Self {
        let mut builder = Self::default();
        builder.data.extend_from_slice(BINARY_HEADER);
        builder
    }

    fn i16(mut self, value: i16) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn u16(mut self, value: u16) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn u32(mut self, value: u32) -> Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn f32s(mut self, values: &[f32]) -> Self {
        for value in values {
            self.data.extend_from_slice(&value.to_le_bytes());
        }
        self
    }

    fn bytes(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    fn build(self) -> Vec<u8> {
        self.data
    }
}
