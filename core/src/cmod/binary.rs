//! Binary model format reader and writer.
//!
//! After the 16-byte header the stream is a sequence of little-endian
//! 16-bit tokens. Material properties carry a 16-bit type tag before their
//! payload so that readers can skip properties they do not know:
//!
//! | Type tag | Payload                          |
//! |----------|----------------------------------|
//! | Float1-4 | 1-4 `f32`                        |
//! | String   | `u16` length, then UTF-8 bytes   |
//! | Uint32   | `u32`                            |
//! | Color    | 3 `f32` (red, green, blue)       |
//!
//! Vertex rows and primitive groups are untagged because the vertex layout
//! already fixes their shape.

use std::io::Write;

use crate::material::{
    BlendMode, Color, Material, TextureHandle, TextureSemantic, DEFAULT_BLEND, DEFAULT_DIFFUSE,
    DEFAULT_EMISSIVE, DEFAULT_OPACITY, DEFAULT_SPECULAR, DEFAULT_SPECULAR_POWER,
};
use crate::mesh::{
    Mesh, PrimitiveGroup, PrimitiveKind, VertexFormat, VertexLayout, VertexSemantic,
};
use crate::model::Model;
use crate::profile_function;

use super::error::{alloc_zeroed, try_vec, CmodError, Result, SourceLocation};
use super::{BINARY_HEADER, NO_MATERIAL};

/// Block and property tokens.
pub(crate) mod token {
    pub const MATERIAL: i16 = 1001;
    pub const END_MATERIAL: i16 = 1002;
    pub const DIFFUSE: i16 = 1003;
    pub const SPECULAR: i16 = 1004;
    pub const SPECULAR_POWER: i16 = 1005;
    pub const OPACITY: i16 = 1006;
    pub const TEXTURE: i16 = 1007;
    pub const MESH: i16 = 1009;
    pub const END_MESH: i16 = 1010;
    pub const VERTEX_DESC: i16 = 1011;
    pub const END_VERTEX_DESC: i16 = 1012;
    pub const VERTICES: i16 = 1013;
    pub const EMISSIVE: i16 = 1014;
    pub const BLEND: i16 = 1015;

    /// Smallest token code. Anything below is an enum code
    /// (semantic or primitive kind).
    pub const FIRST: i16 = 1000;
}

/// Value type tags.
pub(crate) mod type_tag {
    pub const FLOAT1: i16 = 1;
    pub const FLOAT2: i16 = 2;
    pub const FLOAT3: i16 = 3;
    pub const FLOAT4: i16 = 4;
    pub const STRING: i16 = 5;
    pub const UINT32: i16 = 6;
    pub const COLOR: i16 = 7;
}

const LOCATION: SourceLocation = SourceLocation::Binary;

fn truncated() -> CmodError {
    CmodError::TruncatedStream { location: LOCATION }
}

// ============================================================================
// Reader
// ============================================================================

/// Little-endian cursor over an in-memory byte stream.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let data = self.data;
        let end = self.pos.checked_add(len).ok_or_else(truncated)?;
        let bytes = data.get(self.pos..end).ok_or_else(truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }
}

/// Decode the body of a binary model file (everything after the header).
pub(crate) fn decode(
    data: &[u8],
    resolve: impl FnMut(&str) -> TextureHandle,
) -> Result<Model> {
    BinaryReader {
        bytes: ByteReader::new(data),
        resolve,
        model: Model::new(),
    }
    .read()
}

struct BinaryReader<'a, F> {
    bytes: ByteReader<'a>,
    resolve: F,
    model: Model,
}

impl<F: FnMut(&str) -> TextureHandle> BinaryReader<'_, F> {
    fn read(mut self) -> Result<Model> {
        profile_function!();

        let mut seen_mesh = false;
        while !self.bytes.is_at_end() {
            match self.bytes.read_i16()? {
                token::MATERIAL => {
                    if seen_mesh {
                        return Err(CmodError::MaterialsAfterMeshes { location: LOCATION });
                    }
                    let material = self.read_material()?;
                    self.model.add_material(material);
                }
                token::MESH => {
                    seen_mesh = true;
                    let mesh = self.read_mesh()?;
                    self.model.add_mesh(mesh);
                }
                other => {
                    return Err(CmodError::UnknownBlockType {
                        name: format!("token {other}"),
                        location: LOCATION,
                    })
                }
            }
        }

        log::debug!(
            "Decoded binary model: {} materials, {} meshes",
            self.model.material_count(),
            self.model.mesh_count()
        );
        Ok(self.model)
    }

    /// Read a token or type tag and require it to be `expected`.
    fn expect_code(&mut self, expected: i16, message: &str) -> Result<()> {
        if self.bytes.read_i16()? != expected {
            return Err(CmodError::record(message));
        }
        Ok(())
    }

    fn read_color(&mut self, what: &str) -> Result<Color> {
        self.expect_code(type_tag::COLOR, &format!("incorrect type for {what}"))?;
        Ok(Color::new(
            self.bytes.read_f32()?,
            self.bytes.read_f32()?,
            self.bytes.read_f32()?,
        ))
    }

    fn read_float1(&mut self, what: &str) -> Result<f32> {
        self.expect_code(type_tag::FLOAT1, &format!("float expected for {what}"))?;
        self.bytes.read_f32()
    }

    /// Skip a tagged value following an unrecognized token.
    fn skip_value(&mut self, token: i16) -> Result<()> {
        let size = match self.bytes.read_i16()? {
            type_tag::FLOAT1 | type_tag::UINT32 => 4,
            type_tag::FLOAT2 => 8,
            type_tag::FLOAT3 | type_tag::COLOR => 12,
            type_tag::FLOAT4 => 16,
            type_tag::STRING => usize::from(self.bytes.read_u16()?),
            tag => {
                return Err(CmodError::record(format!(
                    "unknown value type {tag} after token {token}"
                )))
            }
        };
        self.bytes.read_bytes(size)?;
        log::warn!("Skipped unrecognized token {} in model file", token);
        Ok(())
    }

    fn read_material(&mut self) -> Result<Material> {
        let mut material = Material::new();
        loop {
            match self.bytes.read_i16()? {
                token::END_MATERIAL => break,
                token::DIFFUSE => material.diffuse = self.read_color("diffuse color")?,
                token::SPECULAR => material.specular = self.read_color("specular color")?,
                token::EMISSIVE => material.emissive = self.read_color("emissive color")?,
                token::SPECULAR_POWER => {
                    material.specular_power = self.read_float1("specular power")?
                }
                token::OPACITY => material.opacity = self.read_float1("opacity")?,
                token::BLEND => {
                    let code = self.bytes.read_i16()?;
                    material.blend = BlendMode::from_code(code)
                        .ok_or_else(|| CmodError::invalid_enum("blend mode", code, LOCATION))?;
                }
                token::TEXTURE => {
                    let code = self.bytes.read_i16()?;
                    let semantic = TextureSemantic::from_code(code).ok_or_else(|| {
                        CmodError::invalid_enum("texture semantic", code, LOCATION)
                    })?;
                    self.expect_code(type_tag::STRING, "string expected for texture filename")?;
                    let len = usize::from(self.bytes.read_u16()?);
                    let name = std::str::from_utf8(self.bytes.read_bytes(len)?)
                        .map_err(|_| CmodError::record("texture name is not valid UTF-8"))?;
                    if name.is_empty() {
                        return Err(CmodError::record("zero length texture name"));
                    }
                    let handle = (self.resolve)(name);
                    material.set_map(semantic, Some(handle));
                }
                other => self.skip_value(other)?,
            }
        }
        Ok(material)
    }

    fn read_mesh(&mut self) -> Result<Mesh> {
        let layout = self.read_vertex_description()?;
        let vertices = self.read_vertices(&layout)?;
        let mut mesh = Mesh::new(layout, vertices).map_err(|e| CmodError::from_mesh(e, LOCATION))?;

        loop {
            let code = self.bytes.read_i16()?;
            if code == token::END_MESH {
                break;
            }
            let Some(kind) = PrimitiveKind::from_code(code) else {
                if code >= token::FIRST {
                    self.skip_value(code)?;
                    continue;
                }
                return Err(CmodError::invalid_enum("primitive group type", code, LOCATION));
            };
            let group = self.read_group(kind, mesh.vertex_count())?;
            mesh.add_group(group).map_err(|e| CmodError::from_mesh(e, LOCATION))?;
        }
        Ok(mesh)
    }

    fn read_vertex_description(&mut self) -> Result<VertexLayout> {
        self.expect_code(token::VERTEX_DESC, "vertex description expected")?;

        let mut layout = VertexLayout::new();
        loop {
            let code = self.bytes.read_i16()?;
            if code == token::END_VERTEX_DESC {
                break;
            }
            let Some(semantic) = VertexSemantic::from_code(code) else {
                if code >= token::FIRST {
                    self.skip_value(code)?;
                    continue;
                }
                return Err(CmodError::invalid_enum(
                    "vertex attribute semantic",
                    code,
                    LOCATION,
                ));
            };
            let code = self.bytes.read_i16()?;
            let format = VertexFormat::from_code(code).ok_or_else(|| {
                CmodError::invalid_enum("vertex attribute format", code, LOCATION)
            })?;
            if layout.len() == VertexLayout::MAX_ATTRIBUTES {
                return Err(CmodError::record("too many vertex attributes"));
            }
            layout.push(semantic, format);
        }

        if layout.is_empty() {
            return Err(CmodError::record("vertex description cannot be empty"));
        }
        Ok(layout)
    }

    fn read_vertices(&mut self, layout: &VertexLayout) -> Result<Vec<u8>> {
        self.expect_code(token::VERTICES, "vertex data expected")?;

        let count = self.bytes.read_u32()? as usize;
        if count == 0 {
            return Err(CmodError::record("bad vertex count"));
        }
        // On disk a row has exactly the in-memory stride.
        let stride = layout.stride() as usize;
        if count.saturating_mul(stride) > self.bytes.remaining() {
            return Err(truncated());
        }

        let mut data = alloc_zeroed(count, stride)?;
        for row in data.chunks_exact_mut(stride) {
            for attribute in layout.attributes() {
                let field = &mut row[attribute.range()];
                if attribute.format == VertexFormat::UByte4 {
                    field.copy_from_slice(self.bytes.read_bytes(4)?);
                } else {
                    for component in field.chunks_exact_mut(4) {
                        component.copy_from_slice(&self.bytes.read_f32()?.to_ne_bytes());
                    }
                }
            }
        }
        Ok(data)
    }

    fn read_group(&mut self, kind: PrimitiveKind, vertex_count: u32) -> Result<PrimitiveGroup> {
        let material_count = self.model.material_count();
        let material = match self.bytes.read_u32()? {
            NO_MATERIAL => None,
            m if (m as usize) < material_count => Some(m),
            m => {
                return Err(CmodError::MaterialOutOfRange {
                    index: i64::from(m),
                    material_count,
                    location: LOCATION,
                })
            }
        };

        let count = self.bytes.read_u32()? as usize;
        if count.saturating_mul(4) > self.bytes.remaining() {
            return Err(truncated());
        }

        let mut indices = try_vec(count)?;
        for _ in 0..count {
            let index = self.bytes.read_u32()?;
            if index >= vertex_count {
                return Err(CmodError::IndexOutOfRange {
                    index: i64::from(index),
                    vertex_count,
                    location: LOCATION,
                });
            }
            indices.push(index);
        }
        Ok(PrimitiveGroup::new(kind, material, indices))
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Write `model` as a complete binary model file, header included.
pub(crate) fn encode<W: Write>(
    model: &Model,
    out: &mut W,
    source: impl FnMut(TextureHandle) -> Option<String>,
) -> Result<()> {
    profile_function!();
    let mut writer = BinaryWriter { out, source };
    writer.write_model(model)
}

struct BinaryWriter<'w, W, S> {
    out: &'w mut W,
    source: S,
}

impl<W: Write, S: FnMut(TextureHandle) -> Option<String>> BinaryWriter<'_, W, S> {
    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_color(&mut self, token: i16, color: Color) -> Result<()> {
        self.write_i16(token)?;
        self.write_i16(type_tag::COLOR)?;
        for component in color.to_array() {
            self.write_f32(component)?;
        }
        Ok(())
    }

    fn write_float1(&mut self, token: i16, value: f32) -> Result<()> {
        self.write_i16(token)?;
        self.write_i16(type_tag::FLOAT1)?;
        self.write_f32(value)
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| CmodError::Unencodable {
            message: format!("string of {} bytes is too long", value.len()),
        })?;
        self.write_i16(type_tag::STRING)?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_model(&mut self, model: &Model) -> Result<()> {
        self.out.write_all(BINARY_HEADER)?;
        for material in model.materials() {
            self.write_material(material)?;
        }
        for mesh in model.meshes() {
            self.write_mesh(mesh)?;
        }
        Ok(())
    }

    fn write_material(&mut self, material: &Material) -> Result<()> {
        self.write_i16(token::MATERIAL)?;

        if material.diffuse != DEFAULT_DIFFUSE {
            self.write_color(token::DIFFUSE, material.diffuse)?;
        }
        if material.emissive != DEFAULT_EMISSIVE {
            self.write_color(token::EMISSIVE, material.emissive)?;
        }
        if material.specular != DEFAULT_SPECULAR {
            self.write_color(token::SPECULAR, material.specular)?;
        }
        if material.specular_power != DEFAULT_SPECULAR_POWER {
            self.write_float1(token::SPECULAR_POWER, material.specular_power)?;
        }
        if material.opacity != DEFAULT_OPACITY {
            self.write_float1(token::OPACITY, material.opacity)?;
        }
        if material.blend != DEFAULT_BLEND {
            self.write_i16(token::BLEND)?;
            self.write_i16(material.blend.code())?;
        }
        for semantic in TextureSemantic::ALL {
            let Some(handle) = material.map(semantic) else {
                continue;
            };
            let Some(name) = (self.source)(handle) else {
                log::warn!("No source for texture {:?}, map omitted", handle);
                continue;
            };
            self.write_i16(token::TEXTURE)?;
            self.write_i16(semantic.code())?;
            self.write_string(&name)?;
        }

        self.write_i16(token::END_MATERIAL)
    }

    fn write_mesh(&mut self, mesh: &Mesh) -> Result<()> {
        self.write_i16(token::MESH)?;

        self.write_i16(token::VERTEX_DESC)?;
        for attribute in mesh.layout().attributes() {
            self.write_i16(attribute.semantic.code())?;
            self.write_i16(attribute.format.code())?;
        }
        self.write_i16(token::END_VERTEX_DESC)?;

        self.write_i16(token::VERTICES)?;
        self.write_u32(mesh.vertex_count())?;
        let stride = mesh.stride() as usize;
        for row in mesh.vertex_data().chunks_exact(stride) {
            for attribute in mesh.layout().attributes() {
                let field = &row[attribute.range()];
                if attribute.format == VertexFormat::UByte4 {
                    self.out.write_all(field)?;
                } else {
                    for component in field.chunks_exact(4) {
                        self.write_f32(bytemuck::pod_read_unaligned(component))?;
                    }
                }
            }
        }

        for group in mesh.groups() {
            self.write_i16(group.kind.code())?;
            self.write_u32(group.material.unwrap_or(NO_MATERIAL))?;
            let count = u32::try_from(group.indices.len()).map_err(|_| CmodError::Unencodable {
                message: format!("primitive group of {} indices", group.indices.len()),
            })?;
            self.write_u32(count)?;
            for &index in &group.indices {
                self.write_u32(index)?;
            }
        }

        self.write_i16(token::END_MESH)
    }
}
