//! Text model format reader and writer.
//!
//! A file is the header line, then zero or more `material ... end_material`
//! blocks, then zero or more `mesh ... end_mesh` blocks:
//!
//! ```text
//! #celmodel__ascii
//!
//! material
//! diffuse 1 0 0
//! texture0 "rock.png"
//! end_material
//!
//! mesh
//! vertexdesc
//! position f3
//! normal f3
//! end_vertexdesc
//!
//! vertices 3
//! 0 0 0 0 0 1
//! 1 0 0 0 0 1
//! 0 1 0 0 0 1
//!
//! trilist 0 3
//! 0 1 2
//!
//! end_mesh
//! ```
//!
//! Numbers may be wrapped across lines freely; the writer's layout is
//! cosmetic.

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
use super::tokenizer::{Token, Tokenizer};
use super::ASCII_HEADER;

/// Index values written per line.
const INDICES_PER_LINE: usize = 12;

// ============================================================================
// Reader
// ============================================================================

/// Decode the body of a text model file (everything after the header).
pub(crate) fn decode(
    text: &str,
    resolve: impl FnMut(&str) -> TextureHandle,
) -> Result<Model> {
    AsciiReader {
        tokens: Tokenizer::new(text),
        resolve,
        model: Model::new(),
    }
    .read()
}

struct AsciiReader<'a, F> {
    tokens: Tokenizer<'a>,
    resolve: F,
    model: Model,
}

impl<'a, F: FnMut(&str) -> TextureHandle> AsciiReader<'a, F> {
    fn read(mut self) -> Result<Model> {
        profile_function!();

        let mut seen_mesh = false;
        loop {
            match self.tokens.next_token() {
                Token::End => break,
                Token::Name("material") => {
                    if seen_mesh {
                        return Err(CmodError::MaterialsAfterMeshes {
                            location: self.location(),
                        });
                    }
                    self.tokens.push_back();
                    let material = self.read_material()?;
                    self.model.add_material(material);
                }
                Token::Name("mesh") => {
                    seen_mesh = true;
                    self.tokens.push_back();
                    let mesh = self.read_mesh()?;
                    self.model.add_mesh(mesh);
                }
                Token::Name(name) => {
                    return Err(CmodError::UnknownBlockType {
                        name: name.to_string(),
                        location: self.location(),
                    })
                }
                _ => return Err(self.error("block name expected")),
            }
        }

        log::debug!(
            "Decoded ASCII model: {} materials, {} meshes",
            self.model.material_count(),
            self.model.mesh_count()
        );
        Ok(self.model)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::Line(self.tokens.line_number())
    }

    fn error(&self, message: impl Into<String>) -> CmodError {
        CmodError::token(message, self.tokens.line_number())
    }

    /// Next token, failing at end of input.
    fn next_required(&mut self) -> Result<Token<'a>> {
        match self.tokens.next_token() {
            Token::End => Err(CmodError::TruncatedStream {
                location: self.location(),
            }),
            token => Ok(token),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        match self.next_required()? {
            Token::Name(name) if name == keyword => Ok(()),
            _ => Err(self.error(format!("{keyword} expected"))),
        }
    }

    fn read_number(&mut self, what: &str) -> Result<f64> {
        match self.next_required()? {
            Token::Number(value) => Ok(value),
            _ => Err(self.error(format!("{what} expected"))),
        }
    }

    fn read_integer(&mut self, what: &str) -> Result<i64> {
        self.read_number(what)?;
        self.tokens
            .integer_value()
            .ok_or_else(|| self.error(format!("{what} must be an integer")))
    }

    fn read_color(&mut self, what: &str) -> Result<Color> {
        let red = self.read_number(what)? as f32;
        let green = self.read_number(what)? as f32;
        let blue = self.read_number(what)? as f32;
        Ok(Color::new(red, green, blue))
    }

    fn read_material(&mut self) -> Result<Material> {
        self.expect_keyword("material")?;

        let mut material = Material::new();
        loop {
            let Token::Name(property) = self.next_required()? else {
                return Err(self.error("material property expected"));
            };
            match property {
                "end_material" => break,
                "diffuse" => material.diffuse = self.read_color("diffuse color")?,
                "specular" => material.specular = self.read_color("specular color")?,
                "emissive" => material.emissive = self.read_color("emissive color")?,
                "specpower" => {
                    material.specular_power = self.read_number("specular power")? as f32
                }
                "opacity" => material.opacity = self.read_number("opacity")? as f32,
                "blend" => {
                    let Token::Name(mode) = self.next_required()? else {
                        return Err(self.error("blend mode expected"));
                    };
                    material.blend = BlendMode::from_keyword(mode).ok_or_else(|| {
                        CmodError::invalid_enum("blend mode", mode, self.location())
                    })?;
                }
                other => {
                    let Some(semantic) = TextureSemantic::from_keyword(other) else {
                        return Err(self.error(format!("unknown material property {other}")));
                    };
                    let Token::String(name) = self.next_required()? else {
                        return Err(self.error("texture name expected"));
                    };
                    if name.is_empty() {
                        return Err(self.error("zero length texture name"));
                    }
                    let handle = (self.resolve)(&name);
                    material.set_map(semantic, Some(handle));
                }
            }
        }
        Ok(material)
    }

    fn read_mesh(&mut self) -> Result<Mesh> {
        self.expect_keyword("mesh")?;

        let layout = self.read_vertex_description()?;
        let vertices = self.read_vertices(&layout)?;
        let mut mesh =
            Mesh::new(layout, vertices).map_err(|e| CmodError::from_mesh(e, self.location()))?;

        loop {
            let Token::Name(keyword) = self.next_required()? else {
                return Err(self.error("primitive group or end_mesh expected"));
            };
            if keyword == "end_mesh" {
                break;
            }
            let kind = PrimitiveKind::from_keyword(keyword).ok_or_else(|| {
                CmodError::invalid_enum("primitive group type", keyword, self.location())
            })?;
            let group = self.read_group(kind, mesh.vertex_count())?;
            mesh.add_group(group)
                .map_err(|e| CmodError::from_mesh(e, self.location()))?;
        }
        Ok(mesh)
    }

    fn read_vertex_description(&mut self) -> Result<VertexLayout> {
        self.expect_keyword("vertexdesc")?;

        let mut layout = VertexLayout::new();
        loop {
            let Token::Name(keyword) = self.next_required()? else {
                return Err(self.error("vertex attribute expected"));
            };
            if keyword == "end_vertexdesc" {
                break;
            }
            let semantic = VertexSemantic::from_keyword(keyword).ok_or_else(|| {
                CmodError::invalid_enum("vertex attribute semantic", keyword, self.location())
            })?;
            let Token::Name(format) = self.next_required()? else {
                return Err(self.error("vertex attribute format expected"));
            };
            let format = VertexFormat::from_keyword(format).ok_or_else(|| {
                CmodError::invalid_enum("vertex attribute format", format, self.location())
            })?;
            if layout.len() == VertexLayout::MAX_ATTRIBUTES {
                return Err(self.error("too many vertex attributes"));
            }
            layout.push(semantic, format);
        }

        if layout.is_empty() {
            return Err(self.error("vertex description cannot be empty"));
        }
        Ok(layout)
    }

    fn read_vertices(&mut self, layout: &VertexLayout) -> Result<Vec<u8>> {
        self.expect_keyword("vertices")?;

        let count = self.read_integer("vertex count")?;
        let count = usize::try_from(count)
            .ok()
            .filter(|&c| c > 0 && c <= u32::MAX as usize)
            .ok_or_else(|| self.error("bad vertex count"))?;

        // Each value needs at least one byte of input.
        let values_per_vertex: usize = layout
            .attributes()
            .iter()
            .map(|a| a.format.components())
            .sum();
        if count.saturating_mul(values_per_vertex) > self.tokens.remaining_len() {
            return Err(CmodError::TruncatedStream {
                location: self.location(),
            });
        }

        let stride = layout.stride() as usize;
        let mut data = alloc_zeroed(count, stride)?;
        for row in data.chunks_exact_mut(stride) {
            for attribute in layout.attributes() {
                let field = &mut row[attribute.range()];
                if attribute.format == VertexFormat::UByte4 {
                    for byte in field.iter_mut() {
                        let value = self.read_integer("color component")?;
                        *byte = u8::try_from(value)
                            .map_err(|_| self.error("color component out of range"))?;
                    }
                } else {
                    for component in field.chunks_exact_mut(4) {
                        let value = self.read_number("vertex data")? as f32;
                        component.copy_from_slice(&value.to_ne_bytes());
                    }
                }
            }
        }
        Ok(data)
    }

    fn read_group(&mut self, kind: PrimitiveKind, vertex_count: u32) -> Result<PrimitiveGroup> {
        let material_count = self.model.material_count();
        let material = match self.read_integer("material index")? {
            -1 => None,
            m if m >= 0 && (m as u64) < material_count as u64 => Some(m as u32),
            m => {
                return Err(CmodError::MaterialOutOfRange {
                    index: m,
                    material_count,
                    location: self.location(),
                })
            }
        };

        let count = self.read_integer("index count")?;
        let count = usize::try_from(count).map_err(|_| self.error("bad index count"))?;
        if count > self.tokens.remaining_len() {
            return Err(CmodError::TruncatedStream {
                location: self.location(),
            });
        }

        let mut indices = try_vec(count)?;
        for _ in 0..count {
            let index = self.read_integer("index")?;
            if index < 0 || index >= i64::from(vertex_count) {
                return Err(CmodError::IndexOutOfRange {
                    index,
                    vertex_count,
                    location: self.location(),
                });
            }
            indices.push(index as u32);
        }
        Ok(PrimitiveGroup::new(kind, material, indices))
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Write `model` as a complete text model file, header included.
pub(crate) fn encode<W: Write>(
    model: &Model,
    out: &mut W,
    source: impl FnMut(TextureHandle) -> Option<String>,
) -> Result<()> {
    profile_function!();
    let mut writer = AsciiWriter { out, source };
    writer.write_model(model)
}

struct AsciiWriter<'w, W, S> {
    out: &'w mut W,
    source: S,
}

impl<W: Write, S: FnMut(TextureHandle) -> Option<String>> AsciiWriter<'_, W, S> {
    fn write_model(&mut self, model: &Model) -> Result<()> {
        self.out.write_all(ASCII_HEADER)?;
        self.out.write_all(b"\n\n")?;

        for material in model.materials() {
            self.write_material(material)?;
        }
        for mesh in model.meshes() {
            self.write_mesh(mesh)?;
        }
        Ok(())
    }

    fn write_floats(&mut self, values: &[f32]) -> Result<()> {
        for (i, value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(CmodError::Unencodable {
                    message: format!("non-finite value {value} in text model"),
                });
            }
            if i > 0 {
                self.out.write_all(b" ")?;
            }
            write!(self.out, "{value}")?;
        }
        Ok(())
    }

    fn write_color(&mut self, keyword: &str, color: Color) -> Result<()> {
        write!(self.out, "{keyword} ")?;
        self.write_floats(&color.to_array())?;
        writeln!(self.out)?;
        Ok(())
    }

    fn write_material(&mut self, material: &Material) -> Result<()> {
        writeln!(self.out, "material")?;

        if material.diffuse != DEFAULT_DIFFUSE {
            self.write_color("diffuse", material.diffuse)?;
        }
        if material.emissive != DEFAULT_EMISSIVE {
            self.write_color("emissive", material.emissive)?;
        }
        if material.specular != DEFAULT_SPECULAR {
            self.write_color("specular", material.specular)?;
        }
        if material.specular_power != DEFAULT_SPECULAR_POWER {
            write!(self.out, "specpower ")?;
            self.write_floats(&[material.specular_power])?;
            writeln!(self.out)?;
        }
        if material.opacity != DEFAULT_OPACITY {
            write!(self.out, "opacity ")?;
            self.write_floats(&[material.opacity])?;
            writeln!(self.out)?;
        }
        if material.blend != DEFAULT_BLEND {
            writeln!(self.out, "blend {}", material.blend.keyword())?;
        }
        for semantic in TextureSemantic::ALL {
            let Some(handle) = material.map(semantic) else {
                continue;
            };
            match (self.source)(handle) {
                Some(name) => writeln!(self.out, "{} \"{}\"", semantic.keyword(), escape(&name))?,
                None => log::warn!("No source for texture {:?}, map omitted", handle),
            }
        }

        writeln!(self.out, "end_material")?;
        writeln!(self.out)?;
        Ok(())
    }

    fn write_mesh(&mut self, mesh: &Mesh) -> Result<()> {
        if let Some(label) = mesh.label().and_then(|l| l.lines().next()) {
            writeln!(self.out, "# {label}")?;
        }
        writeln!(self.out, "mesh")?;

        writeln!(self.out, "vertexdesc")?;
        for attribute in mesh.layout().attributes() {
            writeln!(
                self.out,
                "{} {}",
                attribute.semantic.keyword(),
                attribute.format.keyword()
            )?;
        }
        writeln!(self.out, "end_vertexdesc")?;
        writeln!(self.out)?;

        writeln!(self.out, "vertices {}", mesh.vertex_count())?;
        let stride = mesh.stride() as usize;
        for row in mesh.vertex_data().chunks_exact(stride) {
            for (i, attribute) in mesh.layout().attributes().iter().enumerate() {
                if i > 0 {
                    self.out.write_all(b" ")?;
                }
                let field = &row[attribute.range()];
                if attribute.format == VertexFormat::UByte4 {
                    write!(
                        self.out,
                        "{} {} {} {}",
                        field[0], field[1], field[2], field[3]
                    )?;
                } else {
                    let values: Vec<f32> = field
                        .chunks_exact(4)
                        .map(bytemuck::pod_read_unaligned)
                        .collect();
                    self.write_floats(&values)?;
                }
            }
            writeln!(self.out)?;
        }
        writeln!(self.out)?;

        for group in mesh.groups() {
            let material = group.material.map_or(-1, i64::from);
            writeln!(
                self.out,
                "{} {} {}",
                group.kind.keyword(),
                material,
                group.indices.len()
            )?;
            for line in group.indices.chunks(INDICES_PER_LINE) {
                let text: Vec<String> = line.iter().map(u32::to_string).collect();
                writeln!(self.out, "{}", text.join(" "))?;
            }
            writeln!(self.out)?;
        }

        writeln!(self.out, "end_mesh")?;
        writeln!(self.out)?;
        Ok(())
    }
}

/// Escape a texture name for a double-quoted string.
fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\u000d"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain.png"), "plain.png");
        assert_eq!(escape("a\"b\\c\nd\re"), "a\\\"b\\\\c\\nd\\u000de");

        let quoted = format!("\"{}\"", escape("a\"b\\c\nd\re"));
        let mut tokens = Tokenizer::new(&quoted);
        assert_eq!(
            tokens.next_token(),
            Token::String("a\"b\\c\nd\re".to_string().into())
        );
    }
}
