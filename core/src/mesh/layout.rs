//! Vertex layout descriptors.
//!
//! A [`VertexLayout`] is the ordered attribute schema of one vertex row.
//! Offsets are never supplied by callers: each attribute is placed directly
//! after the previous one, so a layout is fully described by its list of
//! `(semantic, format)` pairs.

/// Semantic meaning of a vertex attribute.
///
/// The discriminants are the codes used by the binary model format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VertexSemantic {
    Position = 0,
    Color0 = 1,
    Color1 = 2,
    Normal = 3,
    Tangent = 4,
    Texture0 = 5,
    Texture1 = 6,
    Texture2 = 7,
    Texture3 = 8,
    PointSize = 9,
}

impl VertexSemantic {
    /// Every semantic, ordered by code.
    pub const ALL: [VertexSemantic; 10] = [
        Self::Position,
        Self::Color0,
        Self::Color1,
        Self::Normal,
        Self::Tangent,
        Self::Texture0,
        Self::Texture1,
        Self::Texture2,
        Self::Texture3,
        Self::PointSize,
    ];

    /// Binary format code.
    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Keyword used by the ASCII format.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Color0 => "color0",
            Self::Color1 => "color1",
            Self::Normal => "normal",
            Self::Tangent => "tangent",
            Self::Texture0 => "texcoord0",
            Self::Texture1 => "texcoord1",
            Self::Texture2 => "texcoord2",
            Self::Texture3 => "texcoord3",
            Self::PointSize => "pointsize",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.keyword() == keyword)
    }
}

/// Numeric format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VertexFormat {
    Float1 = 0,
    Float2 = 1,
    Float3 = 2,
    Float4 = 3,
    /// Four unsigned bytes, typically a packed RGBA color.
    UByte4 = 4,
}

impl VertexFormat {
    pub const ALL: [VertexFormat; 5] = [
        Self::Float1,
        Self::Float2,
        Self::Float3,
        Self::Float4,
        Self::UByte4,
    ];

    /// Size in bytes of one attribute value.
    pub fn size(self) -> u32 {
        match self {
            Self::Float1 | Self::UByte4 => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }

    /// Number of scalar components.
    pub fn components(self) -> usize {
        match self {
            Self::Float1 => 1,
            Self::Float2 => 2,
            Self::Float3 => 3,
            Self::Float4 | Self::UByte4 => 4,
        }
    }

    pub fn is_float(self) -> bool {
        !matches!(self, Self::UByte4)
    }

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
            Self::Float1 => "f1",
            Self::Float2 => "f2",
            Self::Float3 => "f3",
            Self::Float4 => "f4",
            Self::UByte4 => "ub4",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.keyword() == keyword)
    }
}

/// One attribute of a vertex row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    pub format: VertexFormat,
    /// Byte offset from the start of the row.
    pub offset: u32,
}

impl VertexAttribute {
    /// Byte range of this attribute inside a row.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.format.size() as usize
    }
}

/// Ordered attribute schema and stride of a vertex row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexLayout {
    /// Maximum number of attributes a layout may declare.
    pub const MAX_ATTRIBUTES: usize = 16;

    /// Create an empty layout. Add attributes before attaching it to a mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layout from `(semantic, format)` pairs in declaration order.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (VertexSemantic, VertexFormat)>) -> Self {
        let mut layout = Self::new();
        for (semantic, format) in pairs {
            layout.push(semantic, format);
        }
        layout
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, semantic: VertexSemantic, format: VertexFormat) -> Self {
        self.push(semantic, format);
        self
    }

    /// Append an attribute at the end of the row.
    pub fn push(&mut self, semantic: VertexSemantic, format: VertexFormat) {
        self.attributes.push(VertexAttribute {
            semantic,
            format,
            offset: self.stride,
        });
        self.stride += format.size();
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Total size of one vertex row in bytes.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Get an attribute by semantic. When a semantic is declared more than
    /// once, the last declaration wins.
    pub fn attribute(&self, semantic: VertexSemantic) -> Option<&VertexAttribute> {
        self.attributes.iter().rev().find(|a| a.semantic == semantic)
    }

    /// Get an attribute by semantic, only if it has the given format.
    pub fn attribute_with_format(
        &self,
        semantic: VertexSemantic,
        format: VertexFormat,
    ) -> Option<&VertexAttribute> {
        self.attribute(semantic).filter(|a| a.format == format)
    }

    pub fn has_semantic(&self, semantic: VertexSemantic) -> bool {
        self.attributes.iter().any(|a| a.semantic == semantic)
    }

    /// Copy of this layout where every `semantic` attribute is dropped and a
    /// single `(semantic, format)` attribute is appended.
    pub fn with_replaced(&self, semantic: VertexSemantic, format: VertexFormat) -> Self {
        Self::from_pairs(
            self.attributes
                .iter()
                .filter(|a| a.semantic != semantic)
                .map(|a| (a.semantic, a.format))
                .chain(std::iter::once((semantic, format))),
        )
    }
}

// ============================================================================
// Common Layouts
// ============================================================================

impl VertexLayout {
    /// Position-only layout (12 bytes per vertex).
    pub fn position_only() -> Self {
        Self::new().with_attribute(VertexSemantic::Position, VertexFormat::Float3)
    }

    /// Position + normal layout (24 bytes per vertex).
    pub fn position_normal() -> Self {
        Self::position_only().with_attribute(VertexSemantic::Normal, VertexFormat::Float3)
    }

    /// Position + normal + texcoord layout (32 bytes per vertex).
    pub fn position_normal_uv() -> Self {
        Self::position_normal().with_attribute(VertexSemantic::Texture0, VertexFormat::Float2)
    }
}
