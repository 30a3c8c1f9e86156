//! Value types used by [`Material`](super::Material).

use std::cmp::Ordering;

/// Linear RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.red, self.green, self.blue]
    }

    /// Total order: red, then green, then blue.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.red
            .total_cmp(&other.red)
            .then_with(|| self.green.total_cmp(&other.green))
            .then_with(|| self.blue.total_cmp(&other.blue))
    }
}

impl From<[f32; 3]> for Color {
    fn from([red, green, blue]: [f32; 3]) -> Self {
        Self { red, green, blue }
    }
}

/// How a material's fragments combine with the framebuffer.
///
/// The discriminants are the codes used by the binary model format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum BlendMode {
    #[default]
    Normal = 0,
    Additive = 1,
    PremultipliedAlpha = 2,
}

impl BlendMode {
    pub const ALL: [BlendMode; 3] = [Self::Normal, Self::Additive, Self::PremultipliedAlpha];

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
            Self::Normal => "normal",
            Self::Additive => "add",
            Self::PremultipliedAlpha => "premultiplied",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.keyword() == keyword)
    }
}

/// Role of a texture map bound to a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TextureSemantic {
    Diffuse = 0,
    Normal = 1,
    Specular = 2,
    Emissive = 3,
}

impl TextureSemantic {
    /// Number of texture semantics (size of per-semantic arrays).
    pub const COUNT: usize = 4;

    pub const ALL: [TextureSemantic; Self::COUNT] = [
        Self::Diffuse,
        Self::Normal,
        Self::Specular,
        Self::Emissive,
    ];

    /// Index into per-semantic arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Material keyword introducing a map of this semantic in ASCII files.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Diffuse => "texture0",
            Self::Normal => "normalmap",
            Self::Specular => "specularmap",
            Self::Emissive => "emissivemap",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.keyword() == keyword)
    }
}

/// Opaque reference to a texture resolved by the caller.
///
/// The codecs never open image files; a resolver callback maps texture names
/// to handles on load, and a source callback maps them back on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
