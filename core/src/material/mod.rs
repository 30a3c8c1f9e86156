//! Surface materials.
//!
//! - [`Material`] - Colors, specular power, opacity, blend mode and texture maps
//! - [`Color`], [`BlendMode`], [`TextureSemantic`], [`TextureHandle`] - Field types
//! - [`TextureRegistry`] - Name/handle table usable as a load resolver and a
//!   save source
//!
//! Materials have a canonical total order ([`Material::canonical_cmp`]) used
//! to deduplicate a model's material list. Opaque materials order before
//! translucent ones and additive materials after normal ones, which the mesh
//! ordering heuristic relies on.

mod registry;
mod types;

use std::cmp::Ordering;

pub use registry::TextureRegistry;
pub use types::{BlendMode, Color, TextureHandle, TextureSemantic};

pub const DEFAULT_DIFFUSE: Color = Color::BLACK;
pub const DEFAULT_SPECULAR: Color = Color::BLACK;
pub const DEFAULT_EMISSIVE: Color = Color::BLACK;
pub const DEFAULT_SPECULAR_POWER: f32 = 1.0;
pub const DEFAULT_OPACITY: f32 = 1.0;
pub const DEFAULT_BLEND: BlendMode = BlendMode::Normal;

/// Opacity below which a material counts as fully transparent rather than
/// translucent.
pub const TRANSLUCENCY_THRESHOLD: f32 = 0.01;

/// Surface description shared by primitive groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub diffuse: Color,
    pub specular: Color,
    pub emissive: Color,
    pub specular_power: f32,
    pub opacity: f32,
    pub blend: BlendMode,
    /// Texture maps indexed by [`TextureSemantic::index`].
    pub maps: [Option<TextureHandle>; TextureSemantic::COUNT],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: DEFAULT_DIFFUSE,
            specular: DEFAULT_SPECULAR,
            emissive: DEFAULT_EMISSIVE,
            specular_power: DEFAULT_SPECULAR_POWER,
            opacity: DEFAULT_OPACITY,
            blend: DEFAULT_BLEND,
            maps: [None; TextureSemantic::COUNT],
        }
    }
}

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diffuse(mut self, color: Color) -> Self {
        self.diffuse = color;
        self
    }

    pub fn with_specular(mut self, color: Color) -> Self {
        self.specular = color;
        self
    }

    pub fn with_emissive(mut self, color: Color) -> Self {
        self.emissive = color;
        self
    }

    pub fn with_specular_power(mut self, power: f32) -> Self {
        self.specular_power = power;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_map(mut self, semantic: TextureSemantic, texture: TextureHandle) -> Self {
        self.set_map(semantic, Some(texture));
        self
    }

    pub fn map(&self, semantic: TextureSemantic) -> Option<TextureHandle> {
        self.maps[semantic.index()]
    }

    pub fn set_map(&mut self, semantic: TextureSemantic, texture: Option<TextureHandle>) {
        self.maps[semantic.index()] = texture;
    }

    /// True if the material needs blending: partially transparent, or
    /// additive.
    pub fn is_translucent(&self) -> bool {
        (self.opacity > TRANSLUCENCY_THRESHOLD && self.opacity < 1.0)
            || self.blend == BlendMode::Additive
    }

    /// Canonical total order over materials.
    ///
    /// Opaque materials come first: opacity descending, then blend code
    /// ascending so additive follows normal. Ties fall through diffuse,
    /// emissive, specular, specular power and finally the map handles per
    /// semantic, where an absent map sorts after any bound one. Floats
    /// compare with `total_cmp`.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        other
            .opacity
            .total_cmp(&self.opacity)
            .then_with(|| self.blend.cmp(&other.blend))
            .then_with(|| self.diffuse.total_cmp(&other.diffuse))
            .then_with(|| self.emissive.total_cmp(&other.emissive))
            .then_with(|| self.specular.total_cmp(&other.specular))
            .then_with(|| self.specular_power.total_cmp(&other.specular_power))
            .then_with(|| {
                self.maps
                    .iter()
                    .zip(&other.maps)
                    .map(|(a, b)| cmp_maps(*a, *b))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    }
}

fn cmp_maps(a: Option<TextureHandle>, b: Option<TextureHandle>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
