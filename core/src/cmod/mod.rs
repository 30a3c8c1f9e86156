//! CMOD model file reader and writer.
//!
//! A model file is either human-readable text or a compact tagged binary
//! stream. Both start with a 16-byte header naming the format and encode the
//! same content: a list of materials followed by a list of meshes.
//!
//! # Texture Callbacks
//!
//! The codecs never open image files. When a material declares a texture map
//! the decoder passes the file name to a caller-supplied resolver and stores
//! the returned [`TextureHandle`]. Encoding uses the inverse callback to turn
//! handles back into names. [`TextureRegistry`](crate::material::TextureRegistry)
//! provides both directions.
//!
//! # Example
//!
//! ```ignore
//! use cmod_core::cmod::{load_model, save_model, ModelFormat};
//! use cmod_core::material::TextureRegistry;
//!
//! let mut textures = TextureRegistry::new();
//! let file = std::fs::File::open("asteroid.cmod")?;
//! let mut model = load_model(file, |name| textures.handle(name))?;
//! model.condition();
//!
//! let out = std::fs::File::create("asteroid-bin.cmod")?;
//! save_model(&model, out, ModelFormat::Binary, |h| {
//!     textures.name(h).map(str::to_owned)
//! })?;
//! ```

mod ascii;
mod binary;
mod error;
#[cfg(test)]
mod tests;
pub mod tokenizer;

pub use error::{CmodError, Result, SourceLocation};
pub use tokenizer::{Token, Tokenizer};

use std::io::{BufWriter, ErrorKind, Read, Write};

use crate::material::TextureHandle;
use crate::model::Model;

/// Header of text model files.
pub const ASCII_HEADER: &[u8; HEADER_LENGTH] = b"#celmodel__ascii";
/// Header of binary model files.
pub const BINARY_HEADER: &[u8; HEADER_LENGTH] = b"#celmodel_binary";
pub const HEADER_LENGTH: usize = 16;

/// Binary encoding of a primitive group without a material.
pub const NO_MATERIAL: u32 = u32::MAX;

/// On-disk encoding of a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelFormat {
    #[default]
    Ascii,
    Binary,
}

impl ModelFormat {
    pub fn header(self) -> &'static [u8; HEADER_LENGTH] {
        match self {
            Self::Ascii => ASCII_HEADER,
            Self::Binary => BINARY_HEADER,
        }
    }

    /// Identify a format from the first bytes of a file.
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.starts_with(ASCII_HEADER) {
            Some(Self::Ascii)
        } else if header.starts_with(BINARY_HEADER) {
            Some(Self::Binary)
        } else {
            None
        }
    }
}

/// A model source whose header has been read and recognized.
#[derive(Debug)]
pub enum ModelDecoder<R> {
    Ascii(R),
    Binary(R),
}

impl<R: Read> ModelDecoder<R> {
    pub fn format(&self) -> ModelFormat {
        match self {
            Self::Ascii(_) => ModelFormat::Ascii,
            Self::Binary(_) => ModelFormat::Binary,
        }
    }

    /// Read the rest of the source and decode it.
    ///
    /// `resolve` is called once per texture map declaration.
    pub fn decode(self, resolve: impl FnMut(&str) -> TextureHandle) -> Result<Model> {
        match self {
            Self::Ascii(mut source) => {
                let mut data = Vec::new();
                source.read_to_end(&mut data)?;
                let text = std::str::from_utf8(&data).map_err(|e| {
                    let valid = &data[..e.valid_up_to()];
                    let line = valid.iter().filter(|&&b| b == b'\n').count() + 1;
                    CmodError::token("invalid UTF-8 in text model", line as u32)
                })?;
                ascii::decode(text, resolve)
            }
            Self::Binary(mut source) => {
                let mut data = Vec::new();
                source.read_to_end(&mut data)?;
                binary::decode(&data, resolve)
            }
        }
    }
}

/// Read the 16-byte header of `source` and select a decoder.
///
/// Sources shorter than a header fail with
/// [`CmodError::UnrecognizedHeader`].
pub fn open_model<R: Read>(mut source: R) -> Result<ModelDecoder<R>> {
    let mut header = [0u8; HEADER_LENGTH];
    if let Err(e) = source.read_exact(&mut header) {
        return Err(match e.kind() {
            ErrorKind::UnexpectedEof => CmodError::UnrecognizedHeader,
            _ => e.into(),
        });
    }

    match ModelFormat::detect(&header) {
        Some(ModelFormat::Ascii) => Ok(ModelDecoder::Ascii(source)),
        Some(ModelFormat::Binary) => Ok(ModelDecoder::Binary(source)),
        None => Err(CmodError::UnrecognizedHeader),
    }
}

/// Load a model in either format.
///
/// Failures are logged and returned; no partial model is produced.
pub fn load_model<R: Read>(
    source: R,
    resolve: impl FnMut(&str) -> TextureHandle,
) -> Result<Model> {
    let result = open_model(source).and_then(|decoder| decoder.decode(resolve));
    if let Err(e) = &result {
        log::error!("Error in model file: {}", e);
    }
    result
}

/// Load a model from an in-memory file image.
pub fn load_model_from_bytes(
    data: &[u8],
    resolve: impl FnMut(&str) -> TextureHandle,
) -> Result<Model> {
    load_model(data, resolve)
}

/// Write `model` to `sink` in the given format.
///
/// `source` maps texture handles back to file names. Maps whose handle has
/// no name are left out of the file.
pub fn save_model<W: Write>(
    model: &Model,
    sink: W,
    format: ModelFormat,
    source: impl FnMut(TextureHandle) -> Option<String>,
) -> Result<()> {
    let mut out = BufWriter::new(sink);
    match format {
        ModelFormat::Ascii => ascii::encode(model, &mut out, source)?,
        ModelFormat::Binary => binary::encode(model, &mut out, source)?,
    }
    out.flush()?;
    Ok(())
}

/// Encode `model` into a new buffer.
pub fn save_model_to_vec(
    model: &Model,
    format: ModelFormat,
    source: impl FnMut(TextureHandle) -> Option<String>,
) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    save_model(model, &mut data, format, source)?;
    Ok(data)
}
