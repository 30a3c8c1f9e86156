//! Error types for model decoding and encoding.

use std::fmt;

use thiserror::Error;

use crate::mesh::MeshError;

/// Where in the input an error was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLocation {
    /// 1-based line of an ASCII model file.
    Line(u32),
    /// Somewhere in a binary model stream.
    Binary,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(line) => write!(f, "line {line}"),
            Self::Binary => f.write_str("binary stream"),
        }
    }
}

/// Errors that can occur while reading or writing a model file.
///
/// A failed decode never yields a partial model.
#[derive(Debug, Error)]
pub enum CmodError {
    /// The first 16 bytes match neither the ASCII nor the binary header.
    #[error("unrecognized model file header")]
    UnrecognizedHeader,

    /// Unexpected token kind or keyword in an ASCII file.
    #[error("{message} (line {line})")]
    MalformedToken { message: String, line: u32 },

    /// Unexpected token code or type tag in a binary file.
    #[error("malformed binary record: {message}")]
    MalformedRecord { message: String },

    #[error("unknown block type {name} ({location})")]
    UnknownBlockType {
        name: String,
        location: SourceLocation,
    },

    /// A primitive group index is not below the mesh's vertex count.
    #[error("index {index} out of range for {vertex_count} vertices ({location})")]
    IndexOutOfRange {
        index: i64,
        vertex_count: u32,
        location: SourceLocation,
    },

    /// A primitive group references a material that was never declared.
    #[error("material index {index} out of range for {material_count} materials ({location})")]
    MaterialOutOfRange {
        index: i64,
        material_count: usize,
        location: SourceLocation,
    },

    /// Unknown semantic, format, topology, blend or texture code.
    #[error("invalid {kind} {value} ({location})")]
    InvalidEnum {
        kind: &'static str,
        value: String,
        location: SourceLocation,
    },

    /// A material block appeared after the first mesh block.
    #[error("materials must be defined before meshes ({location})")]
    MaterialsAfterMeshes { location: SourceLocation },

    #[error("unexpected end of model data ({location})")]
    TruncatedStream { location: SourceLocation },

    #[error("failed to allocate {bytes} bytes")]
    AllocationFailure { bytes: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The model holds something the target format cannot represent.
    #[error("cannot encode model: {message}")]
    Unencodable { message: String },
}

/// Result type for model I/O.
pub type Result<T> = std::result::Result<T, CmodError>;

impl CmodError {
    pub(crate) fn record(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }

    pub(crate) fn token(message: impl Into<String>, line: u32) -> Self {
        Self::MalformedToken {
            message: message.into(),
            line,
        }
    }

    pub(crate) fn invalid_enum(
        kind: &'static str,
        value: impl fmt::Display,
        location: SourceLocation,
    ) -> Self {
        Self::InvalidEnum {
            kind,
            value: value.to_string(),
            location,
        }
    }

    /// Attach a location to a mesh invariant failure.
    pub(crate) fn from_mesh(error: MeshError, location: SourceLocation) -> Self {
        match (error, location) {
            (
                MeshError::IndexOutOfRange {
                    index,
                    vertex_count,
                },
                _,
            ) => Self::IndexOutOfRange {
                index: i64::from(index),
                vertex_count,
                location,
            },
            (e, SourceLocation::Line(line)) => Self::token(e.to_string(), line),
            (e, SourceLocation::Binary) => Self::record(e.to_string()),
        }
    }

    /// Location the error was detected at, when it has one.
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::MalformedToken { line, .. } => Some(SourceLocation::Line(*line)),
            Self::MalformedRecord { .. } => Some(SourceLocation::Binary),
            Self::UnknownBlockType { location, .. }
            | Self::IndexOutOfRange { location, .. }
            | Self::MaterialOutOfRange { location, .. }
            | Self::InvalidEnum { location, .. }
            | Self::MaterialsAfterMeshes { location }
            | Self::TruncatedStream { location } => Some(*location),
            _ => None,
        }
    }
}

/// Allocate a zeroed buffer of `count * size` bytes without aborting on
/// overflow or allocation failure.
pub(crate) fn alloc_zeroed(count: usize, size: usize) -> Result<Vec<u8>> {
    let bytes = count
        .checked_mul(size)
        .ok_or(CmodError::AllocationFailure { bytes: usize::MAX })?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(bytes)
        .map_err(|_| CmodError::AllocationFailure { bytes })?;
    buffer.resize(bytes, 0);
    Ok(buffer)
}

/// Reserve room for `count` elements of `T`, mapping failure to
/// [`CmodError::AllocationFailure`].
pub(crate) fn try_vec<T>(count: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(count)
        .map_err(|_| CmodError::AllocationFailure {
            bytes: count.saturating_mul(std::mem::size_of::<T>()),
        })?;
    Ok(v)
}
