//! Command line arguments for `cmodfix`.
//!
//! Parsing goes through clap; the parsed flags are then flattened into
//! [`FixOptions`], which is what the rest of the tool consumes. Tests and
//! embedders can build [`FixOptions`] directly.

use std::path::PathBuf;

use cmod_core::ModelFormat;

/// Smoothing angle used by `--normals` when `--smooth` is not given.
pub const DEFAULT_SMOOTH_ANGLE: f32 = 60.0;

/// What `cmodfix` should do with a model.
#[derive(Debug, Clone, PartialEq)]
pub struct FixOptions {
    /// Encoding of the written model.
    pub output_format: ModelFormat,
    /// Replace vertex normals with generated ones.
    pub normals: bool,
    /// Largest angle between faces, in degrees, that is smoothed over.
    pub smooth_angle: f32,
    /// Treat vertices at the same position as shared when generating normals.
    pub weld: bool,
    /// Generate tangents for normal-mapped meshes that lack them.
    pub tangents: bool,
    /// Merge meshes that share a vertex layout.
    pub merge: bool,
    /// Remove duplicate vertices.
    pub uniquify: bool,
    /// Deduplicate materials and sort meshes by opacity.
    pub condition: bool,
    /// Fit the model into a box of size 2 centered at the origin.
    pub normalize: bool,
    /// Input file, stdin when absent.
    pub input: Option<PathBuf>,
    /// Output file, stdout when absent.
    pub output: Option<PathBuf>,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            output_format: ModelFormat::default(),
            normals: false,
            smooth_angle: DEFAULT_SMOOTH_ANGLE,
            weld: false,
            tangents: false,
            merge: false,
            uniquify: false,
            condition: false,
            normalize: false,
            input: None,
            output: None,
        }
    }
}

impl FixOptions {
    /// Parse the process arguments.
    pub fn parse() -> Self {
        use clap::Parser;
        CmodfixArgs::parse().into()
    }

    /// Parse an explicit argument list, the first item being the program name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        use clap::Parser;
        CmodfixArgs::try_parse_from(args).map(Into::into)
    }

    /// True when any geometry operation is requested.
    pub fn modifies_model(&self) -> bool {
        self.normals || self.tangents || self.merge || self.uniquify || self.condition || self.normalize
    }
}

/// Convert, condition and repair cmod model files.
#[derive(clap::Parser, Debug)]
#[command(
    name = "cmodfix",
    about = "Convert, condition and repair cmod model files",
    long_about = "Reads a cmod model in either format, applies the requested operations and \
        writes the result.\n\n\
        Operations run in a fixed order: normals, tangents, merge, uniquify, condition, normalize.\n\n\
        EXAMPLES:\n  \
          # Convert a text model to binary\n  \
          cmodfix --binary ship.cmod ship-bin.cmod\n\n  \
          # Clean up a model read from stdin\n  \
          cmodfix -u -c < raw.cmod > clean.cmod\n\n  \
          # Rebuild normals, keeping creases sharper than 45 degrees\n  \
          cmodfix -n -w -s 45 ship.cmod ship-smooth.cmod",
    version
)]
struct CmodfixArgs {
    /// Write a text model (the default).
    #[arg(short, long, conflicts_with = "binary")]
    ascii: bool,

    /// Write a binary model.
    #[arg(short, long)]
    binary: bool,

    /// Generate vertex normals, replacing any present.
    #[arg(short, long)]
    normals: bool,

    /// Largest angle in degrees between faces that share a smoothed normal.
    #[arg(short, long = "smooth", value_name = "ANGLE", default_value_t = DEFAULT_SMOOTH_ANGLE)]
    smooth_angle: f32,

    /// Join vertices at the same position before generating normals.
    #[arg(short, long)]
    weld: bool,

    /// Remove duplicate vertices.
    #[arg(short, long)]
    uniquify: bool,

    /// Generate tangents for meshes with normal-mapped materials.
    #[arg(short, long)]
    tangents: bool,

    /// Merge meshes that share a vertex layout.
    #[arg(short, long)]
    merge: bool,

    /// Deduplicate materials and sort meshes by opacity.
    #[arg(short, long)]
    condition: bool,

    /// Scale and center the model to fit in a unit box.
    #[arg(long)]
    normalize: bool,

    /// Input model file. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// Output model file. Writes stdout when omitted.
    output: Option<PathBuf>,
}

impl From<CmodfixArgs> for FixOptions {
    fn from(args: CmodfixArgs) -> Self {
        if args.input.is_some() && args.input == args.output {
            log::warn!("Input and output are the same file; the input is read fully first");
        }

        Self {
            output_format: if args.binary {
                ModelFormat::Binary
            } else {
                ModelFormat::Ascii
            },
            normals: args.normals,
            smooth_angle: args.smooth_angle,
            weld: args.weld,
            tangents: args.tangents,
            merge: args.merge,
            uniquify: args.uniquify,
            condition: args.condition,
            normalize: args.normalize,
            input: args.input,
            output: args.output,
        }
    }
}
