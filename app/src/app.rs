//! The `cmodfix` pipeline: load, modify, save.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

use cmod_core::math::Vec3;
use cmod_core::mesh::{MeshError, NormalError, DEFAULT_WELD_TOLERANCE};
use cmod_core::{load_model, save_model, CmodError, Model, TextureRegistry};

use crate::FixOptions;

/// Errors that stop `cmodfix`.
#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Model(#[from] CmodError),

    #[error("cannot merge meshes: {0}")]
    Merge(#[from] MeshError),

    #[error("cannot generate normals: {0}")]
    Normals(#[from] NormalError),
}

/// Apply the operations selected in `options`, in pipeline order.
pub fn process(model: &mut Model, options: &FixOptions) -> Result<(), FixError> {
    if options.normals {
        let weld = options.weld.then_some(DEFAULT_WELD_TOLERANCE);
        let count = model.generate_normals(options.smooth_angle.to_radians(), weld)?;
        log::info!(
            "Generated normals for {} meshes (smoothing below {} degrees)",
            count,
            options.smooth_angle
        );
    }
    if options.tangents {
        let count = model.generate_missing_tangents();
        log::info!("Generated tangents for {} meshes", count);
    }
    if options.merge {
        let removed = model.merge_meshes()?;
        log::info!("Merged away {} meshes", removed);
    }
    if options.uniquify {
        let removed = model.uniquify_vertices();
        log::info!("Removed {} duplicate vertices", removed);
    }
    if options.condition {
        let before = model.material_count();
        model.condition();
        log::info!(
            "Conditioned model: {} -> {} materials, opaque: {}",
            before,
            model.material_count(),
            model.is_opaque()
        );
    }
    if options.normalize {
        model.normalize(&Vec3::zeros());
    }
    Ok(())
}

/// Decode from `source`, process, and encode to `sink`.
pub fn convert<R: Read, W: Write>(
    source: R,
    sink: W,
    options: &FixOptions,
) -> Result<(), FixError> {
    let mut textures = TextureRegistry::new();
    let mut model = load_model(source, |name| textures.handle(name))?;
    log::debug!(
        "Loaded model: {} materials, {} meshes, {} vertices, {} primitives",
        model.material_count(),
        model.mesh_count(),
        model.vertex_count(),
        model.primitive_count()
    );

    process(&mut model, options)?;
    save_model(&model, sink, options.output_format, |handle| {
        textures.name(handle).map(str::to_owned)
    })?;
    Ok(())
}

/// Run `cmodfix` against the files (or standard streams) named in `options`.
pub fn run(options: &FixOptions) -> Result<(), FixError> {
    let source: Box<dyn Read> = match &options.input {
        Some(path) => {
            let file = File::open(path).map_err(|source| FixError::Open {
                path: path.clone(),
                source,
            })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };
    let sink: Box<dyn Write> = match &options.output {
        Some(path) => Box::new(DeferredFile::new(path.clone())),
        None => Box::new(io::stdout().lock()),
    };
    convert(source, sink, options)
}

/// Output file created on the first write, once the input has been fully
/// decoded. A failed load leaves an existing file untouched, and the input
/// may name the same file.
struct DeferredFile {
    path: PathBuf,
    file: Option<File>,
}

impl DeferredFile {
    fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    fn file(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => File::create(&self.path).map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("cannot create {}: {}", self.path.display(), e),
                )
            })?,
        };
        Ok(self.file.insert(file))
    }
}

impl Write for DeferredFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.file {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
