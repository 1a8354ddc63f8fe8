//! PLY file loading functions

use super::header::{Header, read_header};
use crate::assembler::{ParseOptions, parse_with_options};
use crate::error::FormatError;
use crate::mesh::Mesh;
use crate::semantic::SemanticRegistry;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const PLY_EXTENSION: &str = "ply";

/// Errors from loading a PLY file on disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("not a .ply file: {0}")]
    NotHandled(PathBuf),

    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PLY parsing error: {0}")]
    Format(#[from] FormatError),
}

/// Whether `path` carries the `.ply` extension (case-insensitive).
pub fn accepts_extension(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(PLY_EXTENSION))
}

fn open(path: &Path) -> Result<BufReader<File>, LoadError> {
    if !accepts_extension(path) {
        return Err(LoadError::NotHandled(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    Ok(BufReader::new(File::open(path)?))
}

/// Load a mesh from a `.ply` file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_mesh_from_path(
    path: impl AsRef<Path>,
    registry: &SemanticRegistry,
    options: &ParseOptions,
) -> Result<Mesh, LoadError> {
    let path = path.as_ref();
    debug!("Loading PLY mesh from: {}", path.display());
    let reader = open(path)?;

    let mesh = parse_with_options(reader, registry, options).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        e
    })?;

    info!(
        "PLY file loaded: {} vertices, {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Read only the header of a `.ply` file.
pub fn load_header_from_path(path: impl AsRef<Path>) -> Result<Header, LoadError> {
    let mut reader = open(path.as_ref())?;
    Ok(read_header(&mut reader)?)
}
