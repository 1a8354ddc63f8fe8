//! Inspection run and logging setup.

use glam::Vec3;
use plymesh_data::ply::{Header, PropertyKind, load_header_from_path};
use plymesh_data::{LoadError, Mesh, ParseOptions, SemanticRegistry, load_mesh_from_path};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced by the inspector.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("PLY loading error: {0}")]
    Load(#[from] LoadError),

    #[error("Failed to read registry file: {0}")]
    RegistryIo(#[from] std::io::Error),

    #[error("Invalid registry JSON: {0}")]
    RegistryJson(#[from] serde_json::Error),
}

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// What to inspect and how.
pub struct InspectConfig {
    pub file: PathBuf,
    pub registry: Option<PathBuf>,
    pub compute_normals: bool,
    pub header_only: bool,
}

pub fn init_logging(config: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level)),
        )
        .with_target(false)
        .init();
}

fn load_registry(config: &InspectConfig) -> Result<SemanticRegistry, AppError> {
    match &config.registry {
        Some(path) => {
            debug!("Loading semantic registry from {}", path.display());
            let json = std::fs::read_to_string(path)?;
            let registry = SemanticRegistry::from_json_str(&json)?;
            info!("Registry loaded: {} entries", registry.entries().len());
            Ok(registry)
        }
        None => Ok(SemanticRegistry::default()),
    }
}

pub fn run(config: &InspectConfig) -> Result<(), AppError> {
    if config.header_only {
        let header = load_header_from_path(&config.file)?;
        print_header(&header);
        return Ok(());
    }

    let registry = load_registry(config)?;
    let options = ParseOptions::new().with_normal_generation(config.compute_normals);
    let mesh = load_mesh_from_path(&config.file, &registry, &options)?;
    print_mesh(&mesh);
    Ok(())
}

fn print_header(header: &Header) {
    println!("format: {} {}", header.format.as_str(), header.version);
    for comment in &header.comments {
        println!("comment: {}", comment);
    }
    for element in &header.elements {
        println!("element {} ({} records)", element.name, element.count);
        for property in &element.properties {
            match property.kind {
                PropertyKind::Scalar(ty) => println!("  {} {}", ty, property.name),
                PropertyKind::List {
                    count_type,
                    item_type,
                } => println!("  list<{}, {}> {}", count_type, item_type, property.name),
            }
        }
    }
}

fn print_mesh(mesh: &Mesh) {
    println!("format: {}", mesh.format().as_str());
    println!("topology: {:?}", mesh.topology());
    println!("vertices: {}", mesh.vertex_count());
    println!("triangles: {}", mesh.triangle_count());

    let groups: Vec<String> = mesh
        .attributes()
        .iter()
        .map(|a| format!("{:?}", a.group()))
        .collect();
    println!("attributes: {}", groups.join(", "));

    if let Some((min, max)) = mesh.bounds() {
        let extent: Vec3 = max - min;
        println!("bounds: {} .. {} (extent {})", min, max, extent);
    }

    for diagnostic in mesh.diagnostics() {
        warn!("skipped face {}: {}", diagnostic.face, diagnostic.error);
    }
}
