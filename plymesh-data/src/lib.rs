//! Plymesh Data Crate
//!
//! Reads Stanford Triangle Format (PLY) files into a GPU-agnostic [`Mesh`].
//! Vertex properties are mapped to geometric meaning through a
//! [`SemanticRegistry`]; faces are fan-triangulated into a `u32` index buffer.
//!
//! ```no_run
//! use plymesh_data::{SemanticRegistry, load_mesh_from_path, ParseOptions};
//!
//! let registry = SemanticRegistry::default();
//! let mesh = load_mesh_from_path("bunny.ply", &registry, &ParseOptions::default())?;
//! println!("{} vertices, {} triangles", mesh.vertex_count(), mesh.triangle_count());
//! # Ok::<(), plymesh_data::LoadError>(())
//! ```

pub mod assembler;
pub mod error;
pub mod mesh;
pub mod ply;
pub mod semantic;
pub mod triangulation;
pub mod types;

pub use assembler::{CancelFlag, ParseOptions, parse, parse_with_options};
pub use error::FormatError;
pub use mesh::{AttributeBuffer, FaceDiagnostic, Mesh, Topology};
pub use ply::{Header, LoadError, PlyFormat, accepts_extension, load_mesh_from_path, read_header};
pub use semantic::{SemanticGroup, SemanticRegistry, SemanticSlot, VertexSemanticEntry};
pub use types::{ScalarType, ScalarValue, coerce};
