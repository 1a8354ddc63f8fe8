//! PLY header parsing, element decoding and file loading

mod decoder;
mod header;
mod loader;

pub use decoder::{DecodedRecord, ElementDecoder, PropertyValue, Records};
pub use header::{ElementDecl, Header, PlyFormat, PropertyDecl, PropertyKind, read_header};
pub use loader::{LoadError, PLY_EXTENSION, accepts_extension, load_header_from_path, load_mesh_from_path};
