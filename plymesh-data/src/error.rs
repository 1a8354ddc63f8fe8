//! Error types for PLY decoding.

use crate::types::ScalarType;
use thiserror::Error;

/// Errors that can occur while reading a PLY stream.
///
/// Header errors and record-level errors abort the parse. `DegenerateFace`
/// and `IndexOutOfRange` are only ever reported through
/// [`FaceDiagnostic`](crate::mesh::FaceDiagnostic) on a returned mesh.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("missing \"ply\" signature on the first line")]
    BadMagic,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("line {line}: property declared before any element")]
    PropertyWithoutElement { line: usize },

    #[error("line {line}: bad element count {count:?}")]
    BadCount { line: usize, count: String },

    #[error("line {line}: unknown type {token:?}")]
    UnknownType { line: usize, token: String },

    #[error("line {line}: malformed header line {text:?}")]
    MalformedLine { line: usize, text: String },

    #[error("stream ended before end_header")]
    UnterminatedHeader,

    #[error("element {element:?} record {record}: bad {ty} literal {literal:?}")]
    BadNumericLiteral {
        element: String,
        record: usize,
        ty: ScalarType,
        literal: String,
    },

    #[error("element {element:?} record {record}: unexpected end of data")]
    UnexpectedEof { element: String, record: usize },

    #[error("face {face}: {len} indices, need at least 3")]
    DegenerateFace { face: usize, len: usize },

    #[error("face {face}: vertex index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        face: usize,
        index: i64,
        vertex_count: usize,
    },

    #[error("no vertex element or vertex count is zero")]
    EmptyMesh,

    #[error("vertex element has no property mapped to a position")]
    MissingPositions,

    #[error("parse cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    /// Whether this error aborts decoding. Face-level problems do not.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::DegenerateFace { .. } | Self::IndexOutOfRange { .. }
        )
    }
}
