//! Turns decoded PLY elements into a [`Mesh`].
//!
//! The vertex element is mapped through a [`SemanticRegistry`] using a
//! binding plan computed once from the header, so records are written
//! straight into their attribute buffers in a single streaming pass. The
//! face element is fan-triangulated into the index buffer. Every other
//! element is decoded to keep the stream aligned and then dropped.

use crate::error::FormatError;
use crate::mesh::{AttributeBuffer, FaceDiagnostic, Mesh, Topology};
use crate::ply::{ElementDecl, ElementDecoder, PlyFormat, PropertyKind, PropertyValue, read_header};
use crate::semantic::{SemanticGroup, SemanticRegistry};
use crate::triangulation::{compute_vertex_normals, fan_triangulate};
use crate::types::{ScalarType, ScalarValue};
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

pub const VERTEX_ELEMENT: &str = "vertex";
pub const FACE_ELEMENT: &str = "face";

/// Property names tried, in order, for a face's index list.
const FACE_INDEX_NAMES: [&str; 2] = ["vertex_indices", "vertex_index"];

/// Shared flag a caller sets to abort a running parse.
pub type CancelFlag = Arc<AtomicBool>;

/// Options for [`parse_with_options`].
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    cancel: Option<CancelFlag>,
    generate_normals: bool,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `flag` at every record boundary; once set, the parse fails
    /// with [`FormatError::Cancelled`].
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Compute area-weighted vertex normals when the file has faces but no
    /// normal properties.
    pub fn with_normal_generation(mut self, enabled: bool) -> Self {
        self.generate_normals = enabled;
        self
    }

    pub fn generates_normals(&self) -> bool {
        self.generate_normals
    }

    fn check_cancelled(&self) -> Result<(), FormatError> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(FormatError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Parse a PLY stream into a mesh with default options.
pub fn parse<R: BufRead>(reader: R, registry: &SemanticRegistry) -> Result<Mesh, FormatError> {
    parse_with_options(reader, registry, &ParseOptions::default())
}

/// Parse a PLY stream into a mesh.
///
/// The registry is only read. Header errors, record decoding errors and a
/// vertex element without any position property are fatal; faces with fewer
/// than three indices or with out-of-range indices are skipped and reported
/// through [`Mesh::diagnostics`].
#[tracing::instrument(skip_all)]
pub fn parse_with_options<R: BufRead>(
    mut reader: R,
    registry: &SemanticRegistry,
    options: &ParseOptions,
) -> Result<Mesh, FormatError> {
    let header = read_header(&mut reader)?;

    let vertex_count = header.element(VERTEX_ELEMENT).map_or(0, |e| e.count);
    if vertex_count == 0 {
        return Err(FormatError::EmptyMesh);
    }

    let has_faces = header.element(FACE_ELEMENT).is_some();
    let mut decoder = ElementDecoder::new(reader, header.format);
    let mut assembler = MeshAssembler::new(registry, vertex_count, header.format);

    for element in &header.elements {
        match element.name.as_str() {
            VERTEX_ELEMENT if !assembler.vertices_read => {
                assembler.read_vertices(&mut decoder, element, options)?;
            }
            FACE_ELEMENT if !assembler.faces_read => {
                assembler.read_faces(&mut decoder, element, options)?;
            }
            _ => {
                debug!("Skipping element {:?} ({} records)", element.name, element.count);
                decoder.skip_element(element, || options.check_cancelled())?;
            }
        }
    }

    let topology = if has_faces {
        Topology::Triangles
    } else {
        Topology::Points
    };
    let mesh = assembler.finish(topology, options);

    info!(
        "PLY parsed: {} vertices, {} triangles, {} skipped faces",
        mesh.vertex_count(),
        mesh.triangle_count(),
        mesh.diagnostics().len()
    );
    Ok(mesh)
}

/// Where one vertex property lands.
#[derive(Debug, Clone, Copy)]
struct Binding {
    property: usize,
    target: ScalarType,
    buffer: usize,
    component: usize,
    normalize: bool,
}

/// Owns the buffers under construction until [`finish`](Self::finish)
/// hands them to the caller as a [`Mesh`].
struct MeshAssembler<'r> {
    registry: &'r SemanticRegistry,
    vertex_count: usize,
    format: PlyFormat,
    attributes: Vec<AttributeBuffer>,
    indices: Vec<u32>,
    diagnostics: Vec<FaceDiagnostic>,
    vertices_read: bool,
    faces_read: bool,
}

impl<'r> MeshAssembler<'r> {
    fn new(registry: &'r SemanticRegistry, vertex_count: usize, format: PlyFormat) -> Self {
        Self {
            registry,
            vertex_count,
            format,
            attributes: Vec::new(),
            indices: Vec::new(),
            diagnostics: Vec::new(),
            vertices_read: false,
            faces_read: false,
        }
    }

    /// Resolve every scalar vertex property and allocate one buffer per
    /// group that has at least one bound slot.
    fn plan_vertex_bindings(&mut self, element: &ElementDecl) -> Vec<Binding> {
        let registry = self.registry;
        let mut bindings = Vec::new();
        let mut ignored = Vec::new();

        for (index, property) in element.properties.iter().enumerate() {
            let PropertyKind::Scalar(declared) = property.kind else {
                ignored.push(property.name.as_str());
                continue;
            };
            let Some(entry) = registry.resolve_for(&property.name, declared) else {
                ignored.push(property.name.as_str());
                continue;
            };

            let (group, component) = entry.slot.location();
            let buffer = match self.attributes.iter().position(|a| a.group() == group) {
                Some(buffer) => buffer,
                None => {
                    self.attributes
                        .push(AttributeBuffer::reserve(group, self.vertex_count));
                    self.attributes.len() - 1
                }
            };

            bindings.push(Binding {
                property: index,
                target: entry.target,
                buffer,
                component,
                normalize: group.is_color_like()
                    && (declared == ScalarType::UInt8 || entry.target == ScalarType::UInt8),
            });
        }

        if !ignored.is_empty() {
            debug!("Unmapped vertex properties: {:?}", ignored);
        }
        bindings
    }

    fn read_vertices<R: BufRead>(
        &mut self,
        decoder: &mut ElementDecoder<R>,
        element: &ElementDecl,
        options: &ParseOptions,
    ) -> Result<(), FormatError> {
        let bindings = self.plan_vertex_bindings(element);
        if !self
            .attributes
            .iter()
            .any(|a| a.group() == SemanticGroup::Position)
        {
            return Err(FormatError::MissingPositions);
        }

        let mut decoded = 0;
        for (vertex, record) in decoder.records(element).enumerate() {
            options.check_cancelled()?;
            let record = record?;
            for buffer in &mut self.attributes {
                buffer.push_defaults();
            }
            decoded += 1;
            for binding in &bindings {
                let Some(PropertyValue::Scalar(value)) = record.value(binding.property) else {
                    continue;
                };
                let mut v = value.coerce(binding.target).as_f32();
                if binding.normalize {
                    v /= 255.0;
                }
                self.attributes[binding.buffer].set(vertex, binding.component, v);
            }
        }

        if decoded != self.vertex_count {
            return Err(FormatError::UnexpectedEof {
                element: element.name.clone(),
                record: decoded,
            });
        }
        self.vertices_read = true;
        Ok(())
    }

    fn read_faces<R: BufRead>(
        &mut self,
        decoder: &mut ElementDecoder<R>,
        element: &ElementDecl,
        options: &ParseOptions,
    ) -> Result<(), FormatError> {
        let list_index = FACE_INDEX_NAMES
            .iter()
            .find_map(|name| {
                element
                    .property_index(name)
                    .filter(|&i| element.properties[i].is_list())
            })
            .or_else(|| element.properties.iter().position(|p| p.is_list()));

        let Some(list_index) = list_index else {
            warn!("Face element has no list property; ignoring {} faces", element.count);
            decoder.skip_element(element, || options.check_cancelled())?;
            self.faces_read = true;
            return Ok(());
        };

        let mut face_indices: Vec<u32> = Vec::new();
        for (face, record) in decoder.records(element).enumerate() {
            options.check_cancelled()?;
            let record = record?;
            let Some(PropertyValue::List(items)) = record.value(list_index) else {
                continue;
            };
            match self.validate_face(face, items, &mut face_indices) {
                Ok(()) => {
                    fan_triangulate(&face_indices, &mut self.indices);
                }
                Err(error) => {
                    warn!("Skipping face: {}", error);
                    self.diagnostics.push(FaceDiagnostic { face, error });
                }
            }
        }

        self.faces_read = true;
        Ok(())
    }

    /// Convert a face's index list, rejecting short faces and indices that
    /// are fractional or outside the vertex range.
    fn validate_face(
        &self,
        face: usize,
        items: &[ScalarValue],
        out: &mut Vec<u32>,
    ) -> Result<(), FormatError> {
        if items.len() < 3 {
            return Err(FormatError::DegenerateFace {
                face,
                len: items.len(),
            });
        }
        out.clear();
        for item in items {
            let raw = item.as_f64();
            if raw.fract() != 0.0 || raw < 0.0 || raw >= self.vertex_count as f64 {
                return Err(FormatError::IndexOutOfRange {
                    face,
                    index: raw as i64,
                    vertex_count: self.vertex_count,
                });
            }
            out.push(raw as u32);
        }
        Ok(())
    }

    fn finish(self, topology: Topology, options: &ParseOptions) -> Mesh {
        let mut mesh = Mesh::new(
            self.vertex_count,
            self.attributes,
            self.indices,
            topology,
            self.diagnostics,
            self.format,
        );

        if options.generates_normals() && !mesh.has(SemanticGroup::Normal) && mesh.triangle_count() > 0 {
            if let Some(positions) = mesh.positions() {
                let normals = compute_vertex_normals(positions, mesh.indices());
                mesh.push_attribute(AttributeBuffer::from_vec3(SemanticGroup::Normal, &normals));
            }
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{SemanticSlot, VertexSemanticEntry};
    use std::io::Cursor;

    fn parse_str(text: &str) -> Result<Mesh, FormatError> {
        parse(Cursor::new(text.as_bytes()), &SemanticRegistry::default())
    }

    const CUBE_CORNER: &str = "ply
format ascii 1.0
element vertex 1
property float x
property float y
property float z
property float nx
property float ny
property float nz
property uchar red
property uchar green
property uchar blue
end_header
1.5 -2 3.25 0 1 0 255 51 0
";

    #[test]
    fn test_single_vertex_round_trip() {
        let mesh = parse_str(CUBE_CORNER).unwrap();
        assert_eq!(mesh.vertex_count(), 1);
        assert_eq!(mesh.positions().unwrap(), &[[1.5, -2.0, 3.25]]);
        assert_eq!(mesh.normals().unwrap(), &[[0.0, 1.0, 0.0]]);
        assert_eq!(mesh.colors().unwrap(), &[[1.0, 51.0 / 255.0, 0.0, 1.0]]);
        assert_eq!(mesh.topology(), Topology::Points);
        assert!(mesh.indices().is_empty());
    }

    #[test]
    fn test_absent_groups_are_not_emitted() {
        let mesh = parse_str(
            "ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nproperty float y\n\
             property float z\nproperty float confidence\nend_header\n0 0 0 0.5\n1 1 1 0.9\n",
        )
        .unwrap();
        assert!(mesh.positions().is_some());
        assert!(mesh.colors().is_none());
        assert!(mesh.normals().is_none());
        assert_eq!(mesh.attributes().len(), 1);
    }

    #[test]
    fn test_partial_group_defaults() {
        let mesh = parse_str(
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty uchar green\n\
             end_header\n4 255\n",
        )
        .unwrap();
        assert_eq!(mesh.positions().unwrap(), &[[4.0, 0.0, 0.0]]);
        assert_eq!(mesh.colors().unwrap(), &[[0.0, 1.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_float_colors_pass_through() {
        let mesh = parse_str(
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float red\n\
             property float alpha\nend_header\n0 0.25 0.5\n",
        )
        .unwrap();
        assert_eq!(mesh.colors().unwrap(), &[[0.25, 0.0, 0.0, 0.5]]);
    }

    #[test]
    fn test_pentagon_and_degenerate_face() {
        let mesh = parse_str(
            "ply\nformat ascii 1.0\nelement vertex 6\nproperty float x\n\
             element face 3\nproperty list uchar int vertex_indices\nend_header\n\
             0\n1\n2\n3\n4\n5\n5 0 1 2 3 4\n1 5\n3 3 4 5\n",
        )
        .unwrap();
        assert_eq!(mesh.topology(), Topology::Triangles);
        assert_eq!(mesh.triangles(), &[[0, 1, 2], [0, 2, 3], [0, 3, 4], [3, 4, 5]]);
        assert_eq!(mesh.diagnostics().len(), 1);
        assert_eq!(mesh.diagnostics()[0].face, 1);
        assert!(matches!(
            mesh.diagnostics()[0].error,
            FormatError::DegenerateFace { face: 1, len: 1 }
        ));
    }

    #[test]
    fn test_out_of_range_index_is_skipped() {
        let mesh = parse_str(
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\n\
             element face 3\nproperty list uchar int vertex_index\nend_header\n\
             0\n1\n2\n3 0 1 3\n3 0 -1 2\n3 2 1 0\n",
        )
        .unwrap();
        assert_eq!(mesh.indices(), &[2, 1, 0]);
        assert_eq!(mesh.diagnostics().len(), 2);
        assert!(matches!(
            mesh.diagnostics()[1].error,
            FormatError::IndexOutOfRange { face: 1, index: -1, .. }
        ));
    }

    #[test]
    fn test_face_list_selection_and_extra_properties() {
        let mesh = parse_str(
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\n\
             element face 1\nproperty list uchar float texcoord\nproperty uchar flags\n\
             property list uchar uint vertex_indices\nend_header\n\
             0\n1\n2\n2 0.5 0.5 7 3 2 1 0\n",
        )
        .unwrap();
        assert_eq!(mesh.indices(), &[2, 1, 0]);
    }

    #[test]
    fn test_face_element_without_list() {
        let mesh = parse_str(
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\n\
             element face 2\nproperty uchar flags\nend_header\n0\n1\n2\n",
        )
        .unwrap();
        assert!(mesh.indices().is_empty());
        assert_eq!(mesh.topology(), Topology::Triangles);
    }

    #[test]
    fn test_empty_mesh() {
        assert!(matches!(
            parse_str("ply\nformat ascii 1.0\nelement vertex 0\nproperty float x\nend_header\n"),
            Err(FormatError::EmptyMesh)
        ));
        assert!(matches!(
            parse_str("ply\nformat ascii 1.0\nelement point 3\nproperty float x\nend_header\n"),
            Err(FormatError::EmptyMesh)
        ));
    }

    #[test]
    fn test_unterminated_header_before_decoding() {
        assert!(matches!(
            parse_str("ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\n1.0\n"),
            Err(FormatError::UnterminatedHeader)
        ));
    }

    #[test]
    fn test_truncated_binary() {
        let mut bytes =
            b"ply\nformat binary_little_endian 1.0\nelement vertex 10\nproperty float x\nproperty float y\nproperty float z\nend_header\n"
                .to_vec();
        for i in 0..5 {
            for c in 0..3 {
                bytes.extend_from_slice(&((i * 3 + c) as f32).to_le_bytes());
            }
        }
        let err = parse(Cursor::new(bytes), &SemanticRegistry::default()).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { record: 5, .. }));
    }

    #[test]
    fn test_huge_vertex_count_without_data() {
        for count in ["18446744073709551615", "1000000000000"] {
            for format in ["ascii", "binary_little_endian"] {
                let text = format!(
                    "ply\nformat {format} 1.0\nelement vertex {count}\nproperty float x\nend_header\n"
                );
                let err = parse_str(&text).unwrap_err();
                assert!(matches!(err, FormatError::UnexpectedEof { record: 0, .. }));
            }
        }
    }

    #[test]
    fn test_vertex_element_without_positions() {
        assert!(matches!(
            parse_str(
                "ply\nformat ascii 1.0\nelement vertex 2\nproperty float confidence\n\
                 end_header\n0.5\n0.9\n"
            ),
            Err(FormatError::MissingPositions)
        ));
        assert!(matches!(
            parse_str(
                "ply\nformat ascii 1.0\nelement vertex 1\nproperty uchar red\nend_header\n7\n"
            ),
            Err(FormatError::MissingPositions)
        ));
    }

    #[test]
    fn test_byte_color_with_float_target_is_normalized() {
        let registry = SemanticRegistry::new(vec![
            VertexSemanticEntry::same_type("x", ScalarType::Float32, SemanticSlot::PositionX),
            VertexSemanticEntry::new(
                "red",
                ScalarType::UInt8,
                ScalarType::Float32,
                SemanticSlot::ColorR,
            ),
        ]);
        let text = "ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\n\
                    property uchar red\nend_header\n0 255\n1 51\n";
        let mesh = parse(Cursor::new(text), &registry).unwrap();
        assert_eq!(
            mesh.colors().unwrap(),
            &[[1.0, 0.0, 0.0, 1.0], [51.0 / 255.0, 0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_fractional_face_index_is_skipped() {
        let mesh = parse_str(
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\n\
             element face 2\nproperty list uchar float vertex_indices\nend_header\n\
             0\n1\n2\n3 0 1.7 2\n3 0 1 2\n",
        )
        .unwrap();
        assert_eq!(mesh.indices(), &[0, 1, 2]);
        assert_eq!(mesh.diagnostics().len(), 1);
        assert!(matches!(
            mesh.diagnostics()[0].error,
            FormatError::IndexOutOfRange { face: 0, index: 1, .. }
        ));
    }

    #[test]
    fn test_custom_element_is_skipped() {
        let mesh = parse_str(
            "ply\nformat ascii 1.0\nelement camera 1\nproperty float view_px\n\
             property list uchar float extra\nelement vertex 1\nproperty float x\n\
             end_header\n9 2 1 1\n7\n",
        )
        .unwrap();
        assert_eq!(mesh.positions().unwrap(), &[[7.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_registry_override() {
        let registry = SemanticRegistry::new(vec![
            VertexSemanticEntry::same_type("px", ScalarType::Float32, SemanticSlot::PositionX),
            VertexSemanticEntry::same_type("s", ScalarType::Float32, SemanticSlot::TexU),
            VertexSemanticEntry::same_type("t", ScalarType::Float32, SemanticSlot::TexV),
        ]);
        let text = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float px\n\
                    property float x\nproperty float s\nproperty float t\nend_header\n1 2 0.25 0.75\n";
        let mesh = parse(Cursor::new(text), &registry).unwrap();
        assert_eq!(mesh.positions().unwrap(), &[[1.0, 0.0, 0.0]]);
        assert_eq!(mesh.tex_coords().unwrap(), &[[0.25, 0.75]]);
    }

    #[test]
    fn test_coercion_through_registry_target() {
        let registry = SemanticRegistry::new(vec![VertexSemanticEntry::new(
            "x",
            ScalarType::Float32,
            ScalarType::Int16,
            SemanticSlot::PositionX,
        )]);
        let text = "ply\nformat ascii 1.0\nelement vertex 2\nproperty double x\nend_header\n-2.75\n1e9\n";
        let mesh = parse(Cursor::new(text), &registry).unwrap();
        assert_eq!(mesh.positions().unwrap(), &[[-2.0, 0.0, 0.0], [32767.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_cancellation() {
        let flag: CancelFlag = Arc::new(AtomicBool::new(true));
        let options = ParseOptions::new().with_cancel_flag(flag.clone());
        let err = parse_with_options(
            Cursor::new(CUBE_CORNER.as_bytes()),
            &SemanticRegistry::default(),
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::Cancelled));

        flag.store(false, Ordering::Relaxed);
        assert!(
            parse_with_options(
                Cursor::new(CUBE_CORNER.as_bytes()),
                &SemanticRegistry::default(),
                &options
            )
            .is_ok()
        );
    }

    #[test]
    fn test_normal_generation() {
        let text = "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\n\
                    property float z\nelement face 1\nproperty list uchar int vertex_indices\n\
                    end_header\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n4 0 1 2 3\n";

        let plain = parse_str(text).unwrap();
        assert!(plain.normals().is_none());

        let options = ParseOptions::new().with_normal_generation(true);
        let mesh =
            parse_with_options(Cursor::new(text), &SemanticRegistry::default(), &options).unwrap();
        let normals = mesh.normals().unwrap();
        assert_eq!(normals.len(), 4);
        for n in normals {
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }
}
