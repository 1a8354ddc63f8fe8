//! CPU-side mesh produced by the PLY reader.
//!
//! The mesh owns one flat `f32` buffer per present [`SemanticGroup`] and a
//! `u32` triangle index buffer. It is GPU-agnostic: callers convert it into
//! whatever drawable type their renderer uses.

use crate::error::FormatError;
use crate::ply::PlyFormat;
use crate::semantic::SemanticGroup;
use glam::Vec3;

/// How the vertices should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Indices form a triangle list.
    Triangles,
    /// The file had no face element; vertices are a point cloud.
    Points,
}

/// A face that was dropped during assembly.
#[derive(Debug)]
pub struct FaceDiagnostic {
    /// Record index within the face element.
    pub face: usize,
    pub error: FormatError,
}

/// Per-vertex values for one semantic group, `components()` floats per vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBuffer {
    group: SemanticGroup,
    data: Vec<f32>,
}

/// Upper bound on tuples reserved ahead of decoding. Counts come from the
/// file header and may not match the data that follows.
const MAX_RESERVED_VERTICES: usize = 1 << 16;

impl AttributeBuffer {
    /// Empty buffer with room for up to `expected` vertices.
    pub(crate) fn reserve(group: SemanticGroup, expected: usize) -> Self {
        let tuples = expected.min(MAX_RESERVED_VERTICES);
        Self {
            group,
            data: Vec::with_capacity(tuples * group.components()),
        }
    }

    /// Buffer for `vertex_count` vertices with every slot at its default.
    #[cfg(test)]
    pub(crate) fn with_defaults(group: SemanticGroup, vertex_count: usize) -> Self {
        let mut buffer = Self::reserve(group, vertex_count);
        for _ in 0..vertex_count {
            buffer.push_defaults();
        }
        buffer
    }

    /// Append one vertex with every slot at its default.
    pub(crate) fn push_defaults(&mut self) {
        let group = self.group;
        self.data
            .extend((0..group.components()).map(|i| group.default_component(i)));
    }

    pub fn group(&self) -> SemanticGroup {
        self.group
    }

    pub fn components(&self) -> usize {
        self.group.components()
    }

    /// Number of vertices (tuples) stored.
    pub fn len(&self) -> usize {
        self.data.len() / self.components()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, vertex: usize) -> Option<&[f32]> {
        let n = self.components();
        self.data.get(vertex * n..(vertex + 1) * n)
    }

    pub(crate) fn set(&mut self, vertex: usize, component: usize, value: f32) {
        let n = self.components();
        self.data[vertex * n + component] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn as_vec2(&self) -> Option<&[[f32; 2]]> {
        (self.components() == 2).then(|| bytemuck::cast_slice(&self.data))
    }

    pub fn as_vec3(&self) -> Option<&[[f32; 3]]> {
        (self.components() == 3).then(|| bytemuck::cast_slice(&self.data))
    }

    pub fn as_vec4(&self) -> Option<&[[f32; 4]]> {
        (self.components() == 4).then(|| bytemuck::cast_slice(&self.data))
    }

    pub(crate) fn from_vec3(group: SemanticGroup, values: &[Vec3]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 3);
        for v in values {
            data.extend_from_slice(&v.to_array());
        }
        Self { group, data }
    }
}

/// A decoded mesh. Every attribute buffer holds exactly `vertex_count`
/// tuples and the index buffer length is a multiple of three.
#[derive(Debug)]
pub struct Mesh {
    vertex_count: usize,
    attributes: Vec<AttributeBuffer>,
    indices: Vec<u32>,
    topology: Topology,
    diagnostics: Vec<FaceDiagnostic>,
    format: PlyFormat,
}

impl Mesh {
    pub(crate) fn new(
        vertex_count: usize,
        mut attributes: Vec<AttributeBuffer>,
        indices: Vec<u32>,
        topology: Topology,
        diagnostics: Vec<FaceDiagnostic>,
        format: PlyFormat,
    ) -> Self {
        debug_assert!(indices.len() % 3 == 0);
        debug_assert!(attributes.iter().all(|a| a.len() == vertex_count));
        attributes.sort_by_key(|a| a.group());
        Self {
            vertex_count,
            attributes,
            indices,
            topology,
            diagnostics,
            format,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Present attribute buffers ordered by group.
    pub fn attributes(&self) -> &[AttributeBuffer] {
        &self.attributes
    }

    pub fn attribute(&self, group: SemanticGroup) -> Option<&AttributeBuffer> {
        self.attributes.iter().find(|a| a.group() == group)
    }

    pub fn has(&self, group: SemanticGroup) -> bool {
        self.attribute(group).is_some()
    }

    pub fn positions(&self) -> Option<&[[f32; 3]]> {
        self.attribute(SemanticGroup::Position)?.as_vec3()
    }

    pub fn normals(&self) -> Option<&[[f32; 3]]> {
        self.attribute(SemanticGroup::Normal)?.as_vec3()
    }

    /// RGBA colors. Byte-typed channels are already divided by 255;
    /// float-typed channels are passed through unchanged.
    pub fn colors(&self) -> Option<&[[f32; 4]]> {
        self.attribute(SemanticGroup::Color)?.as_vec4()
    }

    pub fn tex_coords(&self) -> Option<&[[f32; 2]]> {
        self.attribute(SemanticGroup::TexCoord)?.as_vec2()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Faces skipped during assembly.
    pub fn diagnostics(&self) -> &[FaceDiagnostic] {
        &self.diagnostics
    }

    /// Payload encoding of the source file.
    pub fn format(&self) -> PlyFormat {
        self.format
    }

    /// Axis-aligned bounds of the position buffer.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let positions = self.positions()?;
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for p in positions {
            let p = Vec3::from_array(*p);
            min = min.min(p);
            max = max.max(p);
        }
        Some((min, max))
    }

    /// Interleave the requested groups into one vertex stream.
    ///
    /// Groups missing from the mesh are written with their default values so
    /// the stride stays the sum of the requested groups' widths.
    pub fn interleaved(&self, groups: &[SemanticGroup]) -> Vec<f32> {
        let stride: usize = groups.iter().map(|g| g.components()).sum();
        let mut out = Vec::with_capacity(stride * self.vertex_count);
        for vertex in 0..self.vertex_count {
            for group in groups {
                match self.attribute(*group).and_then(|a| a.get(vertex)) {
                    Some(values) => out.extend_from_slice(values),
                    None => out.extend((0..group.components()).map(|i| group.default_component(i))),
                }
            }
        }
        out
    }

    pub(crate) fn push_attribute(&mut self, buffer: AttributeBuffer) {
        debug_assert_eq!(buffer.len(), self.vertex_count);
        self.attributes.retain(|a| a.group() != buffer.group());
        self.attributes.push(buffer);
        self.attributes.sort_by_key(|a| a.group());
    }
}
