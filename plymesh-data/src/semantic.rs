//! Mapping from vertex property names to geometric meaning.
//!
//! A [`SemanticRegistry`] is an ordered table of [`VertexSemanticEntry`]
//! values. The default table follows the usual PLY property names; callers
//! with nonstandard files build their own table (or load one from JSON) and
//! pass it to [`parse`](crate::parse).

use crate::types::ScalarType;
use serde::{Deserialize, Serialize};

/// A group of slots that becomes one attribute buffer on the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SemanticGroup {
    Position,
    Normal,
    Color,
    TexCoord,
    Ambient,
    Diffuse,
    Specular,
    SpecularShading,
}

impl SemanticGroup {
    pub const ALL: [SemanticGroup; 8] = [
        Self::Position,
        Self::Normal,
        Self::Color,
        Self::TexCoord,
        Self::Ambient,
        Self::Diffuse,
        Self::Specular,
        Self::SpecularShading,
    ];

    /// Number of components per vertex.
    pub fn components(&self) -> usize {
        match self {
            Self::Position | Self::Normal | Self::Ambient | Self::Diffuse | Self::Specular => 3,
            Self::Color => 4,
            Self::TexCoord | Self::SpecularShading => 2,
        }
    }

    /// Groups whose byte-typed channels are normalized to `[0, 1]`.
    pub fn is_color_like(&self) -> bool {
        matches!(
            self,
            Self::Color | Self::Ambient | Self::Diffuse | Self::Specular
        )
    }

    /// Value written for slots the file does not provide.
    pub fn default_component(&self, index: usize) -> f32 {
        match (self, index) {
            (Self::Color, 3) => 1.0,
            _ => 0.0,
        }
    }
}

/// A single recognized vertex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticSlot {
    PositionX,
    PositionY,
    PositionZ,
    NormalX,
    NormalY,
    NormalZ,
    ColorR,
    ColorG,
    ColorB,
    ColorA,
    TexU,
    TexV,
    AmbientR,
    AmbientG,
    AmbientB,
    DiffuseR,
    DiffuseG,
    DiffuseB,
    SpecularR,
    SpecularG,
    SpecularB,
    SpecularCoeff,
    SpecularPower,
}

impl SemanticSlot {
    /// Group this slot belongs to and its component index within the group.
    pub fn location(&self) -> (SemanticGroup, usize) {
        use SemanticGroup as G;
        match self {
            Self::PositionX => (G::Position, 0),
            Self::PositionY => (G::Position, 1),
            Self::PositionZ => (G::Position, 2),
            Self::NormalX => (G::Normal, 0),
            Self::NormalY => (G::Normal, 1),
            Self::NormalZ => (G::Normal, 2),
            Self::ColorR => (G::Color, 0),
            Self::ColorG => (G::Color, 1),
            Self::ColorB => (G::Color, 2),
            Self::ColorA => (G::Color, 3),
            Self::TexU => (G::TexCoord, 0),
            Self::TexV => (G::TexCoord, 1),
            Self::AmbientR => (G::Ambient, 0),
            Self::AmbientG => (G::Ambient, 1),
            Self::AmbientB => (G::Ambient, 2),
            Self::DiffuseR => (G::Diffuse, 0),
            Self::DiffuseG => (G::Diffuse, 1),
            Self::DiffuseB => (G::Diffuse, 2),
            Self::SpecularR => (G::Specular, 0),
            Self::SpecularG => (G::Specular, 1),
            Self::SpecularB => (G::Specular, 2),
            Self::SpecularCoeff => (G::SpecularShading, 0),
            Self::SpecularPower => (G::SpecularShading, 1),
        }
    }

    pub fn group(&self) -> SemanticGroup {
        self.location().0
    }
}

/// Binds a file property name to a slot.
///
/// `source` is the type the entry expects the file to declare; `target` is
/// the type the value is coerced to before it is written into the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexSemanticEntry {
    pub name: String,
    pub source: ScalarType,
    pub target: ScalarType,
    pub slot: SemanticSlot,
}

impl VertexSemanticEntry {
    pub fn new(
        name: impl Into<String>,
        source: ScalarType,
        target: ScalarType,
        slot: SemanticSlot,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            target,
            slot,
        }
    }

    /// Entry whose source and target types agree.
    pub fn same_type(name: impl Into<String>, ty: ScalarType, slot: SemanticSlot) -> Self {
        Self::new(name, ty, ty, slot)
    }
}

/// Ordered, caller-owned table of vertex semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SemanticRegistry {
    entries: Vec<VertexSemanticEntry>,
}

impl SemanticRegistry {
    pub fn new(entries: Vec<VertexSemanticEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[VertexSemanticEntry] {
        &self.entries
    }

    /// Replace the whole table.
    pub fn set(&mut self, entries: Vec<VertexSemanticEntry>) {
        self.entries = entries;
    }

    /// First entry bound to `name`.
    pub fn resolve(&self, name: &str) -> Option<&VertexSemanticEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entry bound to `name` best suited to a file that declares `declared`.
    ///
    /// Preference order: an exact source type match, then the narrowest
    /// source type `declared` widens to losslessly, then the first entry with
    /// that name.
    pub fn resolve_for(&self, name: &str, declared: ScalarType) -> Option<&VertexSemanticEntry> {
        let mut candidates = self.entries.iter().filter(|e| e.name == name).peekable();
        let first = *candidates.peek()?;

        let mut widening: Option<&VertexSemanticEntry> = None;
        for entry in candidates {
            if entry.source == declared {
                return Some(entry);
            }
            if declared.widens_to(entry.source)
                && widening.is_none_or(|w| entry.source.size_bytes() < w.source.size_bytes())
            {
                widening = Some(entry);
            }
        }
        Some(widening.unwrap_or(first))
    }

    /// Load a table from its JSON form (an array of entries).
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for SemanticRegistry {
    fn default() -> Self {
        use ScalarType::{Float32, UInt8};
        use SemanticSlot as S;

        let float = [
            ("x", S::PositionX),
            ("y", S::PositionY),
            ("z", S::PositionZ),
            ("nx", S::NormalX),
            ("ny", S::NormalY),
            ("nz", S::NormalZ),
        ];
        let colors = [
            ("red", S::ColorR),
            ("green", S::ColorG),
            ("blue", S::ColorB),
            ("alpha", S::ColorA),
        ];
        let tex = [("u", S::TexU), ("v", S::TexV)];
        let materials = [
            ("ambient_red", S::AmbientR),
            ("ambient_green", S::AmbientG),
            ("ambient_blue", S::AmbientB),
            ("diffuse_red", S::DiffuseR),
            ("diffuse_green", S::DiffuseG),
            ("diffuse_blue", S::DiffuseB),
            ("specular_red", S::SpecularR),
            ("specular_green", S::SpecularG),
            ("specular_blue", S::SpecularB),
        ];
        let shading = [
            ("specular_coeff", S::SpecularCoeff),
            ("specular_power", S::SpecularPower),
        ];

        let mut entries = Vec::new();
        entries.extend(float.iter().map(|&(n, s)| VertexSemanticEntry::same_type(n, Float32, s)));
        entries.extend(colors.iter().map(|&(n, s)| VertexSemanticEntry::same_type(n, UInt8, s)));
        entries.extend(tex.iter().map(|&(n, s)| VertexSemanticEntry::same_type(n, Float32, s)));
        entries.extend(materials.iter().map(|&(n, s)| VertexSemanticEntry::same_type(n, UInt8, s)));
        entries.extend(shading.iter().map(|&(n, s)| VertexSemanticEntry::same_type(n, Float32, s)));

        // Float-typed colors keep their value instead of truncating through uchar.
        entries.extend(
            colors
                .iter()
                .chain(materials.iter())
                .map(|&(n, s)| VertexSemanticEntry::same_type(n, Float32, s)),
        );

        Self { entries }
    }
}
