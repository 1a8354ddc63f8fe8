//! PLY scalar types and numeric coercion between them.
//!
//! Every PLY integer type fits exactly in an `f64`, so coercion routes through
//! `f64` and relies on Rust's saturating float-to-int casts: truncation toward
//! zero, clamping to the target range, NaN to zero.

use serde::{Deserialize, Serialize};

/// A scalar type declared in a PLY header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    /// Parse a header type token. Accepts both the classic names
    /// (`uchar`, `float`, ...) and the sized aliases (`uint8`, `float32`, ...).
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "char" | "int8" => Some(Self::Int8),
            "uchar" | "uint8" => Some(Self::UInt8),
            "short" | "int16" => Some(Self::Int16),
            "ushort" | "uint16" => Some(Self::UInt16),
            "int" | "int32" => Some(Self::Int32),
            "uint" | "uint32" => Some(Self::UInt32),
            "float" | "float32" => Some(Self::Float32),
            "double" | "float64" => Some(Self::Float64),
            _ => None,
        }
    }

    /// Classic header name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "char",
            Self::UInt8 => "uchar",
            Self::Int16 => "short",
            Self::UInt16 => "ushort",
            Self::Int32 => "int",
            Self::UInt32 => "uint",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }

    /// Width of one binary value in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Float32 | Self::Float64
        )
    }

    /// Inclusive value range for integer types, `None` for floats.
    fn int_range(&self) -> Option<(f64, f64)> {
        match self {
            Self::Int8 => Some((i8::MIN as f64, i8::MAX as f64)),
            Self::UInt8 => Some((0.0, u8::MAX as f64)),
            Self::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
            Self::UInt16 => Some((0.0, u16::MAX as f64)),
            Self::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
            Self::UInt32 => Some((0.0, u32::MAX as f64)),
            Self::Float32 | Self::Float64 => None,
        }
    }

    /// Whether `v` lies inside the value range of `self`. Always true for
    /// float types.
    pub fn holds(&self, v: f64) -> bool {
        match self.int_range() {
            Some((lo, hi)) => v >= lo && v <= hi,
            None => true,
        }
    }

    /// Whether every value of `self` converts to `target` without loss.
    pub fn widens_to(&self, target: ScalarType) -> bool {
        if *self == target {
            return true;
        }
        match (self.int_range(), target.int_range()) {
            (Some((lo, hi)), Some((tlo, thi))) => lo >= tlo && hi <= thi,
            // f32 holds integers exactly up to 2^24, f64 up to 2^53.
            (Some(_), None) => match target {
                ScalarType::Float64 => true,
                _ => self.size_bytes() <= 2,
            },
            (None, None) => *self == ScalarType::Float32,
            (None, Some(_)) => false,
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded scalar, kept in the type the file declared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
}

impl ScalarValue {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Int8(_) => ScalarType::Int8,
            Self::UInt8(_) => ScalarType::UInt8,
            Self::Int16(_) => ScalarType::Int16,
            Self::UInt16(_) => ScalarType::UInt16,
            Self::Int32(_) => ScalarType::Int32,
            Self::UInt32(_) => ScalarType::UInt32,
            Self::Float32(_) => ScalarType::Float32,
            Self::Float64(_) => ScalarType::Float64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int8(v) => v as f64,
            Self::UInt8(v) => v as f64,
            Self::Int16(v) => v as f64,
            Self::UInt16(v) => v as f64,
            Self::Int32(v) => v as f64,
            Self::UInt32(v) => v as f64,
            Self::Float32(v) => v as f64,
            Self::Float64(v) => v,
        }
    }

    pub fn as_f32(&self) -> f32 {
        self.as_f64() as f32
    }

    /// Build a value of type `ty` from an `f64`, truncating toward zero and
    /// clamping to the integer range.
    pub fn from_f64(ty: ScalarType, v: f64) -> Self {
        match ty {
            ScalarType::Int8 => Self::Int8(v as i8),
            ScalarType::UInt8 => Self::UInt8(v as u8),
            ScalarType::Int16 => Self::Int16(v as i16),
            ScalarType::UInt16 => Self::UInt16(v as u16),
            ScalarType::Int32 => Self::Int32(v as i32),
            ScalarType::UInt32 => Self::UInt32(v as u32),
            ScalarType::Float32 => Self::Float32(v as f32),
            ScalarType::Float64 => Self::Float64(v),
        }
    }

    /// Convert to `target`.
    ///
    /// Integer to float keeps the raw value (no normalization). Float to
    /// integer truncates toward zero. Out-of-range values clamp to the
    /// target's min/max and never wrap.
    pub fn coerce(self, target: ScalarType) -> Self {
        if self.scalar_type() == target {
            return self;
        }
        Self::from_f64(target, self.as_f64())
    }

    /// Interpret as a non-negative length, clamping negatives to zero.
    pub fn as_len(&self) -> usize {
        match self.coerce(ScalarType::UInt32) {
            Self::UInt32(n) => n as usize,
            _ => 0,
        }
    }
}

/// Coerce a value decoded as `source` into `target`.
///
/// `value` is reinterpreted as `source` first, so callers holding a raw
/// number can use the same rules as the decoder.
pub fn coerce(value: f64, source: ScalarType, target: ScalarType) -> ScalarValue {
    ScalarValue::from_f64(source, value).coerce(target)
}
