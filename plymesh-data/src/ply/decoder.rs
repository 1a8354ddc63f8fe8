//! Element record decoding for ASCII and binary payloads.

use super::header::{ElementDecl, PlyFormat, PropertyDecl, PropertyKind};
use crate::error::FormatError;
use crate::types::{ScalarType, ScalarValue};
use std::io::{BufRead, ErrorKind};
use std::iter::FusedIterator;

/// Decoded value of one property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Scalar(ScalarValue),
    List(Vec<ScalarValue>),
}

/// One element record, values in declaration order.
#[derive(Debug, Clone)]
pub struct DecodedRecord<'e> {
    properties: &'e [PropertyDecl],
    values: Vec<PropertyValue>,
}

impl<'e> DecodedRecord<'e> {
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        let index = self.properties.iter().position(|p| p.name == name)?;
        self.values.get(index)
    }

    pub fn value(&self, index: usize) -> Option<&PropertyValue> {
        self.values.get(index)
    }
}

/// Decode cursor over the data section of a PLY stream.
///
/// Elements must be read in header order; each element has to be consumed
/// fully (or skipped) before the next one starts.
pub struct ElementDecoder<R> {
    reader: R,
    format: PlyFormat,
    line: String,
}

impl<R: BufRead> ElementDecoder<R> {
    /// `reader` must be positioned right after `end_header`.
    pub fn new(reader: R, format: PlyFormat) -> Self {
        Self {
            reader,
            format,
            line: String::new(),
        }
    }

    /// Lazy sequence of exactly `element.count` records. Not restartable.
    pub fn records<'d, 'e>(&'d mut self, element: &'e ElementDecl) -> Records<'d, 'e, R> {
        Records {
            decoder: self,
            element,
            index: 0,
            failed: false,
        }
    }

    /// Decode and drop every record of `element`, running `before_record`
    /// ahead of each one.
    pub fn skip_element(
        &mut self,
        element: &ElementDecl,
        mut before_record: impl FnMut() -> Result<(), FormatError>,
    ) -> Result<(), FormatError> {
        for record in self.records(element) {
            before_record()?;
            record?;
        }
        Ok(())
    }

    fn read_record<'e>(
        &mut self,
        element: &'e ElementDecl,
        record: usize,
    ) -> Result<DecodedRecord<'e>, FormatError> {
        let values = match self.format {
            PlyFormat::Ascii => self.read_ascii_record(element, record)?,
            PlyFormat::BinaryLittleEndian => self.read_binary_record(element, record, true)?,
            PlyFormat::BinaryBigEndian => self.read_binary_record(element, record, false)?,
        };
        Ok(DecodedRecord {
            properties: &element.properties,
            values,
        })
    }

    fn read_ascii_record(
        &mut self,
        element: &ElementDecl,
        record: usize,
    ) -> Result<Vec<PropertyValue>, FormatError> {
        let eof = || FormatError::UnexpectedEof {
            element: element.name.clone(),
            record,
        };

        // Blank lines between records carry no data.
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Err(eof());
            }
            if !self.line.trim().is_empty() {
                break;
            }
        }

        let mut tokens = self.line.split_whitespace();
        let mut next = |ty: ScalarType| -> Result<ScalarValue, FormatError> {
            let token = tokens.next().ok_or_else(eof)?;
            parse_ascii_scalar(token, ty).ok_or_else(|| FormatError::BadNumericLiteral {
                element: element.name.clone(),
                record,
                ty,
                literal: token.to_string(),
            })
        };

        let mut values = Vec::with_capacity(element.properties.len());
        for property in &element.properties {
            let value = match property.kind {
                PropertyKind::Scalar(ty) => PropertyValue::Scalar(next(ty)?),
                PropertyKind::List {
                    count_type,
                    item_type,
                } => {
                    let len = next(count_type)?.as_len();
                    let mut items = Vec::with_capacity(len.min(64));
                    for _ in 0..len {
                        items.push(next(item_type)?);
                    }
                    PropertyValue::List(items)
                }
            };
            values.push(value);
        }
        Ok(values)
    }

    fn read_binary_record(
        &mut self,
        element: &ElementDecl,
        record: usize,
        little: bool,
    ) -> Result<Vec<PropertyValue>, FormatError> {
        let mut values = Vec::with_capacity(element.properties.len());
        for property in &element.properties {
            let value = match property.kind {
                PropertyKind::Scalar(ty) => self
                    .read_binary_scalar(ty, little)
                    .map(PropertyValue::Scalar),
                PropertyKind::List {
                    count_type,
                    item_type,
                } => self
                    .read_binary_scalar(count_type, little)
                    .and_then(|count| {
                        let len = count.as_len();
                        let mut items = Vec::with_capacity(len.min(64));
                        for _ in 0..len {
                            items.push(self.read_binary_scalar(item_type, little)?);
                        }
                        Ok(PropertyValue::List(items))
                    }),
            };
            let value = value.map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => FormatError::UnexpectedEof {
                    element: element.name.clone(),
                    record,
                },
                _ => FormatError::Io(e),
            })?;
            values.push(value);
        }
        Ok(values)
    }

    fn read_binary_scalar(&mut self, ty: ScalarType, little: bool) -> std::io::Result<ScalarValue> {
        let mut buf = [0u8; 8];
        let b = &mut buf[..ty.size_bytes()];
        self.reader.read_exact(b)?;

        macro_rules! decode {
            ($t:ty, $n:literal) => {{
                let mut arr = [0u8; $n];
                arr.copy_from_slice(b);
                if little {
                    <$t>::from_le_bytes(arr)
                } else {
                    <$t>::from_be_bytes(arr)
                }
            }};
        }

        Ok(match ty {
            ScalarType::Int8 => ScalarValue::Int8(b[0] as i8),
            ScalarType::UInt8 => ScalarValue::UInt8(b[0]),
            ScalarType::Int16 => ScalarValue::Int16(decode!(i16, 2)),
            ScalarType::UInt16 => ScalarValue::UInt16(decode!(u16, 2)),
            ScalarType::Int32 => ScalarValue::Int32(decode!(i32, 4)),
            ScalarType::UInt32 => ScalarValue::UInt32(decode!(u32, 4)),
            ScalarType::Float32 => ScalarValue::Float32(decode!(f32, 4)),
            ScalarType::Float64 => ScalarValue::Float64(decode!(f64, 8)),
        })
    }
}

/// Parse an ASCII token as `ty`. Integer properties also accept whole
/// numbers written in float form (`3.0`), which some exporters emit, but
/// reject values outside the declared type's range.
fn parse_ascii_scalar(token: &str, ty: ScalarType) -> Option<ScalarValue> {
    if ty.is_float() {
        return token.parse::<f64>().ok().map(|v| ScalarValue::from_f64(ty, v));
    }
    let v = match token.parse::<i64>() {
        Ok(v) => v as f64,
        Err(_) => token
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)?,
    };
    ty.holds(v).then(|| ScalarValue::from_f64(ty, v))
}

/// Iterator over the records of one element.
pub struct Records<'d, 'e, R> {
    decoder: &'d mut ElementDecoder<R>,
    element: &'e ElementDecl,
    index: usize,
    failed: bool,
}

impl<'d, 'e, R: BufRead> Iterator for Records<'d, 'e, R> {
    type Item = Result<DecodedRecord<'e>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.element.count {
            return None;
        }
        let result = self.decoder.read_record(self.element, self.index);
        self.index += 1;
        // A failed record leaves the cursor misaligned.
        self.failed = result.is_err();
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = self.element.count - self.index;
        (0, Some(remaining))
    }
}

impl<'d, 'e, R: BufRead> FusedIterator for Records<'d, 'e, R> {}
