//! PLY header parsing.

use crate::error::FormatError;
use crate::types::ScalarType;
use std::io::{BufRead, Read};
use tracing::{debug, warn};

/// Payload encoding declared on the `format` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl PlyFormat {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "ascii" => Some(Self::Ascii),
            "binary_little_endian" => Some(Self::BinaryLittleEndian),
            "binary_big_endian" => Some(Self::BinaryBigEndian),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::BinaryLittleEndian => "binary_little_endian",
            Self::BinaryBigEndian => "binary_big_endian",
        }
    }
}

/// Declared layout of one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar(ScalarType),
    List {
        count_type: ScalarType,
        item_type: ScalarType,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    pub kind: PropertyKind,
}

impl PropertyDecl {
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Scalar(ty),
        }
    }

    pub fn list(name: impl Into<String>, count_type: ScalarType, item_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::List {
                count_type,
                item_type,
            },
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, PropertyKind::List { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PropertyDecl>,
}

impl ElementDecl {
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }
}

/// Everything the header declares. No element data is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format: PlyFormat,
    pub version: String,
    pub elements: Vec<ElementDecl>,
    pub comments: Vec<String>,
    pub obj_info: Vec<String>,
}

impl Header {
    pub fn element(&self, name: &str) -> Option<&ElementDecl> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// Bytes read from the first line before giving up on the signature.
const MAGIC_LINE_LIMIT: u64 = 16;

/// Longest header line accepted after the signature.
const HEADER_LINE_LIMIT: u64 = 64 * 1024;

/// Whether the stream opens with the `ply` line. Reads at most
/// [`MAGIC_LINE_LIMIT`] bytes.
fn read_magic<R: BufRead>(reader: &mut R) -> Result<bool, FormatError> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(MAGIC_LINE_LIMIT)
        .read_until(b'\n', &mut buf)?;
    Ok(buf.trim_ascii_end() == b"ply")
}

/// Read header line `line`, stripping the trailing LF or CRLF.
/// Returns `None` at end of stream.
fn next_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    line: usize,
) -> Result<Option<String>, FormatError> {
    buf.clear();
    let read = reader
        .by_ref()
        .take(HEADER_LINE_LIMIT)
        .read_until(b'\n', buf)?;
    if read == 0 {
        return Ok(None);
    }
    if read as u64 == HEADER_LINE_LIMIT && buf.last() != Some(&b'\n') {
        return Err(FormatError::MalformedLine {
            line,
            text: String::from_utf8_lossy(&buf[..64]).into_owned(),
        });
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

fn parse_type(token: Option<&str>, line: usize, text: &str) -> Result<ScalarType, FormatError> {
    let token = token.ok_or_else(|| FormatError::MalformedLine {
        line,
        text: text.to_string(),
    })?;
    ScalarType::parse(token).ok_or_else(|| FormatError::UnknownType {
        line,
        token: token.to_string(),
    })
}

/// Parse the header and leave `reader` positioned at the first data byte.
#[tracing::instrument(skip_all)]
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<Header, FormatError> {
    if !read_magic(reader)? {
        return Err(FormatError::BadMagic);
    }

    let mut buf = Vec::new();

    let mut format: Option<(PlyFormat, String)> = None;
    let mut elements: Vec<ElementDecl> = Vec::new();
    let mut comments = Vec::new();
    let mut obj_info = Vec::new();
    let mut line_no = 1;

    loop {
        line_no += 1;
        let Some(text) = next_line(reader, &mut buf, line_no)? else {
            return Err(FormatError::UnterminatedHeader);
        };

        let trimmed = text.trim();
        if trimmed == "end_header" {
            break;
        }

        let mut it = trimmed.split_whitespace();
        let malformed = || FormatError::MalformedLine {
            line: line_no,
            text: text.clone(),
        };

        match it.next() {
            None => {}
            Some("comment") => comments.push(rest_after(trimmed, "comment")),
            Some("obj_info") => obj_info.push(rest_after(trimmed, "obj_info")),
            Some("format") => {
                let token = it.next().unwrap_or("");
                let fmt = PlyFormat::parse(token)
                    .ok_or_else(|| FormatError::UnsupportedFormat(token.to_string()))?;
                let version = it.next().unwrap_or("1.0").to_string();
                format = Some((fmt, version));
            }
            Some("element") => {
                let name = it.next().ok_or_else(malformed)?;
                let count_str = it.next().unwrap_or("");
                let count = count_str.parse::<usize>().map_err(|_| FormatError::BadCount {
                    line: line_no,
                    count: count_str.to_string(),
                })?;
                elements.push(ElementDecl {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or(FormatError::PropertyWithoutElement { line: line_no })?;
                let first = it.next();
                let decl = if first == Some("list") {
                    let count_type = parse_type(it.next(), line_no, &text)?;
                    let item_type = parse_type(it.next(), line_no, &text)?;
                    let name = it.next().ok_or_else(malformed)?;
                    PropertyDecl::list(name, count_type, item_type)
                } else {
                    let ty = parse_type(first, line_no, &text)?;
                    let name = it.next().ok_or_else(malformed)?;
                    PropertyDecl::scalar(name, ty)
                };
                element.properties.push(decl);
            }
            Some(other) => warn!("Ignoring unknown header keyword {:?} on line {}", other, line_no),
        }
    }

    let (format, version) = format
        .ok_or_else(|| FormatError::UnsupportedFormat("missing format line".to_string()))?;

    debug!(
        "PLY header: {} {}, {} elements",
        format.as_str(),
        version,
        elements.len()
    );

    Ok(Header {
        format,
        version,
        elements,
        comments,
        obj_info,
    })
}

fn rest_after(line: &str, keyword: &str) -> String {
    line[keyword.len()..].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn parse(text: &str) -> Result<Header, FormatError> {
        read_header(&mut Cursor::new(text.as_bytes()))
    }

    #[test]
    fn test_parse_full_header() {
        let header = parse(
            "ply\nformat binary_little_endian 1.0\ncomment made by hand\nobj_info scanner 3\n\
             element vertex 8\nproperty float x\nproperty float y\nproperty uchar red\n\
             element face 6\nproperty list uchar int vertex_indices\nend_header\n",
        )
        .unwrap();

        assert_eq!(header.format, PlyFormat::BinaryLittleEndian);
        assert_eq!(header.version, "1.0");
        assert_eq!(header.comments, vec!["made by hand".to_string()]);
        assert_eq!(header.obj_info, vec!["scanner 3".to_string()]);
        assert_eq!(header.elements.len(), 2);

        let vertex = header.element("vertex").unwrap();
        assert_eq!(vertex.count, 8);
        assert_eq!(vertex.properties[2], PropertyDecl::scalar("red", ScalarType::UInt8));

        let face = header.element("face").unwrap();
        assert_eq!(
            face.properties[0],
            PropertyDecl::list("vertex_indices", ScalarType::UInt8, ScalarType::Int32)
        );
    }

    #[test]
    fn test_crlf_header_stops_at_data() {
        let bytes = b"ply\r\nformat binary_big_endian 1.0\r\nelement vertex 1\r\nproperty uchar x\r\nend_header\r\n\x07";
        let mut cursor = Cursor::new(&bytes[..]);
        let header = read_header(&mut cursor).unwrap();
        assert_eq!(header.format, PlyFormat::BinaryBigEndian);

        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![7]);
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(parse("plx\nformat ascii 1.0\nend_header\n"), Err(FormatError::BadMagic)));
        assert!(matches!(parse(""), Err(FormatError::BadMagic)));
    }

    #[test]
    fn test_bad_magic_reads_a_bounded_prefix() {
        let mut cursor = Cursor::new(vec![0xABu8; 1 << 20]);
        assert!(matches!(read_header(&mut cursor), Err(FormatError::BadMagic)));
        assert!(cursor.position() <= MAGIC_LINE_LIMIT);
    }

    #[test]
    fn test_overlong_header_line() {
        let mut text = b"ply\nformat ascii 1.0\ncomment ".to_vec();
        text.resize(text.len() + HEADER_LINE_LIMIT as usize, b'x');
        text.extend_from_slice(b"\nend_header\n");
        assert!(matches!(
            read_header(&mut Cursor::new(text)),
            Err(FormatError::MalformedLine { line: 3, .. })
        ));
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            parse("ply\nformat binary_middle_endian 1.0\nend_header\n"),
            Err(FormatError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            parse("ply\nelement vertex 1\nend_header\n"),
            Err(FormatError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_bad_counts() {
        assert!(matches!(
            parse("ply\nformat ascii 1.0\nelement vertex -3\nend_header\n"),
            Err(FormatError::BadCount { line: 3, .. })
        ));
        assert!(matches!(
            parse("ply\nformat ascii 1.0\nelement vertex many\nend_header\n"),
            Err(FormatError::BadCount { .. })
        ));
    }

    #[test]
    fn test_property_without_element() {
        assert!(matches!(
            parse("ply\nformat ascii 1.0\nproperty float x\nend_header\n"),
            Err(FormatError::PropertyWithoutElement { line: 3 })
        ));
    }

    #[test]
    fn test_unknown_type() {
        let err = parse("ply\nformat ascii 1.0\nelement vertex 1\nproperty half x\nend_header\n")
            .unwrap_err();
        assert!(matches!(err, FormatError::UnknownType { ref token, .. } if token == "half"));

        let err = parse(
            "ply\nformat ascii 1.0\nelement face 1\nproperty list uchar quad vertex_indices\nend_header\n",
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::UnknownType { .. }));
    }

    #[test]
    fn test_missing_end_header() {
        assert!(matches!(
            parse("ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\n"),
            Err(FormatError::UnterminatedHeader)
        ));
    }

    #[test]
    fn test_property_missing_name() {
        assert!(matches!(
            parse("ply\nformat ascii 1.0\nelement vertex 1\nproperty float\nend_header\n"),
            Err(FormatError::MalformedLine { line: 4, .. })
        ));
    }
}
