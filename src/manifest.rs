//! JAR manifest handling
//!
//! Only the main section of `META-INF/MANIFEST.MF` is parsed. Per-entry
//! sections are carried as raw bytes so that a manifest written back without
//! changes is byte-identical to the one that was read.
//!
//! ## Format
//!
//! - Header lines are `Name: value`, names are case-insensitive
//! - Lines are at most 72 bytes; longer headers continue on lines starting
//!   with a single space
//! - The main section ends with the first blank line
//! - Lines end with CRLF, LF or CR

use crate::error::{Error, Result};

/// Path of the manifest entry inside a JAR
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Maximum length of a manifest line in bytes, excluding the line ending
const MAX_LINE_BYTES: usize = 72;

/// Check whether an archive entry name is the manifest
pub fn is_manifest_path(name: &str) -> bool {
    name.eq_ignore_ascii_case(MANIFEST_PATH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    CrLf,
    Lf,
    Cr,
}

impl LineEnding {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::CrLf => b"\r\n",
            LineEnding::Lf => b"\n",
            LineEnding::Cr => b"\r",
        }
    }
}

/// Value of a manifest attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeValue<'a> {
    /// A UTF-8 value
    Text(&'a str),
    /// A value that is not valid UTF-8
    Binary(&'a [u8]),
}

impl<'a> AttributeValue<'a> {
    /// The value as text, if it is one
    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            AttributeValue::Text(text) => Some(text),
            AttributeValue::Binary(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Attribute {
    name: String,
    value: Vec<u8>,
    /// Bytes as read, including continuation lines and line endings.
    /// `None` once the value has been changed.
    raw: Option<Vec<u8>>,
}

/// A physical manifest line
struct Line<'a> {
    content: &'a [u8],
    raw: &'a [u8],
}

fn physical_lines(data: &[u8]) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'\n' => {
                lines.push(Line {
                    content: &data[start..i],
                    raw: &data[start..i + 1],
                });
                i += 1;
                start = i;
            }
            b'\r' => {
                let end = if data.get(i + 1) == Some(&b'\n') { i + 2 } else { i + 1 };
                lines.push(Line {
                    content: &data[start..i],
                    raw: &data[start..end],
                });
                i = end;
                start = i;
            }
            _ => i += 1,
        }
    }

    if start < data.len() {
        lines.push(Line {
            content: &data[start..],
            raw: &data[start..],
        });
    }

    lines
}

fn detect_line_ending(data: &[u8]) -> LineEnding {
    match data.iter().position(|&b| b == b'\n' || b == b'\r') {
        Some(pos) if data[pos] == b'\n' => LineEnding::Lf,
        Some(pos) if data.get(pos + 1) == Some(&b'\n') => LineEnding::CrLf,
        Some(_) => LineEnding::Cr,
        None => LineEnding::CrLf,
    }
}

fn is_valid_name(name: &[u8]) -> bool {
    !name.is_empty()
        && name
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Largest prefix of `s` that fits in `limit` bytes without splitting a character
fn split_point(s: &str, limit: usize) -> usize {
    if s.len() <= limit {
        return s.len();
    }
    let mut i = limit;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn render_header(name: &str, value: &str, line_ending: LineEnding) -> Vec<u8> {
    let header = format!("{}: {}", name, value);
    let mut out = Vec::with_capacity(header.len() + header.len() / MAX_LINE_BYTES * 3 + 2);

    let mut rest = header.as_str();
    let mut limit = MAX_LINE_BYTES;
    loop {
        let split = split_point(rest, limit);
        out.extend_from_slice(rest[..split].as_bytes());
        out.extend_from_slice(line_ending.as_bytes());
        rest = &rest[split..];
        if rest.is_empty() {
            break;
        }
        // Continuation lines spend one byte on the leading space
        out.push(b' ');
        limit = MAX_LINE_BYTES - 1;
    }

    out
}

/// Main section of a JAR manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    attributes: Vec<Attribute>,
    /// Section separator and per-entry sections, untouched
    trailer: Vec<u8>,
    line_ending: LineEnding,
}

impl Manifest {
    /// Parse manifest bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut attributes: Vec<Attribute> = Vec::new();
        let mut offset = 0;
        let mut trailer_start = data.len();

        for (index, line) in physical_lines(data).into_iter().enumerate() {
            if line.content.is_empty() {
                trailer_start = offset;
                break;
            }

            if line.content[0] == b' ' {
                let current = attributes.last_mut().ok_or_else(|| {
                    Error::InvalidManifest(format!(
                        "line {}: continuation without a header",
                        index + 1
                    ))
                })?;
                current.value.extend_from_slice(&line.content[1..]);
                if let Some(raw) = current.raw.as_mut() {
                    raw.extend_from_slice(line.raw);
                }
            } else {
                let colon = line
                    .content
                    .iter()
                    .position(|&b| b == b':')
                    .ok_or_else(|| {
                        Error::InvalidManifest(format!("line {}: missing ':'", index + 1))
                    })?;

                let name = &line.content[..colon];
                if !is_valid_name(name) {
                    return Err(Error::InvalidManifest(format!(
                        "line {}: invalid header name {:?}",
                        index + 1,
                        String::from_utf8_lossy(name)
                    )));
                }

                let mut value = &line.content[colon + 1..];
                if value.first() == Some(&b' ') {
                    value = &value[1..];
                }

                attributes.push(Attribute {
                    // Validated as ASCII above
                    name: String::from_utf8_lossy(name).into_owned(),
                    value: value.to_vec(),
                    raw: Some(line.raw.to_vec()),
                });
            }

            offset += line.raw.len();
        }

        Ok(Self {
            attributes,
            trailer: data[trailer_start..].to_vec(),
            line_ending: detect_line_ending(data),
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    /// Get a main attribute by case-insensitive name
    pub fn get(&self, name: &str) -> Option<AttributeValue<'_>> {
        self.position(name).map(|i| {
            let value = &self.attributes[i].value;
            match std::str::from_utf8(value) {
                Ok(text) => AttributeValue::Text(text),
                Err(_) => AttributeValue::Binary(value),
            }
        })
    }

    /// Set a main attribute
    ///
    /// An existing attribute keeps its name casing and position; a new one is
    /// appended at the end of the main section.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(i) => {
                let attr = &mut self.attributes[i];
                if attr.value != value.as_bytes() {
                    attr.value = value.as_bytes().to_vec();
                    attr.raw = None;
                }
            }
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value: value.as_bytes().to_vec(),
                raw: None,
            }),
        }
    }

    /// Names of the main attributes in file order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|attr| attr.name.as_str())
    }

    /// Number of main attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the main section has no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Whether any attribute changed since parsing
    pub fn is_modified(&self) -> bool {
        self.attributes.iter().any(|attr| attr.raw.is_none())
    }

    /// Serialize the manifest
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();

        for attr in &self.attributes {
            match &attr.raw {
                Some(raw) => out.extend_from_slice(raw),
                None => {
                    if !matches!(out.last(), None | Some(b'\n') | Some(b'\r')) {
                        out.extend_from_slice(self.line_ending.as_bytes());
                    }
                    let value = String::from_utf8_lossy(&attr.value);
                    out.extend_from_slice(&render_header(&attr.name, &value, self.line_ending));
                }
            }
        }

        out.extend_from_slice(&self.trailer);
        out
    }
}
