//! FBX document layer.
//!
//! Turns a raw byte buffer into a generic [`Document`] tree. Both encodings are
//! supported and produce the same tree shape:
//!
//! - **Binary** (`Kaydara FBX Binary`): nested length-prefixed records with
//!   typed property lists, arrays optionally zlib-compressed.
//! - **Text** (ASCII `.fbx`, version 7000 or newer): tab-indented `Name: attrs {`
//!   blocks with `Key: value` lines.
//!
//! Typed metadata from `Properties70` blocks is hoisted onto the owning node,
//! and the `Connections` section is collected as `(child, parent, label)` triples.

mod binary;
mod cursor;
mod node;
mod text;

use std::collections::HashMap;

use thiserror::Error;

use crate::diagnostics::Diagnostics;

pub use cursor::ByteCursor;
pub use node::{
    parse_number_list, Array, ChildGroup, Node, NodeId, Property, PropertyRecord, RawConnection,
    Value,
};

/// Oldest text format version the parser accepts.
pub const MIN_TEXT_VERSION: u32 = 7000;

/// Errors that can occur while decoding the document layer.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Unrecognized file format")]
    UnrecognizedFormat,

    #[error("Cannot find the FBXVersion header")]
    MissingVersion,

    #[error("Unsupported FBX version {0} ({} or newer required)", MIN_TEXT_VERSION)]
    UnsupportedVersion(u32),

    #[error("Unexpected end of data at offset {offset} (needed {needed} bytes)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("Invalid record at offset {offset}: {message}")]
    InvalidRecord { offset: usize, message: String },

    #[error("Unknown property type '{code}' at offset {offset}")]
    UnknownPropertyType { offset: usize, code: char },

    #[error("Unsupported array encoding {encoding} at offset {offset}")]
    UnsupportedEncoding { offset: usize, encoding: u32 },

    #[error("Failed to inflate array at offset {offset}: {message}")]
    Decompression { offset: usize, message: String },

    #[error("Compressed array found but inflate support is not enabled")]
    MissingCodec,

    #[error("Unclosed node '{name}' starting at line {line}")]
    UnclosedNode { name: String, line: usize },
}

/// Broad class of a fatal document error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad signature or version
    Format,
    /// Length, offset or nesting inconsistency
    Structural,
    /// A required codec is unavailable
    Capability,
}

impl DocumentError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DocumentError::UnrecognizedFormat
            | DocumentError::MissingVersion
            | DocumentError::UnsupportedVersion(_) => ErrorClass::Format,
            DocumentError::MissingCodec => ErrorClass::Capability,
            _ => ErrorClass::Structural,
        }
    }

    /// Failures confined to one record's payload; the record can be skipped
    /// using its own end offset.
    pub(crate) fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DocumentError::UnknownPropertyType { .. }
                | DocumentError::UnsupportedEncoding { .. }
                | DocumentError::Decompression { .. }
        )
    }
}

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Source encoding of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Binary,
    Text,
}

/// A decoded FBX document: the top-level sections by name.
#[derive(Clone, Debug)]
pub struct Document {
    pub format: Format,
    pub version: u32,
    nodes: HashMap<String, Node>,
}

impl Document {
    pub fn new(format: Format, version: u32) -> Self {
        Self {
            format,
            version,
            nodes: HashMap::new(),
        }
    }

    /// Insert a top-level section. A later section with the same name replaces
    /// the earlier one.
    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.name.clone(), node);
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// The `Objects` section.
    pub fn objects(&self) -> Option<&Node> {
        self.node("Objects")
    }

    /// Connection triples in document order.
    pub fn connections(&self) -> &[RawConnection] {
        self.node("Connections")
            .map(|n| n.connections.as_slice())
            .unwrap_or(&[])
    }

    /// Number of top-level sections.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Detect the encoding of `bytes` and decode it into a document tree.
///
/// Recoverable record failures in binary input are reported to `diagnostics`.
pub fn parse_document(bytes: &[u8], diagnostics: &mut Diagnostics) -> DocumentResult<Document> {
    if binary::is_binary(bytes) {
        return binary::parse(bytes, diagnostics);
    }

    let text = String::from_utf8_lossy(bytes);
    if looks_like_disguised_binary(&text) {
        return Err(DocumentError::UnrecognizedFormat);
    }
    let version = text_version(&text).ok_or(DocumentError::MissingVersion)?;
    if version < MIN_TEXT_VERSION {
        return Err(DocumentError::UnsupportedVersion(version));
    }
    text::parse(&text, version)
}

/// Legacy check for binary content that went through a text conversion.
///
/// Samples the text at triangular-number offsets (0, 1, 3, 6, 10, ...) and
/// compares against the characters of `Kaydara\FBX\Binary\\`. Any match
/// rejects the input.
fn looks_like_disguised_binary(text: &str) -> bool {
    const SIGNATURE: &[u8] = b"Kaydara\\FBX\\Binary\\\\";

    let mut next_sample = 0usize;
    let mut step = 1usize;
    let mut expected = SIGNATURE.iter();
    let mut current = match expected.next() {
        Some(c) => *c as char,
        None => return false,
    };

    for (pos, ch) in text.chars().enumerate() {
        if pos < next_sample {
            continue;
        }
        if ch == current {
            return true;
        }
        next_sample += step;
        step += 1;
        current = match expected.next() {
            Some(c) => *c as char,
            None => return false,
        };
    }
    false
}

/// The number following the first `FBXVersion: ` that is followed by digits.
fn text_version(text: &str) -> Option<u32> {
    const KEY: &str = "FBXVersion: ";
    let mut rest = text;
    while let Some(pos) = rest.find(KEY) {
        rest = &rest[pos + KEY.len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            return Some(digits.parse().unwrap_or(u32::MAX));
        }
    }
    None
}

/// `Properties70`-style container names.
pub(crate) fn is_properties_container(name: &str) -> bool {
    name.strip_prefix("Properties")
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

/// Rewrite a leading `Lcl ` to `Lcl_`.
pub(crate) fn normalize_lcl(name: &str) -> String {
    match name.strip_prefix("Lcl ") {
        Some(rest) => format!("Lcl_{}", rest),
        None => name.to_string(),
    }
}

/// Typed metadata whose value spans three numbers.
pub(crate) fn is_vector_type(type_name: &str) -> bool {
    matches!(type_name, "ColorRGB" | "Color" | "Vector" | "Vector3D") || type_name.starts_with("Lcl_")
}
