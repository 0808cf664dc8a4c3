//! Binary FBX record parser.
//!
//! Layout: a 23-byte magic header, a u32 version, then nested records. Each
//! record is `endOffset, numProperties, propertyListLen` (u64 from version 7500,
//! u32 before), a u8 name length and the name, followed by its property list
//! and child records up to `endOffset`. A record whose `endOffset` is zero is a
//! null terminator.

use byteorder::{ByteOrder, LittleEndian};

use super::cursor::ByteCursor;
use super::node::{Array, Node, NodeId, PropertyRecord, RawConnection, Value};
use super::{
    is_properties_container, is_vector_type, normalize_lcl, Document, DocumentError,
    DocumentResult, Format,
};
use crate::diagnostics::{DiagnosticKind, Diagnostics};

const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";
const HEADER_LEN: usize = 23;
const WIDE_HEADER_VERSION: u32 = 7500;

/// Footer block: 160 bytes plus a 16-byte sentinel.
const FOOTER_LEN: usize = 160 + 16;

/// Check the binary signature.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] == MAGIC
}

/// Decode a binary document.
pub fn parse(bytes: &[u8], diagnostics: &mut Diagnostics) -> DocumentResult<Document> {
    let mut cursor = ByteCursor::new(bytes);
    cursor.skip(HEADER_LEN)?;
    let version = cursor.read_u32()?;
    log::debug!("FBX binary version {}", version);

    let mut parser = BinaryParser {
        cursor,
        wide: version >= WIDE_HEADER_VERSION,
    };
    let mut document = Document::new(Format::Binary, version);

    while !parser.end_of_content() {
        let limit = parser.cursor.len();
        if let Some(record) = parser.parse_record(limit, diagnostics)? {
            document.insert(record.node);
        }
    }

    log::debug!("Parsed {} top-level sections", document.len());
    Ok(document)
}

/// Header of one record.
struct RecordHeader {
    start: usize,
    end: usize,
    num_properties: usize,
    name: String,
}

/// A parsed record plus the raw property list the parent folds from.
struct RawRecord {
    node: Node,
    values: Vec<Value>,
    single_property: bool,
}

struct BinaryParser<'a> {
    cursor: ByteCursor<'a>,
    wide: bool,
}

impl<'a> BinaryParser<'a> {
    /// The footer is not parsed; content ends once fewer than a footer's worth
    /// of bytes remain.
    fn end_of_content(&self) -> bool {
        let size = self.cursor.len();
        let offset = self.cursor.offset();
        if size % 16 == 0 {
            ((offset + FOOTER_LEN) & !0xf) >= size
        } else {
            offset + FOOTER_LEN >= size
        }
    }

    /// Parse one record that must end at or before `limit`.
    ///
    /// Returns `None` for null records and for records skipped after a
    /// recoverable payload error.
    fn parse_record(
        &mut self,
        limit: usize,
        diagnostics: &mut Diagnostics,
    ) -> DocumentResult<Option<RawRecord>> {
        let header = match self.read_header(limit)? {
            Some(header) => header,
            None => return Ok(None),
        };

        match self.parse_body(&header, diagnostics) {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_recoverable() => {
                diagnostics.warn(
                    DiagnosticKind::Recovery,
                    format!(
                        "skipping record '{}' at offset {}: {}",
                        header.name, header.start, err
                    ),
                );
                self.cursor.seek(header.end)?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn read_header(&mut self, limit: usize) -> DocumentResult<Option<RecordHeader>> {
        let start = self.cursor.offset();
        let end_offset = self.cursor.read_offset(self.wide)?;
        let num_properties = self.cursor.read_offset(self.wide)?;
        let _property_list_len = self.cursor.read_offset(self.wide)?;
        let name_len = self.cursor.read_u8()? as usize;
        let name = self.cursor.read_string(name_len)?;

        if end_offset == 0 {
            return Ok(None);
        }

        let end = usize::try_from(end_offset).unwrap_or(usize::MAX);
        if end > limit || end < self.cursor.offset() {
            return Err(DocumentError::InvalidRecord {
                offset: start,
                message: format!(
                    "record '{}' claims to end at {} (allowed {}..={})",
                    name,
                    end_offset,
                    self.cursor.offset(),
                    limit
                ),
            });
        }

        // Every property takes at least one byte
        let num_properties = usize::try_from(num_properties).unwrap_or(usize::MAX);
        if num_properties > end - self.cursor.offset() {
            return Err(DocumentError::InvalidRecord {
                offset: start,
                message: format!("record '{}' claims {} properties", name, num_properties),
            });
        }

        Ok(Some(RecordHeader {
            start,
            end,
            num_properties,
            name,
        }))
    }

    fn parse_body(
        &mut self,
        header: &RecordHeader,
        diagnostics: &mut Diagnostics,
    ) -> DocumentResult<RawRecord> {
        let mut values = Vec::with_capacity(header.num_properties.min(16));
        for _ in 0..header.num_properties {
            values.push(self.parse_property()?);
        }
        if self.cursor.offset() > header.end {
            return Err(DocumentError::InvalidRecord {
                offset: header.start,
                message: format!(
                    "properties of '{}' overrun the record end ({} > {})",
                    header.name,
                    self.cursor.offset(),
                    header.end
                ),
            });
        }

        let single_property = header.num_properties == 1 && self.cursor.offset() == header.end;

        let mut node = Node::new(header.name.clone());
        node.id = match values.first() {
            Some(Value::Int(id)) => NodeId::Int(*id),
            Some(Value::String(s)) if !s.is_empty() => NodeId::Str(s.clone()),
            _ => NodeId::Anonymous,
        };
        if let Some(Value::String(s)) = values.get(1) {
            node.attr_name = s.clone();
        }
        if let Some(Value::String(s)) = values.get(2) {
            node.attr_type = s.clone();
        }

        while self.cursor.offset() < header.end {
            if let Some(child) = self.parse_record(header.end, diagnostics)? {
                fold_child(&mut node, child, diagnostics);
            }
        }

        Ok(RawRecord {
            node,
            values,
            single_property,
        })
    }

    fn parse_property(&mut self) -> DocumentResult<Value> {
        let offset = self.cursor.offset();
        let code = self.cursor.read_u8()? as char;

        let value = match code {
            'C' => Value::Bool(self.cursor.read_u8()? & 1 == 1),
            'D' => Value::Float(self.cursor.read_f64()?),
            'F' => Value::Float(self.cursor.read_f32()? as f64),
            'I' => Value::Int(self.cursor.read_i32()? as i64),
            'L' => Value::Int(self.cursor.read_i64()?),
            'Y' => Value::Int(self.cursor.read_i16()? as i64),
            'R' => {
                let len = self.cursor.read_u32()? as usize;
                Value::Bytes(self.cursor.take(len)?.to_vec())
            }
            'S' => {
                let len = self.cursor.read_u32()? as usize;
                Value::String(self.cursor.read_string(len)?)
            }
            'b' | 'c' | 'd' | 'f' | 'i' | 'l' => Value::Array(self.parse_array(code, offset)?),
            other => return Err(DocumentError::UnknownPropertyType { offset, code: other }),
        };
        Ok(value)
    }

    fn parse_array(&mut self, code: char, offset: usize) -> DocumentResult<Array> {
        let length = self.cursor.read_u32()? as usize;
        let encoding = self.cursor.read_u32()?;
        let compressed_length = self.cursor.read_u32()? as usize;

        let byte_len = length
            .checked_mul(element_size(code))
            .ok_or_else(|| DocumentError::InvalidRecord {
                offset,
                message: format!("array length {} overflows", length),
            })?;

        match encoding {
            0 => {
                let bytes = self.cursor.take(byte_len)?;
                Ok(decode_array(code, bytes, length))
            }
            1 => {
                let compressed = self.cursor.take(compressed_length)?;
                let bytes = inflate(compressed, byte_len, offset)?;
                Ok(decode_array(code, &bytes[..byte_len], length))
            }
            other => Err(DocumentError::UnsupportedEncoding {
                offset,
                encoding: other,
            }),
        }
    }
}

/// Merge a parsed child record into its parent node.
fn fold_child(parent: &mut Node, child: RawRecord, diagnostics: &mut Diagnostics) {
    let RawRecord {
        mut node,
        values,
        single_property,
    } = child;

    if single_property {
        if let Some(value) = values.into_iter().next() {
            match value {
                Value::Array(_) => {
                    node.set_property("a", value);
                    parent.add_child(node);
                }
                scalar => parent.set_property(node.name, scalar),
            }
        }
        return;
    }

    if parent.name == "Connections" && node.name == "C" {
        match connection_from_values(&values) {
            Some(conn) => parent.connections.push(conn),
            None => diagnostics.warn(
                DiagnosticKind::Reference,
                "connection record without numeric endpoints",
            ),
        }
        return;
    }

    if is_properties_container(&node.name) {
        parent.properties.extend(node.properties);
        return;
    }

    if is_properties_container(&parent.name) && node.name == "P" {
        if let Some((key, record)) = property_record(values) {
            parent.set_record(key, record);
        }
        return;
    }

    parent.add_child(node);
}

/// `C: kind, child, parent[, label]`
fn connection_from_values(values: &[Value]) -> Option<RawConnection> {
    let child = values.get(1)?.as_i64()?;
    let parent = values.get(2)?.as_i64()?;
    let label = values
        .get(3)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(RawConnection {
        child,
        parent,
        label,
    })
}

/// `P: name, type1, type2, flag, value...`
fn property_record(values: Vec<Value>) -> Option<(String, PropertyRecord)> {
    let text = |i: usize| {
        values
            .get(i)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let name = normalize_lcl(values.first()?.as_str()?);
    let type_name = normalize_lcl(&text(1));
    let type2 = text(2);
    let flag = text(3);

    let value = if is_vector_type(&type_name) {
        let components = values
            .iter()
            .skip(4)
            .take(3)
            .filter_map(Value::as_f64)
            .collect();
        Value::Array(Array::Double(components))
    } else {
        values
            .into_iter()
            .nth(4)
            .unwrap_or_else(|| Value::String(String::new()))
    };

    Some((
        name,
        PropertyRecord {
            type_name,
            type2,
            flag,
            value,
        },
    ))
}

fn element_size(code: char) -> usize {
    match code {
        'd' | 'l' => 8,
        'f' | 'i' => 4,
        _ => 1,
    }
}

/// Reinterpret exactly `length` elements from `bytes`.
fn decode_array(code: char, bytes: &[u8], length: usize) -> Array {
    match code {
        'd' => {
            let mut out = vec![0.0f64; length];
            LittleEndian::read_f64_into(bytes, &mut out);
            Array::Double(out)
        }
        'f' => {
            let mut out = vec![0.0f32; length];
            LittleEndian::read_f32_into(bytes, &mut out);
            Array::Float(out)
        }
        'i' => {
            let mut out = vec![0i32; length];
            LittleEndian::read_i32_into(bytes, &mut out);
            Array::Int(out)
        }
        'l' => {
            let mut out = vec![0i64; length];
            LittleEndian::read_i64_into(bytes, &mut out);
            Array::Long(out)
        }
        _ => Array::Bool(bytes.iter().map(|b| b & 1 == 1).collect()),
    }
}

#[cfg(feature = "deflate")]
fn inflate(compressed: &[u8], expected: usize, offset: usize) -> DocumentResult<Vec<u8>> {
    use std::io::Read;

    // The claimed length is untrusted; let the buffer grow with the actual output
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(compressed)
        .take(expected as u64)
        .read_to_end(&mut out)
        .map_err(|e| DocumentError::Decompression {
            offset,
            message: e.to_string(),
        })?;

    if out.len() < expected {
        return Err(DocumentError::Decompression {
            offset,
            message: format!("inflated {} bytes, expected {}", out.len(), expected),
        });
    }
    Ok(out)
}

#[cfg(not(feature = "deflate"))]
fn inflate(_compressed: &[u8], _expected: usize, _offset: usize) -> DocumentResult<Vec<u8>> {
    Err(DocumentError::MissingCodec)
}
