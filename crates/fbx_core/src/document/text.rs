//! ASCII FBX parser.
//!
//! The format is line oriented and one tab deep per nesting level, so the
//! stack depth doubles as the expected indentation. Each line is one of:
//!
//! - node open: `Name: attr, attr, ... {`
//! - property: `Key: value`
//! - node close: `}` one level shallower
//! - continuation of a multi-line array (`a: 1,2,` followed by `3,4`)

use super::node::{parse_number_list, Array, Node, NodeId, PropertyRecord, RawConnection, Value};
use super::{is_properties_container, Document, DocumentError, DocumentResult, Format};

/// Decode a text document whose version header has already been checked.
pub fn parse(text: &str, version: u32) -> DocumentResult<Document> {
    let mut parser = TextParser::new(version);
    let mut lines = text.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let line_num = index + 1;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }

        let depth = parser.stack.len();
        if let Some((name, attrs)) = match_node_open(line, depth) {
            parser.open_node(name, attrs, line_num);
            continue;
        }

        if let Some((key, value)) = match_property(line, depth) {
            let value = if key == "Content" && value == "," {
                // Base64 payload on the following line
                match lines.next() {
                    Some((_, next)) => next
                        .replace('"', "")
                        .trim_end_matches(',')
                        .trim()
                        .to_string(),
                    None => String::new(),
                }
            } else {
                value.to_string()
            };
            parser.property(key, value);
            continue;
        }

        if depth > 0 && is_node_close(line, depth - 1) {
            parser.close_node();
            continue;
        }

        if !line.starts_with(|c: char| c.is_whitespace() || c == '}') {
            parser.continue_property(line);
        }
    }

    parser.finish()
}

/// Where the last property line landed, for continuation lines.
struct CurrentProperty {
    /// Index into the node stack
    depth: usize,
    key: String,
}

struct Frame {
    node: Node,
    line: usize,
}

struct TextParser {
    document: Document,
    stack: Vec<Frame>,
    current: Option<CurrentProperty>,
}

impl TextParser {
    fn new(version: u32) -> Self {
        Self {
            document: Document::new(Format::Text, version),
            stack: Vec::new(),
            current: None,
        }
    }

    fn open_node(&mut self, name: &str, attrs: Vec<String>, line: usize) {
        let mut node = Node::new(name);

        let mut attrs = attrs.into_iter();
        node.id = match attrs.next() {
            Some(id) if id.is_empty() => NodeId::Anonymous,
            Some(id) => match id.parse::<i64>() {
                Ok(n) => NodeId::Int(n),
                Err(_) => NodeId::Str(id),
            },
            None => NodeId::Anonymous,
        };
        if let Some(attr_name) = attrs.next() {
            node.attr_name = strip_class_prefix(&attr_name).to_string();
            node.attr_type = attrs.next().unwrap_or_default();
        }

        self.stack.push(Frame { node, line });
    }

    fn close_node(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        self.current = None;

        match self.stack.last_mut() {
            None => self.document.insert(frame.node),
            // Property containers are transparent: their records already
            // live on the grandparent.
            Some(_) if is_properties_container(&frame.node.name) => {}
            Some(parent) => parent.node.add_child(frame.node),
        }
    }

    fn property(&mut self, key: &str, value: String) {
        let depth = self.stack.len();
        if depth == 0 {
            log::debug!("ignoring top-level property '{}'", key);
            return;
        }

        if is_properties_container(&self.stack[depth - 1].node.name) {
            self.typed_property(&value);
            return;
        }

        let node = &mut self.stack[depth - 1].node;

        if key == "C" {
            match parse_connection(&value) {
                Some(conn) => node.connections.push(conn),
                None => log::warn!("ignoring malformed connection '{}'", value),
            }
            self.current = None;
            return;
        }

        if key == "Node" {
            if let Ok(id) = value.trim().parse::<i64>() {
                node.id = NodeId::Int(id);
            }
        }

        if key == "a" && !value.ends_with(',') {
            node.set_property("a", Value::Array(Array::Double(parse_number_list(&value))));
        } else {
            match node.value(key).cloned() {
                // Repeated keys concatenate their text
                Some(Value::String(mut existing)) => {
                    existing.push_str(&value);
                    node.set_property(key, Value::String(existing));
                }
                _ => node.set_property(key, Value::String(value)),
            }
        }

        self.current = Some(CurrentProperty {
            depth: depth - 1,
            key: key.to_string(),
        });
    }

    /// `P: "name", "type1", "type2", "flag", value...` inside a properties
    /// container. The record is attached to the container's parent.
    fn typed_property(&mut self, value: &str) {
        let parts: Vec<String> = value
            .split("\",")
            .map(|part| {
                let part = part.trim();
                let part = part.strip_prefix('"').unwrap_or(part);
                replace_first_whitespace(part)
            })
            .collect();

        let part = |i: usize| parts.get(i).cloned().unwrap_or_default();
        let name = part(0);
        let type_name = part(1);
        let raw = parts.get(4);

        let value = match (type_name.as_str(), raw) {
            (_, None) => Value::String(String::new()),
            ("int" | "enum" | "bool" | "ULongLong", Some(raw)) => match parse_int_prefix(raw) {
                Some(n) => Value::Int(n),
                None => Value::String(raw.clone()),
            },
            ("double" | "Number" | "FieldOfView", Some(raw)) => match raw.trim().parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(raw.clone()),
            },
            (t, Some(raw)) if super::is_vector_type(t) => {
                Value::Array(Array::Double(parse_number_list(raw)))
            }
            (_, Some(raw)) => Value::String(raw.clone()),
        };

        let record = PropertyRecord {
            type_name,
            type2: part(2),
            flag: part(3),
            value,
        };

        let depth = self.stack.len();
        let target = depth.saturating_sub(2);
        self.stack[target].node.set_record(name.clone(), record);
        self.current = Some(CurrentProperty {
            depth: target,
            key: name,
        });
    }

    /// Append a continuation line to the active property. Once the text stops
    /// ending in a comma, an `a` payload is converted to numbers.
    fn continue_property(&mut self, line: &str) {
        let Some(current) = &self.current else {
            return;
        };
        let Some(frame) = self.stack.get_mut(current.depth) else {
            return;
        };
        let node = &mut frame.node;

        let mut text = match node.value(&current.key) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        text.push_str(line);

        if current.key == "a" && !line.ends_with(',') {
            node.set_property("a", Value::Array(Array::Double(parse_number_list(&text))));
        } else {
            node.set_property(current.key.clone(), Value::String(text));
        }
    }

    fn finish(self) -> DocumentResult<Document> {
        if let Some(frame) = self.stack.last() {
            return Err(DocumentError::UnclosedNode {
                name: frame.node.name.clone(),
                line: frame.line,
            });
        }
        log::debug!("Parsed {} top-level sections", self.document.len());
        Ok(self.document)
    }
}

/// Exactly `depth` tabs, then a word character.
fn strip_indent(line: &str, depth: usize) -> Option<&str> {
    let bytes = line.as_bytes();
    if bytes.len() <= depth || bytes[..depth].iter().any(|&b| b != b'\t') {
        return None;
    }
    Some(&line[depth..])
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split `Word:rest` at the colon following a leading run of word characters.
fn split_word(rest: &str) -> Option<(&str, &str)> {
    let end = rest.find(|c: char| !is_word_char(c))?;
    if end == 0 || !rest[end..].starts_with(':') {
        return None;
    }
    Some((&rest[..end], &rest[end + 1..]))
}

/// `Name: attrs {` at the given depth.
fn match_node_open(line: &str, depth: usize) -> Option<(&str, Vec<String>)> {
    let rest = strip_indent(line, depth)?;
    let (name, after) = split_word(rest)?;
    let brace = after.rfind('{')?;
    let attrs = after[..brace]
        .split(',')
        .map(|a| strip_quotes(a.trim()).to_string())
        .collect();
    Some((name, attrs))
}

/// `Key: value` at the given depth.
fn match_property(line: &str, depth: usize) -> Option<(&str, &str)> {
    let rest = strip_indent(line, depth)?;
    let (key, after) = split_word(rest)?;
    let mut chars = after.chars();
    if !chars.next()?.is_whitespace() {
        return None;
    }
    Some((key, strip_quotes(chars.as_str()).trim()))
}

fn is_node_close(line: &str, depth: usize) -> bool {
    strip_indent(line, depth).is_some_and(|rest| rest.starts_with('}'))
}

fn strip_quotes(s: &str) -> &str {
    let s = s.strip_prefix('"').unwrap_or(s);
    s.strip_suffix('"').unwrap_or(s)
}

/// `Model::Cube` -> `Cube`
fn strip_class_prefix(name: &str) -> &str {
    match name.find("::") {
        Some(pos) if pos > 0 && name[..pos].chars().all(is_word_char) => &name[pos + 2..],
        _ => name,
    }
}

fn replace_first_whitespace(s: &str) -> String {
    match s.find(char::is_whitespace) {
        Some(pos) => {
            let ws_len = s[pos..].chars().next().map_or(1, char::len_utf8);
            format!("{}_{}", &s[..pos], &s[pos + ws_len..])
        }
        None => s.to_string(),
    }
}

/// Leading integer of a string, `parseInt`-style.
fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}

/// `"OO",child,parent[,"label"]` with the outer quotes already stripped.
fn parse_connection(value: &str) -> Option<RawConnection> {
    let parts: Vec<&str> = value.split(',').collect();
    let child = parts.get(1)?.trim().parse().ok()?;
    let parent = parts.get(2)?.trim().parse().ok()?;
    let label = parts
        .get(3)
        .map(|l| l.trim().trim_start_matches('"').trim_end_matches('"').to_string())
        .unwrap_or_default();
    Some(RawConnection {
        child,
        parent,
        label,
    })
}
