//! Generic document tree shared by the binary and text parsers.
//!
//! Every record becomes a [`Node`]. Scalar children are folded into the parent's
//! `properties`, typed metadata (`P` records) become [`PropertyRecord`]s, and
//! repeated child names collect into a [`ChildGroup`] that keeps document order
//! and indexes numeric IDs on the side.

use std::borrow::Cow;
use std::collections::HashMap;

use fbx_math::Vec3;

/// Identifier carried by a record's first attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeId {
    Int(i64),
    Str(String),
    Anonymous,
}

impl NodeId {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            NodeId::Int(id) => Some(*id),
            _ => None,
        }
    }
}

/// A typed array payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Array {
    Bool(Vec<bool>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Array {
    pub fn len(&self) -> usize {
        match self {
            Array::Bool(v) => v.len(),
            Array::Int(v) => v.len(),
            Array::Long(v) => v.len(),
            Array::Float(v) => v.len(),
            Array::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View as doubles, borrowing when the storage already is `f64`.
    pub fn to_f64(&self) -> Cow<'_, [f64]> {
        match self {
            Array::Double(v) => Cow::Borrowed(v.as_slice()),
            Array::Float(v) => Cow::Owned(v.iter().map(|&x| x as f64).collect()),
            Array::Int(v) => Cow::Owned(v.iter().map(|&x| x as f64).collect()),
            Array::Long(v) => Cow::Owned(v.iter().map(|&x| x as f64).collect()),
            Array::Bool(v) => Cow::Owned(v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect()),
        }
    }

    /// View as integers, borrowing when the storage already is `i64`.
    pub fn to_i64(&self) -> Cow<'_, [i64]> {
        match self {
            Array::Long(v) => Cow::Borrowed(v.as_slice()),
            Array::Int(v) => Cow::Owned(v.iter().map(|&x| x as i64).collect()),
            Array::Float(v) => Cow::Owned(v.iter().map(|&x| x as i64).collect()),
            Array::Double(v) => Cow::Owned(v.iter().map(|&x| x as i64).collect()),
            Array::Bool(v) => Cow::Owned(v.iter().map(|&x| x as i64).collect()),
        }
    }
}

/// A raw property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Array),
}

impl Value {
    /// Numeric view. Numeric strings are accepted, as text files store most
    /// scalars unquoted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Array view as doubles. Comma-separated strings are parsed.
    pub fn as_f64_array(&self) -> Option<Cow<'_, [f64]>> {
        match self {
            Value::Array(a) => Some(a.to_f64()),
            Value::String(s) if s.contains(',') => Some(Cow::Owned(parse_number_list(s))),
            _ => None,
        }
    }

    /// Array view as integers.
    pub fn as_i64_array(&self) -> Option<Cow<'_, [i64]>> {
        match self {
            Value::Array(a) => Some(a.to_i64()),
            Value::String(s) if s.contains(',') => Some(Cow::Owned(
                parse_number_list(s).into_iter().map(|f| f as i64).collect(),
            )),
            _ => None,
        }
    }

    /// First three components of an array-like value.
    pub fn as_vec3(&self) -> Option<Vec3> {
        let values = self.as_f64_array()?;
        if values.len() < 3 {
            return None;
        }
        Some(Vec3::new(values[0] as f32, values[1] as f32, values[2] as f32))
    }
}

/// Parse a comma-separated list of numbers. Empty items are skipped and
/// unparsable ones become NaN.
pub fn parse_number_list(text: &str) -> Vec<f64> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(f64::NAN))
        .collect()
}

/// A typed metadata property from a `Properties70` block.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRecord {
    /// Primary type tag, e.g. `Lcl_Translation`, `double`, `KString`
    pub type_name: String,
    pub type2: String,
    pub flag: String,
    pub value: Value,
}

/// An entry in a node's property map.
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Plain(Value),
    Record(PropertyRecord),
}

impl Property {
    /// The underlying value, unwrapping typed records.
    pub fn value(&self) -> &Value {
        match self {
            Property::Plain(v) => v,
            Property::Record(r) => &r.value,
        }
    }
}

/// A `(child, parent, label)` triple from the `Connections` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawConnection {
    pub child: i64,
    pub parent: i64,
    pub label: String,
}

/// All children of one node that share a name.
///
/// Nodes are kept in document order; numeric IDs are indexed so lookups like
/// `Objects/Geometry[id]` stay O(1).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChildGroup {
    nodes: Vec<Node>,
    by_id: HashMap<i64, usize>,
}

impl ChildGroup {
    pub fn push(&mut self, node: Node) {
        if let NodeId::Int(id) = node.id {
            self.by_id.entry(id).or_insert(self.nodes.len());
        }
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn get(&self, id: i64) -> Option<&Node> {
        self.by_id.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }
}

impl<'a> IntoIterator for &'a ChildGroup {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// One record of the document tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub id: NodeId,
    pub attr_name: String,
    pub attr_type: String,
    pub properties: HashMap<String, Property>,
    pub children: HashMap<String, ChildGroup>,
    /// Only populated on the `Connections` section
    pub connections: Vec<RawConnection>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: NodeId::Anonymous,
            attr_name: String::new(),
            attr_type: String::new(),
            properties: HashMap::new(),
            children: HashMap::new(),
            connections: Vec::new(),
        }
    }

    /// Numeric object ID, if the record has one.
    pub fn object_id(&self) -> Option<i64> {
        self.id.as_int()
    }

    pub fn has(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Property value, unwrapping typed records.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).map(Property::value)
    }

    pub fn record(&self, key: &str) -> Option<&PropertyRecord> {
        match self.properties.get(key)? {
            Property::Record(r) => Some(r),
            Property::Plain(_) => None,
        }
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.value(key)?.as_f64()
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.value(key)?.as_i64()
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.value(key)?.as_str()
    }

    pub fn vec3(&self, key: &str) -> Option<Vec3> {
        self.value(key)?.as_vec3()
    }

    /// Array property of this node as doubles.
    pub fn array(&self, key: &str) -> Option<Cow<'_, [f64]>> {
        self.value(key)?.as_f64_array()
    }

    pub fn child_group(&self, name: &str) -> Option<&ChildGroup> {
        self.children.get(name)
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)?.first()
    }

    pub fn child_by_id(&self, name: &str, id: i64) -> Option<&Node> {
        self.children.get(name)?.get(id)
    }

    /// All children with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children
            .get(name)
            .into_iter()
            .flat_map(|group| group.iter())
    }

    /// The `a` payload of an array child such as `Vertices` or `KeyTime`.
    pub fn child_array(&self, name: &str) -> Option<Cow<'_, [f64]>> {
        self.child(name)?.array("a")
    }

    /// Integer view of an array child's `a` payload.
    pub fn child_int_array(&self, name: &str) -> Option<Cow<'_, [i64]>> {
        self.child(name)?.value("a")?.as_i64_array()
    }

    pub fn add_child(&mut self, child: Node) {
        self.children
            .entry(child.name.clone())
            .or_default()
            .push(child);
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), Property::Plain(value));
    }

    pub fn set_record(&mut self, key: impl Into<String>, record: PropertyRecord) {
        self.properties.insert(key.into(), Property::Record(record));
    }
}
