//! Test-only binary FBX writer.

#![allow(dead_code)]

pub const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";
const FOOTER_LEN: usize = 160 + 16;

/// A typed property value.
#[derive(Clone, Debug)]
pub enum Prop {
    Int(i32),
    Long(i64),
    Double(f64),
    Str(String),
    Doubles(Vec<f64>),
    Ints(Vec<i32>),
    Longs(Vec<i64>),
    /// `i` array stored zlib-compressed
    PackedInts(Vec<i32>),
    /// `d` array stored zlib-compressed
    PackedDoubles(Vec<f64>),
}

impl Prop {
    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Prop::Int(v) => {
                out.push(b'I');
                out.extend_from_slice(&v.to_le_bytes());
            }
            Prop::Long(v) => {
                out.push(b'L');
                out.extend_from_slice(&v.to_le_bytes());
            }
            Prop::Double(v) => {
                out.push(b'D');
                out.extend_from_slice(&v.to_le_bytes());
            }
            Prop::Str(s) => {
                out.push(b'S');
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Prop::Doubles(values) => {
                let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                write_array(out, b'd', values.len(), &raw, false);
            }
            Prop::Ints(values) => {
                let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                write_array(out, b'i', values.len(), &raw, false);
            }
            Prop::Longs(values) => {
                let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                write_array(out, b'l', values.len(), &raw, false);
            }
            Prop::PackedInts(values) => {
                let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                write_array(out, b'i', values.len(), &raw, true);
            }
            Prop::PackedDoubles(values) => {
                let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                write_array(out, b'd', values.len(), &raw, true);
            }
        }
    }
}

fn write_array(out: &mut Vec<u8>, code: u8, len: usize, raw: &[u8], packed: bool) {
    out.push(code);
    out.extend_from_slice(&(len as u32).to_le_bytes());
    if packed {
        let compressed = deflate(raw);
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&compressed);
    } else {
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
        out.extend_from_slice(raw);
    }
}

#[cfg(feature = "deflate")]
fn deflate(raw: &[u8]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).unwrap();
    encoder.finish().unwrap()
}

/// Without the codec the payload is never inflated, so any bytes will do.
#[cfg(not(feature = "deflate"))]
fn deflate(raw: &[u8]) -> Vec<u8> {
    raw.to_vec()
}

/// One record with its properties and children.
#[derive(Clone, Debug)]
pub struct Record {
    pub name: String,
    pub props: Vec<Prop>,
    pub children: Vec<Record>,
}

impl Record {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            props: Vec::new(),
            children: Vec::new(),
        }
    }

    /// An object record: `Name: id, "name\0\1Class", "type"`.
    pub fn object(name: &str, id: i64, attr_name: &str, attr_type: &str) -> Self {
        Self::new(name)
            .prop(Prop::Long(id))
            .prop(Prop::Str(format!("{}\u{0}\u{1}{}", attr_name, name)))
            .prop(Prop::Str(attr_type.to_string()))
    }

    pub fn prop(mut self, prop: Prop) -> Self {
        self.props.push(prop);
        self
    }

    pub fn child(mut self, child: Record) -> Self {
        self.children.push(child);
        self
    }

    /// Child holding a single property, e.g. `Vertices: [..]` or `Version: 232`.
    pub fn with(self, name: &str, prop: Prop) -> Self {
        self.child(Record::new(name).prop(prop))
    }

    /// A `Properties70` child with the given `P` records.
    pub fn properties(self, records: Vec<Record>) -> Self {
        let mut container = Record::new("Properties70");
        container.children = records;
        self.child(container)
    }

    fn write(&self, out: &mut Vec<u8>, wide: bool) {
        let field = if wide { 8 } else { 4 };
        let start = out.len();
        out.extend(std::iter::repeat(0).take(field * 3));
        out.push(self.name.len() as u8);
        out.extend_from_slice(self.name.as_bytes());

        let props_start = out.len();
        for p in &self.props {
            p.write(out);
        }
        let props_len = out.len() - props_start;

        if !self.children.is_empty() {
            for c in &self.children {
                c.write(out, wide);
            }
            out.extend(std::iter::repeat(0).take(field * 3 + 1));
        }

        let end = out.len();
        let header = [end, self.props.len(), props_len];
        for (i, value) in header.iter().enumerate() {
            let at = start + i * field;
            if wide {
                out[at..at + 8].copy_from_slice(&(*value as u64).to_le_bytes());
            } else {
                out[at..at + 4].copy_from_slice(&(*value as u32).to_le_bytes());
            }
        }
    }
}

/// `P: name, type, "", flag, x, y, z`
pub fn p_vector(name: &str, type_name: &str, v: [f64; 3]) -> Record {
    Record::new("P")
        .prop(Prop::Str(name.to_string()))
        .prop(Prop::Str(type_name.to_string()))
        .prop(Prop::Str(String::new()))
        .prop(Prop::Str("A".to_string()))
        .prop(Prop::Double(v[0]))
        .prop(Prop::Double(v[1]))
        .prop(Prop::Double(v[2]))
}

pub fn p_number(name: &str, value: f64) -> Record {
    Record::new("P")
        .prop(Prop::Str(name.to_string()))
        .prop(Prop::Str("Number".to_string()))
        .prop(Prop::Str(String::new()))
        .prop(Prop::Str("A".to_string()))
        .prop(Prop::Double(value))
}

pub fn p_int(name: &str, value: i32) -> Record {
    Record::new("P")
        .prop(Prop::Str(name.to_string()))
        .prop(Prop::Str("int".to_string()))
        .prop(Prop::Str("Integer".to_string()))
        .prop(Prop::Str(String::new()))
        .prop(Prop::Int(value))
}

/// `C: "OO"|"OP", child, parent[, label]`
pub fn connection(child: i64, parent: i64, label: &str) -> Record {
    let mut c = Record::new("C")
        .prop(Prop::Str(if label.is_empty() { "OO" } else { "OP" }.to_string()))
        .prop(Prop::Long(child))
        .prop(Prop::Long(parent));
    if !label.is_empty() {
        c = c.prop(Prop::Str(label.to_string()));
    }
    c
}

/// Builder for a whole document.
#[derive(Clone, Debug)]
pub struct DocumentBuilder {
    pub version: u32,
    pub objects: Vec<Record>,
    pub connections: Vec<Record>,
    pub extra: Vec<Record>,
}

impl DocumentBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            objects: Vec::new(),
            connections: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn object(mut self, record: Record) -> Self {
        self.objects.push(record);
        self
    }

    pub fn connect(mut self, child: i64, parent: i64, label: &str) -> Self {
        self.connections.push(connection(child, parent, label));
        self
    }

    /// Another top-level section, such as `GlobalSettings`.
    pub fn section(mut self, record: Record) -> Self {
        self.extra.push(record);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let wide = self.version >= 7500;
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[0x1a, 0x00]);
        out.extend_from_slice(&self.version.to_le_bytes());

        for section in &self.extra {
            section.write(&mut out, wide);
        }
        let mut objects = Record::new("Objects");
        objects.children = self.objects.clone();
        objects.write(&mut out, wide);
        let mut connections = Record::new("Connections");
        connections.children = self.connections.clone();
        connections.write(&mut out, wide);

        let field = if wide { 8 } else { 4 };
        out.extend(std::iter::repeat(0).take(field * 3 + 1));
        out.extend(std::iter::repeat(0).take(FOOTER_LEN));
        out
    }
}

/// A `Model` object with a local translation.
pub fn model(id: i64, name: &str, kind: &str, translation: [f64; 3]) -> Record {
    Record::object("Model", id, name, kind)
        .with("Version", Prop::Int(232))
        .properties(vec![p_vector("Lcl Translation", "Lcl Translation", translation)])
}

/// A mesh geometry from control points and a polygon-vertex index stream.
pub fn mesh_geometry(id: i64, vertices: &[f64], polygon_vertex_index: &[i32]) -> Record {
    Record::object("Geometry", id, "", "Mesh")
        .with("Vertices", Prop::Doubles(vertices.to_vec()))
        .with("PolygonVertexIndex", Prop::Ints(polygon_vertex_index.to_vec()))
}

/// A unit quad in the XY plane.
pub const QUAD: [f64; 12] = [
    0.0, 0.0, 0.0, //
    1.0, 0.0, 0.0, //
    1.0, 1.0, 0.0, //
    0.0, 1.0, 0.0,
];

pub fn identity_matrix() -> Vec<f64> {
    let mut m = vec![0.0; 16];
    for i in 0..4 {
        m[i * 5] = 1.0;
    }
    m
}

pub fn translation_matrix(x: f64, y: f64, z: f64) -> Vec<f64> {
    let mut m = identity_matrix();
    m[12] = x;
    m[13] = y;
    m[14] = z;
    m
}
