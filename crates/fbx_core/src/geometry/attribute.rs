//! Layer element addressing.
//!
//! Each `LayerElement*` block stores a flat buffer plus optional indices, and
//! says how a polygon-vertex occurrence maps into that buffer. The mapping and
//! reference modes are resolved once into enums and dispatched with `match`.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::Node;

/// What a layer element's values are attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingMode {
    ByPolygonVertex,
    ByPolygon,
    /// One value per control point (`ByVertice` in files)
    ByVertex,
    /// One value for the whole mesh
    AllSame,
}

impl MappingMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ByPolygonVertex" => Some(MappingMode::ByPolygonVertex),
            "ByPolygon" => Some(MappingMode::ByPolygon),
            "ByVertice" | "ByVertex" | "ByControlPoint" => Some(MappingMode::ByVertex),
            "AllSame" => Some(MappingMode::AllSame),
            _ => None,
        }
    }
}

/// Whether values are addressed directly or through an index array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceMode {
    Direct,
    IndexToDirect,
}

impl ReferenceMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Direct" => Some(ReferenceMode::Direct),
            // Older exporters write `Index`, which behaves like IndexToDirect
            "IndexToDirect" | "Index" => Some(ReferenceMode::IndexToDirect),
            _ => None,
        }
    }
}

/// A resolved layer element.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeInfo {
    /// Scalars per element (3 for normals, 2 for UVs, 4 for colors)
    pub element_size: usize,
    pub buffer: Vec<f64>,
    pub indices: Vec<i64>,
    pub mapping: MappingMode,
    pub reference: ReferenceMode,
}

impl AttributeInfo {
    /// Copy one element for the given occurrence into `out`.
    ///
    /// `out` receives at most `element_size` scalars; reads past the end of the
    /// buffer or through a dangling index yield zeros.
    pub fn fetch(&self, polygon_vertex: usize, polygon: usize, vertex: usize, out: &mut [f32]) {
        let element = match (self.mapping, self.reference) {
            (MappingMode::ByPolygonVertex, ReferenceMode::Direct) => Some(polygon_vertex),
            (MappingMode::ByPolygonVertex, ReferenceMode::IndexToDirect) => {
                self.index_at(polygon_vertex)
            }
            (MappingMode::ByPolygon, ReferenceMode::Direct) => Some(polygon),
            (MappingMode::ByPolygon, ReferenceMode::IndexToDirect) => self.index_at(polygon),
            (MappingMode::ByVertex, _) => Some(vertex),
            (MappingMode::AllSame, ReferenceMode::IndexToDirect) => self.index_at(0),
            (MappingMode::AllSame, ReferenceMode::Direct) => Some(0),
        };

        let from = element.map(|e| e * self.element_size);
        for (i, slot) in out.iter_mut().take(self.element_size).enumerate() {
            *slot = from
                .and_then(|f| self.buffer.get(f + i))
                .map(|&v| v as f32)
                .unwrap_or(0.0);
        }
    }

    fn index_at(&self, position: usize) -> Option<usize> {
        self.indices
            .get(position)
            .and_then(|&i| usize::try_from(i).ok())
    }
}

/// Read the mapping/reference header of a layer element.
fn modes(
    layer: &Node,
    what: &str,
    diagnostics: &mut Diagnostics,
) -> Option<(MappingMode, ReferenceMode)> {
    let mapping_name = layer.str("MappingInformationType").unwrap_or_default();
    let reference_name = layer.str("ReferenceInformationType").unwrap_or_default();
    let mapping = MappingMode::parse(mapping_name);
    let reference = ReferenceMode::parse(reference_name);
    match (mapping, reference) {
        (Some(m), Some(r)) => Some((m, r)),
        _ => {
            diagnostics.warn(
                DiagnosticKind::Schema,
                format!(
                    "Unsupported {} mapping {:?}/{:?}, attribute dropped",
                    what, mapping_name, reference_name
                ),
            );
            None
        }
    }
}

/// Build an attribute from a layer element's `values` child and the first
/// present index child.
fn layer_attribute(
    layer: &Node,
    what: &str,
    element_size: usize,
    values: &str,
    index_names: &[&str],
    diagnostics: &mut Diagnostics,
) -> Option<AttributeInfo> {
    let (mapping, reference) = modes(layer, what, diagnostics)?;
    let Some(buffer) = layer.child_array(values) else {
        diagnostics.warn(
            DiagnosticKind::Reference,
            format!("{} layer has no {} array, attribute dropped", what, values),
        );
        return None;
    };

    let indices = if reference == ReferenceMode::IndexToDirect {
        index_names
            .iter()
            .find_map(|name| layer.child_int_array(name))
            .map(|a| a.into_owned())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Some(AttributeInfo {
        element_size,
        buffer: buffer.into_owned(),
        indices,
        mapping,
        reference,
    })
}

pub fn normals(layer: &Node, diagnostics: &mut Diagnostics) -> Option<AttributeInfo> {
    layer_attribute(
        layer,
        "normal",
        3,
        "Normals",
        &["NormalIndex", "NormalsIndex"],
        diagnostics,
    )
}

pub fn uvs(layer: &Node, diagnostics: &mut Diagnostics) -> Option<AttributeInfo> {
    layer_attribute(layer, "uv", 2, "UV", &["UVIndex"], diagnostics)
}

/// Colors are stored as RGBA; only RGB is emitted.
pub fn colors(layer: &Node, diagnostics: &mut Diagnostics) -> Option<AttributeInfo> {
    layer_attribute(layer, "color", 4, "Colors", &["ColorIndex"], diagnostics)
}

/// Material indices. `NoMappingInformation` means one material for the whole
/// mesh; otherwise the `Materials` array is addressed through an identity
/// index list.
pub fn materials(layer: &Node, diagnostics: &mut Diagnostics) -> Option<AttributeInfo> {
    let mapping_name = layer.str("MappingInformationType").unwrap_or_default();
    if mapping_name == "NoMappingInformation" {
        return Some(AttributeInfo {
            element_size: 1,
            buffer: vec![0.0],
            indices: vec![0],
            mapping: MappingMode::AllSame,
            reference: ReferenceMode::IndexToDirect,
        });
    }

    let (mapping, reference) = modes(layer, "material", diagnostics)?;
    let Some(buffer) = layer.child_array("Materials") else {
        diagnostics.warn(
            DiagnosticKind::Reference,
            "material layer has no Materials array, attribute dropped",
        );
        return None;
    };
    let indices = (0..buffer.len() as i64).collect();

    Some(AttributeInfo {
        element_size: 1,
        buffer: buffer.into_owned(),
        indices,
        mapping,
        reference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Array, Value};

    fn info(mapping: MappingMode, reference: ReferenceMode, indices: Vec<i64>) -> AttributeInfo {
        AttributeInfo {
            element_size: 2,
            buffer: vec![0.0, 1.0, 10.0, 11.0, 20.0, 21.0],
            indices,
            mapping,
            reference,
        }
    }

    fn fetch(info: &AttributeInfo, pv: usize, p: usize, v: usize) -> [f32; 2] {
        let mut out = [f32::NAN; 2];
        info.fetch(pv, p, v, &mut out);
        out
    }

    #[test]
    fn test_all_addressing_modes() {
        use MappingMode::*;
        use ReferenceMode::*;

        assert_eq!(fetch(&info(ByPolygonVertex, Direct, vec![]), 1, 0, 0), [10.0, 11.0]);
        assert_eq!(
            fetch(&info(ByPolygonVertex, IndexToDirect, vec![2, 0]), 0, 1, 1),
            [20.0, 21.0]
        );
        assert_eq!(fetch(&info(ByPolygon, Direct, vec![]), 0, 2, 0), [20.0, 21.0]);
        assert_eq!(
            fetch(&info(ByPolygon, IndexToDirect, vec![1, 0]), 2, 0, 2),
            [10.0, 11.0]
        );
        assert_eq!(fetch(&info(ByVertex, Direct, vec![]), 0, 0, 1), [10.0, 11.0]);
        assert_eq!(fetch(&info(ByVertex, IndexToDirect, vec![2]), 0, 0, 1), [10.0, 11.0]);
        assert_eq!(fetch(&info(AllSame, IndexToDirect, vec![1]), 5, 3, 2), [10.0, 11.0]);
        assert_eq!(fetch(&info(AllSame, Direct, vec![]), 5, 3, 2), [0.0, 1.0]);
    }

    #[test]
    fn test_out_of_range_reads_zero() {
        let attr = info(MappingMode::ByPolygonVertex, ReferenceMode::IndexToDirect, vec![-1, 7]);
        assert_eq!(fetch(&attr, 0, 0, 0), [0.0, 0.0]);
        assert_eq!(fetch(&attr, 1, 0, 0), [0.0, 0.0]);
        assert_eq!(fetch(&attr, 9, 0, 0), [0.0, 0.0]);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(MappingMode::parse("ByVertice"), Some(MappingMode::ByVertex));
        assert_eq!(MappingMode::parse("ByEdge"), None);
        assert_eq!(ReferenceMode::parse("Index"), Some(ReferenceMode::IndexToDirect));
    }

    fn layer(mapping: &str, reference: &str) -> Node {
        let mut n = Node::new("LayerElementNormal");
        n.set_property("MappingInformationType", Value::String(mapping.into()));
        n.set_property("ReferenceInformationType", Value::String(reference.into()));
        n
    }

    fn array_child(name: &str, values: Array) -> Node {
        let mut n = Node::new(name);
        n.set_property("a", Value::Array(values));
        n
    }

    #[test]
    fn test_normals_fallback_index_name() {
        let mut n = layer("ByPolygonVertex", "IndexToDirect");
        n.add_child(array_child("Normals", Array::Double(vec![0.0, 0.0, 1.0])));
        n.add_child(array_child("NormalsIndex", Array::Int(vec![0, 0, 0])));
        let mut diags = Diagnostics::new();
        let attr = normals(&n, &mut diags).unwrap();
        assert_eq!(attr.indices, vec![0, 0, 0]);
        assert_eq!(attr.element_size, 3);
    }

    #[test]
    fn test_unknown_mode_drops_attribute() {
        let mut n = layer("ByEdge", "Direct");
        n.add_child(array_child("Normals", Array::Double(vec![0.0; 3])));
        let mut diags = Diagnostics::new();
        assert!(normals(&n, &mut diags).is_none());
        assert_eq!(diags.count(DiagnosticKind::Schema), 1);
    }

    #[test]
    fn test_material_layers() {
        let mut diags = Diagnostics::new();
        let all = materials(&layer("NoMappingInformation", ""), &mut diags).unwrap();
        assert_eq!(all.mapping, MappingMode::AllSame);

        let mut per_poly = layer("ByPolygon", "IndexToDirect");
        per_poly.add_child(array_child("Materials", Array::Int(vec![0, 1, 1])));
        let attr = materials(&per_poly, &mut diags).unwrap();
        assert_eq!(attr.indices, vec![0, 1, 2]);
        let mut out = [0.0f32];
        attr.fetch(7, 2, 0, &mut out);
        assert_eq!(out, [1.0]);
        assert!(diags.is_empty());
    }
}
