//! Geometry builder.
//!
//! Turns `Geometry` objects into flat, triangle-only vertex buffers. Mesh
//! geometries are fan-triangulated with every layer element resolved per
//! emitted vertex; NURBS curves are sampled to polylines.

pub mod attribute;
pub mod nurbs;
pub mod polygon;

use std::collections::HashMap;
use std::ops::Range;

use fbx_math::{Vec2, Vec3};
use serde::Serialize;

use crate::connections::ConnectionGraph;
use crate::deformer::{Deformers, SkinDeformer};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::Node;

use attribute::{AttributeInfo, MappingMode};
use polygon::{FaceSources, WeightTable};

pub use polygon::{cap_influences, fan_triangles, MAX_INFLUENCES};

/// Primitive layout of a geometry's positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GeometryKind {
    /// Every three positions form a triangle
    Mesh,
    /// Positions form one connected polyline
    Line,
}

/// A named UV set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UvChannel {
    /// `uv`, `uv2`, `uv3`, ...
    pub name: String,
    pub values: Vec<Vec2>,
}

/// Four bone influences per vertex.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SkinAttributes {
    pub indices: Vec<[u32; 4]>,
    pub weights: Vec<[f32; 4]>,
}

/// A contiguous run of triangles sharing one material slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MaterialGroup {
    /// First triangle
    pub start: usize,
    /// Number of triangles
    pub count: usize,
    pub material_index: usize,
}

impl MaterialGroup {
    /// The group's range in vertex units.
    pub fn vertex_range(&self) -> Range<usize> {
        self.start * 3..(self.start + self.count) * 3
    }
}

/// Flat vertex buffers for one geometry object.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Geometry {
    pub id: i64,
    pub name: String,
    pub kind: GeometryKind,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub colors: Option<Vec<Vec3>>,
    pub uvs: Vec<UvChannel>,
    pub skin: Option<SkinAttributes>,
    pub groups: Vec<MaterialGroup>,

    /// ID of the skin deformer bound to this geometry
    pub deformer: Option<i64>,
}

impl Geometry {
    pub fn empty(id: i64, name: String, kind: GeometryKind) -> Self {
        Self {
            id,
            name,
            kind,
            positions: Vec::new(),
            normals: None,
            colors: None,
            uvs: Vec::new(),
            skin: None,
            groups: Vec::new(),
            deformer: None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles; zero for lines.
    pub fn triangle_count(&self) -> usize {
        match self.kind {
            GeometryKind::Mesh => self.positions.len() / 3,
            GeometryKind::Line => 0,
        }
    }

    pub fn has_colors(&self) -> bool {
        self.colors.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn is_skinned(&self) -> bool {
        self.skin.is_some()
    }

    /// Offset every position.
    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            *p += offset;
        }
    }
}

/// Contiguous same-material triangle runs from a per-triangle material buffer.
pub fn material_groups(triangle_materials: &[f64]) -> Vec<MaterialGroup> {
    let mut groups = Vec::new();
    let Some(&first) = triangle_materials.first() else {
        return groups;
    };

    let mut current = first;
    let mut start = 0;
    for (i, &material) in triangle_materials.iter().enumerate() {
        if material != current {
            groups.push(MaterialGroup {
                start,
                count: i - start,
                material_index: material_slot(current),
            });
            current = material;
            start = i;
        }
    }
    groups.push(MaterialGroup {
        start,
        count: triangle_materials.len() - start,
        material_index: material_slot(current),
    });
    groups
}

fn material_slot(value: f64) -> usize {
    if value.is_finite() && value > 0.0 {
        value as usize
    } else {
        0
    }
}

fn weight_table(skin: &SkinDeformer) -> WeightTable {
    let mut table = WeightTable::new();
    for sub in &skin.sub_deformers {
        for (j, &vertex) in sub.indices.iter().enumerate() {
            let weight = sub.weights.get(j).copied().unwrap_or(0.0);
            table
                .entry(vertex)
                .or_default()
                .push((sub.index as u32, weight as f32));
        }
    }
    table
}

/// First layer element of a kind, in document order.
fn first_layer<'a>(node: &'a Node, name: &str) -> Option<&'a Node> {
    node.child(name)
}

/// Build a mesh geometry, optionally bound to a skin.
pub fn build_mesh(
    node: &Node,
    id: i64,
    skin: Option<&SkinDeformer>,
    diagnostics: &mut Diagnostics,
) -> Geometry {
    let mut geometry = Geometry::empty(id, node.attr_name.clone(), GeometryKind::Mesh);

    let Some(vertices) = node.child_array("Vertices") else {
        diagnostics.warn(
            DiagnosticKind::Reference,
            format!("Mesh geometry {} has no Vertices", id),
        );
        return geometry;
    };
    let Some(polygon_vertex_index) = node.child_int_array("PolygonVertexIndex") else {
        diagnostics.warn(
            DiagnosticKind::Reference,
            format!("Mesh geometry {} has no PolygonVertexIndex", id),
        );
        return geometry;
    };

    let colors = first_layer(node, "LayerElementColor")
        .and_then(|layer| attribute::colors(layer, diagnostics));
    let materials = first_layer(node, "LayerElementMaterial")
        .and_then(|layer| attribute::materials(layer, diagnostics));
    let normals = first_layer(node, "LayerElementNormal")
        .and_then(|layer| attribute::normals(layer, diagnostics));
    let uvs: Vec<AttributeInfo> = node
        .children_named("LayerElementUV")
        .filter_map(|layer| attribute::uvs(layer, diagnostics))
        .collect();
    let weights = skin.map(weight_table);

    let per_triangle_materials = materials
        .as_ref()
        .filter(|m| m.mapping != MappingMode::AllSame);

    let sources = FaceSources {
        normals: normals.as_ref(),
        colors: colors.as_ref(),
        uvs: &uvs,
        weights: weights.as_ref(),
    };
    let buffers = polygon::triangulate(&polygon_vertex_index, &sources, per_triangle_materials);

    if buffers.truncated_influences {
        diagnostics.warn(
            DiagnosticKind::Skinning,
            format!(
                "Geometry {} has vertices with more than {} skinning weights, keeping the largest",
                id, MAX_INFLUENCES
            ),
        );
    }

    let mut dangling = 0usize;
    geometry.positions = buffers
        .vertices
        .iter()
        .map(|&v| {
            let base = v.saturating_mul(3);
            match vertices.get(base..base.saturating_add(3)) {
                Some(p) => Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32),
                None => {
                    dangling += 1;
                    Vec3::ZERO
                }
            }
        })
        .collect();
    if dangling > 0 {
        diagnostics.warn(
            DiagnosticKind::Reference,
            format!(
                "Geometry {} references {} vertices past the end of Vertices",
                id, dangling
            ),
        );
    }

    if normals.is_some() {
        geometry.normals = Some(buffers.normals);
    }
    if colors.is_some() {
        geometry.colors = Some(buffers.colors);
    }
    geometry.uvs = buffers
        .uvs
        .into_iter()
        .enumerate()
        .map(|(i, values)| UvChannel {
            name: if i == 0 {
                "uv".to_string()
            } else {
                format!("uv{}", i + 1)
            },
            values,
        })
        .collect();

    if let Some(skin) = skin {
        geometry.skin = buffers.skin;
        geometry.deformer = Some(skin.id);
    }

    match &materials {
        Some(m) if m.mapping == MappingMode::AllSame => {
            let mut slot = [0.0f32];
            m.fetch(0, 0, 0, &mut slot);
            geometry.groups.push(MaterialGroup {
                start: 0,
                count: geometry.triangle_count(),
                material_index: material_slot(slot[0] as f64),
            });
        }
        Some(_) => geometry.groups = material_groups(&buffers.triangle_materials),
        None => {}
    }

    geometry
}

/// Build every geometry object.
///
/// A mesh binds to the first skin deformer among its connection children.
/// Returns the geometry table and an object ID → table index map.
pub fn build_geometries(
    objects: &Node,
    graph: &ConnectionGraph,
    deformers: &Deformers,
    diagnostics: &mut Diagnostics,
) -> (Vec<Geometry>, HashMap<i64, usize>) {
    let mut geometries = Vec::new();
    let mut index = HashMap::new();

    for node in objects.children_named("Geometry") {
        let Some(id) = node.object_id() else {
            continue;
        };
        let geometry = match node.attr_type.as_str() {
            "Mesh" => {
                let skin = graph
                    .children(id)
                    .iter()
                    .find_map(|child| deformers.get(child.id));
                build_mesh(node, id, skin, diagnostics)
            }
            "NurbsCurve" => nurbs::build_curve(node, id, diagnostics),
            other => {
                diagnostics.warn(
                    DiagnosticKind::Schema,
                    format!("Geometry {} has unsupported type {:?}", id, other),
                );
                continue;
            }
        };
        log::debug!(
            "Geometry {} ({:?}): {} vertices",
            id,
            geometry.kind,
            geometry.vertex_count()
        );
        index.insert(id, geometries.len());
        geometries.push(geometry);
    }

    (geometries, index)
}
