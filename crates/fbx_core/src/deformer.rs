//! Skin deformers and their per-bone clusters.

use std::collections::HashMap;

use fbx_math::{mat4_from_slice, Mat4};
use serde::Serialize;

use crate::connections::ConnectionGraph;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::{Node, Value};

/// One bone's binding record within a skin (an FBX "cluster").
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubDeformer {
    pub id: i64,

    /// Position among the skin's connection children; this is the bone index
    /// written into vertex skin attributes
    pub index: usize,

    /// Mesh vertex indices influenced by this bone
    pub indices: Vec<i64>,

    /// Weights parallel to `indices`
    pub weights: Vec<f64>,

    pub transform: Mat4,
    pub transform_link: Mat4,
    pub link_mode: Option<String>,
}

/// A `Skin` deformer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkinDeformer {
    pub id: i64,
    pub sub_deformers: Vec<SubDeformer>,

    /// Scene node of each bone, indexed by sub-deformer index. Filled during
    /// scene assembly.
    pub bones: Vec<Option<usize>>,
}

impl SkinDeformer {
    pub fn sub_deformer(&self, id: i64) -> Option<&SubDeformer> {
        self.sub_deformers.iter().find(|s| s.id == id)
    }

    /// Number of bone slots, one past the highest sub-deformer index.
    pub fn bone_count(&self) -> usize {
        self.sub_deformers
            .iter()
            .map(|s| s.index + 1)
            .max()
            .unwrap_or(0)
    }
}

/// All skin deformers of a document, in document order.
#[derive(Clone, Debug, Default)]
pub struct Deformers {
    skins: Vec<SkinDeformer>,
    by_id: HashMap<i64, usize>,
}

impl Deformers {
    pub fn get(&self, id: i64) -> Option<&SkinDeformer> {
        self.by_id.get(&id).map(|&i| &self.skins[i])
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut SkinDeformer> {
        self.by_id.get(&id).map(|&i| &mut self.skins[i])
    }

    pub fn contains(&self, id: i64) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SkinDeformer> {
        self.skins.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, SkinDeformer> {
        self.skins.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.skins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skins.is_empty()
    }
}

fn matrix_child(cluster: &Node, name: &str, diagnostics: &mut Diagnostics) -> Mat4 {
    match cluster.child_array(name).and_then(|a| mat4_from_slice(&a)) {
        Some(m) => m,
        None => {
            diagnostics.warn(
                DiagnosticKind::Reference,
                format!(
                    "Cluster {:?} has no usable {} matrix, using identity",
                    cluster.id, name
                ),
            );
            Mat4::IDENTITY
        }
    }
}

fn link_mode(cluster: &Node) -> Option<String> {
    match cluster.value("Mode")? {
        Value::String(s) => Some(s.clone()),
        other => other.as_i64().map(|m| m.to_string()),
    }
}

fn parse_sub_deformer(
    cluster: &Node,
    id: i64,
    index: usize,
    diagnostics: &mut Diagnostics,
) -> SubDeformer {
    let (indices, weights) = match cluster.child_int_array("Indexes") {
        Some(indices) => (
            indices.into_owned(),
            cluster
                .child_array("Weights")
                .map(|w| w.into_owned())
                .unwrap_or_default(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    SubDeformer {
        id,
        index,
        indices,
        weights,
        transform: matrix_child(cluster, "Transform", diagnostics),
        transform_link: matrix_child(cluster, "TransformLink", diagnostics),
        link_mode: link_mode(cluster),
    }
}

/// Extract every `Skin` deformer and its clusters.
///
/// Each connection child of a skin is one cluster; its position in the child
/// list becomes its bone index.
pub fn parse_deformers(
    objects: &Node,
    graph: &ConnectionGraph,
    diagnostics: &mut Diagnostics,
) -> Deformers {
    let mut deformers = Deformers::default();
    let Some(group) = objects.child_group("Deformer") else {
        return deformers;
    };

    for node in group.iter().filter(|n| n.attr_type == "Skin") {
        let Some(id) = node.object_id() else {
            continue;
        };

        let mut sub_deformers = Vec::new();
        for (index, child) in graph.children(id).iter().enumerate() {
            let Some(cluster) = group.get(child.id) else {
                diagnostics.warn(
                    DiagnosticKind::Reference,
                    format!("Skin {} child {} is not a deformer", id, child.id),
                );
                continue;
            };
            sub_deformers.push(parse_sub_deformer(cluster, child.id, index, diagnostics));
        }

        log::debug!("Skin {} has {} clusters", id, sub_deformers.len());
        deformers.by_id.insert(id, deformers.skins.len());
        deformers.skins.push(SkinDeformer {
            id,
            sub_deformers,
            bones: Vec::new(),
        });
    }

    deformers
}
