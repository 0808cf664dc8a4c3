//! Polygon streaming, fan triangulation and skin influence capping.

use std::collections::HashMap;

use fbx_math::{Vec2, Vec3};

use super::attribute::AttributeInfo;
use super::SkinAttributes;

/// Maximum bone influences kept per vertex.
pub const MAX_INFLUENCES: usize = 4;

/// Corner triples `(0, i - 1, i)` of the fan over a polygon with `corners`
/// vertices. Yields `corners - 2` triangles, none for fewer than three.
pub fn fan_triangles(corners: usize) -> impl Iterator<Item = [usize; 3]> {
    (2..corners.max(2)).map(|i| [0, i - 1, i])
}

/// Keep at most four influences per vertex.
///
/// With four or fewer, the influences keep their order and are padded with
/// `(0, 0.0)`. With more, each influence is pushed through a four-slot
/// accumulator that only displaces on a strictly greater weight, so the four
/// largest survive and equal weights keep the one seen first. Returns whether
/// anything was dropped.
pub fn cap_influences(influences: &[(u32, f32)]) -> ([u32; 4], [f32; 4], bool) {
    let mut indices = [0u32; MAX_INFLUENCES];
    let mut weights = [0.0f32; MAX_INFLUENCES];

    if influences.len() <= MAX_INFLUENCES {
        for (slot, &(bone, weight)) in influences.iter().enumerate() {
            indices[slot] = bone;
            weights[slot] = weight;
        }
        return (indices, weights, false);
    }

    for &(bone, weight) in influences {
        let mut current_bone = bone;
        let mut current_weight = weight;
        for slot in 0..MAX_INFLUENCES {
            if current_weight > weights[slot] {
                std::mem::swap(&mut weights[slot], &mut current_weight);
                std::mem::swap(&mut indices[slot], &mut current_bone);
            }
        }
    }
    (indices, weights, true)
}

/// `vertex index -> [(bone index, weight)]` over every cluster of a skin.
pub type WeightTable = HashMap<i64, Vec<(u32, f32)>>;

/// Attribute sources enabled for one geometry.
pub(crate) struct FaceSources<'a> {
    pub normals: Option<&'a AttributeInfo>,
    pub colors: Option<&'a AttributeInfo>,
    pub uvs: &'a [AttributeInfo],
    pub weights: Option<&'a WeightTable>,
}

/// Per-vertex data gathered for the current face.
#[derive(Default)]
struct FaceBuffer {
    vertices: Vec<usize>,
    normals: Vec<Vec3>,
    colors: Vec<Vec3>,
    /// One list per UV channel
    uvs: Vec<Vec<Vec2>>,
    skin_indices: Vec<[u32; 4]>,
    skin_weights: Vec<[f32; 4]>,
}

impl FaceBuffer {
    fn clear(&mut self) {
        self.vertices.clear();
        self.normals.clear();
        self.colors.clear();
        for channel in &mut self.uvs {
            channel.clear();
        }
        self.skin_indices.clear();
        self.skin_weights.clear();
    }
}

/// Flat triangle buffers produced by [`triangulate`].
#[derive(Debug, Default)]
pub(crate) struct TriangleBuffers {
    /// Control point index of every emitted vertex
    pub vertices: Vec<usize>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub uvs: Vec<Vec<Vec2>>,
    pub skin: Option<SkinAttributes>,
    /// Material index of every emitted triangle
    pub triangle_materials: Vec<f64>,
    /// At least one vertex lost influences beyond four
    pub truncated_influences: bool,
}

/// Stream a `PolygonVertexIndex` array into fan-triangulated buffers.
///
/// A negative entry closes the current face and stores the bitwise complement
/// of the vertex index. `materials`, when given, is sampled once per face at
/// its closing vertex.
pub(crate) fn triangulate(
    polygon_vertex_index: &[i64],
    sources: &FaceSources<'_>,
    materials: Option<&AttributeInfo>,
) -> TriangleBuffers {
    let mut out = TriangleBuffers {
        uvs: vec![Vec::new(); sources.uvs.len()],
        skin: sources.weights.map(|_| SkinAttributes::default()),
        ..Default::default()
    };
    let mut face = FaceBuffer {
        uvs: vec![Vec::new(); sources.uvs.len()],
        ..Default::default()
    };
    let mut scratch = [0.0f32; 4];
    let mut polygon = 0usize;

    for (polygon_vertex, &raw) in polygon_vertex_index.iter().enumerate() {
        let end_of_face = raw < 0;
        let vertex = (if end_of_face { !raw } else { raw }) as usize;

        face.vertices.push(vertex);

        if let Some(colors) = sources.colors {
            colors.fetch(polygon_vertex, polygon, vertex, &mut scratch);
            face.colors.push(Vec3::new(scratch[0], scratch[1], scratch[2]));
        }

        if let Some(table) = sources.weights {
            let influences = table.get(&(vertex as i64)).map(Vec::as_slice).unwrap_or(&[]);
            let (indices, weights, truncated) = cap_influences(influences);
            out.truncated_influences |= truncated;
            face.skin_indices.push(indices);
            face.skin_weights.push(weights);
        }

        if let Some(normals) = sources.normals {
            normals.fetch(polygon_vertex, polygon, vertex, &mut scratch);
            face.normals.push(Vec3::new(scratch[0], scratch[1], scratch[2]));
        }

        for (channel, uv) in sources.uvs.iter().enumerate() {
            uv.fetch(polygon_vertex, polygon, vertex, &mut scratch);
            face.uvs[channel].push(Vec2::new(scratch[0], scratch[1]));
        }

        if !end_of_face {
            continue;
        }

        let corners = face.vertices.len();
        for tri in fan_triangles(corners) {
            for corner in tri {
                out.vertices.push(face.vertices[corner]);
                if sources.normals.is_some() {
                    out.normals.push(face.normals[corner]);
                }
                if sources.colors.is_some() {
                    out.colors.push(face.colors[corner]);
                }
                for (channel, values) in face.uvs.iter().enumerate() {
                    out.uvs[channel].push(values[corner]);
                }
                if let Some(skin) = out.skin.as_mut() {
                    skin.indices.push(face.skin_indices[corner]);
                    skin.weights.push(face.skin_weights[corner]);
                }
            }
        }

        if let Some(materials) = materials {
            let mut material = [0.0f32; 1];
            materials.fetch(polygon_vertex, polygon, vertex, &mut material);
            let triangles = corners.saturating_sub(2);
            out.triangle_materials
                .extend(std::iter::repeat(material[0] as f64).take(triangles));
        }

        polygon += 1;
        face.clear();
    }

    out
}
