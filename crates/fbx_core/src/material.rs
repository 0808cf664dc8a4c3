//! Surface materials.
//!
//! A material's kind comes from its `ShadingModel`; scalar parameters come from
//! a fixed property table plus the Maya PBR extension block, and texture slots
//! are bound through the labels on the material's child connections.

use std::collections::HashMap;

use fbx_math::{Vec2, Vec3};
use serde::Serialize;

use crate::connections::ConnectionGraph;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::Node;
use crate::texture::{Texture, TextureMapping, WrapMode};

/// Shading model a material is rendered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MaterialKind {
    Phong,
    Lambert,
    /// Metal/roughness PBR model
    Standard,
    /// Unlit polyline material used for NURBS curves
    Line,
}

/// Texture slots, as indices into `Scene::textures`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MaterialMaps {
    pub map: Option<usize>,
    pub bump_map: Option<usize>,
    pub displacement_map: Option<usize>,
    pub emissive_map: Option<usize>,
    pub normal_map: Option<usize>,
    pub env_map: Option<usize>,
    pub specular_map: Option<usize>,
    pub alpha_map: Option<usize>,
    pub roughness_map: Option<usize>,
    pub metalness_map: Option<usize>,
    pub ao_map: Option<usize>,
}

/// A decoded material.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Material {
    /// Source object ID; `None` for materials synthesized during assembly
    pub id: Option<i64>,
    pub name: String,
    pub kind: MaterialKind,

    /// Base color in linear RGB
    pub color: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub bump_scale: f32,
    pub displacement_scale: f32,
    pub reflectivity: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub metalness: f32,
    pub roughness: f32,
    pub line_width: f32,

    pub maps: MaterialMaps,

    /// Set when the mesh using this material carries vertex colors
    pub vertex_colors: bool,
    /// Set when the mesh using this material is skinned
    pub skinning: bool,
}

/// Color from a packed `0xRRGGBB` value.
pub fn color_from_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

impl Material {
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            id: None,
            name: String::new(),
            kind,
            color: Vec3::ONE,
            specular: color_from_hex(0x111111),
            shininess: 30.0,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            bump_scale: 1.0,
            displacement_scale: 1.0,
            reflectivity: 1.0,
            opacity: 1.0,
            transparent: false,
            metalness: 0.0,
            roughness: 1.0,
            line_width: 1.0,
            maps: MaterialMaps::default(),
            vertex_colors: false,
            skinning: false,
        }
    }

    /// Grey phong material given to meshes without any material connection.
    pub fn default_mesh() -> Self {
        Self {
            color: color_from_hex(0xcccccc),
            ..Self::new(MaterialKind::Phong)
        }
    }

    /// Material given to NURBS curve lines.
    pub fn curve_line() -> Self {
        Self {
            color: color_from_hex(0x3300ff),
            line_width: 5.0,
            ..Self::new(MaterialKind::Line)
        }
    }

    pub fn has_textures(&self) -> bool {
        self.maps != MaterialMaps::default()
    }
}

/// Material kind for a `ShadingModel` tag. Unknown tags fall back to the PBR
/// model and are reported.
fn material_kind(shading_model: &str, id: i64, diagnostics: &mut Diagnostics) -> MaterialKind {
    match shading_model.to_ascii_lowercase().as_str() {
        "phong" => MaterialKind::Phong,
        "lambert" => MaterialKind::Lambert,
        "unknown" => MaterialKind::Standard,
        other => {
            diagnostics.warn(
                DiagnosticKind::Schema,
                format!(
                    "Unknown material type \"{}\" on material {}, using standard",
                    other, id
                ),
            );
            MaterialKind::Standard
        }
    }
}

/// Fill scalar parameters from the material's properties.
fn apply_parameters(node: &Node, material: &mut Material) {
    if let Some(v) = node.f64("BumpFactor") {
        material.bump_scale = v as f32;
    }
    if let Some(c) = node.vec3("Diffuse") {
        material.color = c;
    }
    if let Some(v) = node.f64("DisplacementFactor") {
        material.displacement_scale = v as f32;
    }
    if let Some(v) = node.f64("ReflectionFactor") {
        material.reflectivity = v as f32;
    }
    if let Some(c) = node.vec3("Specular") {
        material.specular = c;
    }
    if let Some(v) = node.f64("Shininess") {
        material.shininess = v as f32;
    }
    if let Some(c) = node.vec3("Emissive") {
        material.emissive = c;
    }
    if let Some(v) = node.f64("EmissiveFactor") {
        material.emissive_intensity = v as f32;
    }
    if let Some(v) = node.f64("Opacity") {
        material.opacity = v as f32;
    }
    if material.opacity < 1.0 {
        material.transparent = true;
    }

    // Maya PBR export
    if let Some(c) = node.vec3("Maya|base_color") {
        material.color = c;
    }
    if let Some(c) = node.vec3("Maya|emissive") {
        material.emissive = c;
    }
    if let Some(v) = node.f64("Maya|emissive_intensity") {
        material.emissive_intensity = v as f32;
    }
    if let Some(v) = node.f64("Maya|metallic") {
        material.metalness = v as f32;
    }
    if let Some(v) = node.f64("Maya|roughness") {
        material.roughness = v as f32;
    }
}

/// Slot a child connection label binds to.
enum Binding {
    /// Maya PBR slot, enabled by the named `use_*` flag
    Gated(&'static str, fn(&mut MaterialMaps) -> &mut Option<usize>),
    Plain(fn(&mut MaterialMaps) -> &mut Option<usize>),
    Reflection,
    Transparency,
    Ignored,
}

fn binding(label: &str) -> Option<Binding> {
    let binding = match label {
        "Maya|TEX_color_map" => Binding::Gated("Maya|use_color_map", |m| &mut m.map),
        "Maya|TEX_emissive_map" => Binding::Gated("Maya|use_emissive_map", |m| &mut m.emissive_map),
        "Maya|TEX_roughness_map" => {
            Binding::Gated("Maya|use_roughness_map", |m| &mut m.roughness_map)
        }
        "Maya|TEX_normal_map" => Binding::Gated("Maya|use_normal_map", |m| &mut m.normal_map),
        "Maya|TEX_metallic_map" => {
            Binding::Gated("Maya|use_metallic_map", |m| &mut m.metalness_map)
        }
        "Maya|TEX_ao_map" => Binding::Gated("Maya|use_ao_map", |m| &mut m.ao_map),
        "Maya|TEX_brdf_lut" | "Maya|TEX_global_specular_cube" | "Maya|TEX_global_diffuse_cube" => {
            Binding::Ignored
        }
        "Bump" => Binding::Plain(|m| &mut m.bump_map),
        "DiffuseColor" => Binding::Plain(|m| &mut m.map),
        "DisplacementColor" => Binding::Plain(|m| &mut m.displacement_map),
        "EmissiveColor" => Binding::Plain(|m| &mut m.emissive_map),
        "NormalMap" => Binding::Plain(|m| &mut m.normal_map),
        "ReflectionColor" => Binding::Reflection,
        "SpecularColor" => Binding::Plain(|m| &mut m.specular_map),
        "TransparentColor" => Binding::Transparency,
        _ => return None,
    };
    Some(binding)
}

/// Context shared by every material while binding texture slots.
struct SlotBinder<'a> {
    textures: &'a mut [Texture],
    texture_index: &'a HashMap<i64, usize>,
}

impl SlotBinder<'_> {
    /// Table index of a texture ID, reporting dangling references.
    fn lookup(
        &self,
        texture_id: i64,
        material_id: i64,
        label: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<usize> {
        let found = self.texture_index.get(&texture_id).copied();
        if found.is_none() {
            diagnostics.warn(
                DiagnosticKind::Reference,
                format!(
                    "Material {} binds {} to texture {} which was not loaded",
                    material_id, label, texture_id
                ),
            );
        }
        found
    }

    fn bind(
        &mut self,
        node: &Node,
        material_id: i64,
        material: &mut Material,
        graph: &ConnectionGraph,
        diagnostics: &mut Diagnostics,
    ) {
        let uv_scale = node.f64("Maya|uv_scale").unwrap_or(1.0) as f32;

        for child in graph.children(material_id) {
            let Some(binding) = binding(&child.label) else {
                diagnostics.warn(
                    DiagnosticKind::Schema,
                    format!(
                        "Material {}: {} map is not supported, skipping texture",
                        material_id, child.label
                    ),
                );
                continue;
            };

            match binding {
                Binding::Ignored => {}
                Binding::Gated(flag, slot) => {
                    if node.f64(flag) != Some(1.0) {
                        continue;
                    }
                    let texture = self.lookup(child.id, material_id, &child.label, diagnostics);
                    if let Some(index) = texture {
                        if uv_scale != 1.0 {
                            let t = &mut self.textures[index];
                            t.wrap_s = WrapMode::Repeat;
                            t.wrap_t = WrapMode::Repeat;
                            t.repeat = Vec2::splat(uv_scale);
                        }
                    }
                    *slot(&mut material.maps) = texture;
                }
                Binding::Plain(slot) => {
                    *slot(&mut material.maps) =
                        self.lookup(child.id, material_id, &child.label, diagnostics);
                }
                Binding::Reflection => {
                    let texture = self.lookup(child.id, material_id, &child.label, diagnostics);
                    if let Some(index) = texture {
                        self.textures[index].mapping = TextureMapping::EquirectangularReflection;
                    }
                    material.maps.env_map = texture;
                }
                Binding::Transparency => {
                    material.maps.alpha_map =
                        self.lookup(child.id, material_id, &child.label, diagnostics);
                    material.transparent = true;
                }
            }
        }
    }
}

/// Decode every connected `Material` object.
///
/// Materials with no entry in the connection graph are unused and skipped.
/// Texture slot bindings may adjust the referenced textures' wrap, repeat and
/// mapping. Returns the material table and an object ID → table index map.
pub fn parse_materials(
    objects: &Node,
    graph: &ConnectionGraph,
    textures: &mut [Texture],
    texture_index: &HashMap<i64, usize>,
    diagnostics: &mut Diagnostics,
) -> (Vec<Material>, HashMap<i64, usize>) {
    let mut materials = Vec::new();
    let mut index = HashMap::new();
    let mut binder = SlotBinder {
        textures,
        texture_index,
    };

    for node in objects.children_named("Material") {
        let Some(id) = node.object_id() else {
            continue;
        };
        if !graph.contains(id) {
            log::debug!("Skipping unused material {}", id);
            continue;
        }

        let shading = node.str("ShadingModel").unwrap_or("unknown");
        let mut material = Material::new(material_kind(shading, id, diagnostics));
        material.id = Some(id);
        material.name = node.attr_name.clone();

        apply_parameters(node, &mut material);
        binder.bind(node, id, &mut material, graph, diagnostics);

        index.insert(id, materials.len());
        materials.push(material);
    }

    log::debug!("Parsed {} materials", materials.len());
    (materials, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Array, NodeId, PropertyRecord, RawConnection, Value};
    use crate::texture::TextureSource;

    fn record(type_name: &str, value: Value) -> PropertyRecord {
        PropertyRecord {
            type_name: type_name.into(),
            type2: String::new(),
            flag: "A".into(),
            value,
        }
    }

    fn material_node(id: i64, shading: &str) -> Node {
        let mut n = Node::new("Material");
        n.id = NodeId::Int(id);
        n.attr_name = format!("mat{}", id);
        n.set_property("ShadingModel", Value::String(shading.into()));
        n
    }

    fn texture(id: i64) -> Texture {
        Texture {
            id,
            name: format!("tex{}", id),
            source: TextureSource::External {
                path: format!("{}.png", id),
                payload: None,
            },
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            repeat: Vec2::ONE,
            mapping: TextureMapping::Uv,
        }
    }

    fn conn(child: i64, parent: i64, label: &str) -> RawConnection {
        RawConnection {
            child,
            parent,
            label: label.into(),
        }
    }

    fn parse(
        objects: &Node,
        connections: &[RawConnection],
        textures: &mut [Texture],
    ) -> (Vec<Material>, HashMap<i64, usize>, Diagnostics) {
        let graph = ConnectionGraph::build(connections);
        let texture_index = textures
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i))
            .collect();
        let mut diags = Diagnostics::new();
        let (materials, index) =
            parse_materials(objects, &graph, textures, &texture_index, &mut diags);
        (materials, index, diags)
    }

    #[test]
    fn test_kind_and_parameters() {
        let mut objects = Node::new("Objects");
        let mut phong = material_node(1, "Phong");
        phong.set_record(
            "Diffuse",
            record("Color", Value::Array(Array::Double(vec![1.0, 0.5, 0.25]))),
        );
        phong.set_record("Opacity", record("double", Value::Float(0.5)));
        phong.set_record("Shininess", record("double", Value::Float(12.0)));
        objects.add_child(phong);
        objects.add_child(material_node(2, "lambert"));
        objects.add_child(material_node(3, "toon"));
        objects.add_child(material_node(4, "phong"));

        let connections = [conn(1, 100, ""), conn(2, 100, ""), conn(3, 100, "")];
        let (materials, index, diags) = parse(&objects, &connections, &mut []);

        assert_eq!(materials.len(), 3);
        let phong = &materials[index[&1]];
        assert_eq!(phong.kind, MaterialKind::Phong);
        assert_eq!(phong.color, Vec3::new(1.0, 0.5, 0.25));
        assert!(phong.transparent);
        assert_eq!(phong.shininess, 12.0);
        assert_eq!(phong.name, "mat1");
        assert_eq!(materials[index[&2]].kind, MaterialKind::Lambert);
        assert_eq!(materials[index[&3]].kind, MaterialKind::Standard);
        assert!(!index.contains_key(&4));
        assert_eq!(diags.count(DiagnosticKind::Schema), 1);
    }

    #[test]
    fn test_slot_bindings() {
        let mut objects = Node::new("Objects");
        objects.add_child(material_node(1, "phong"));
        let mut textures = vec![texture(10), texture(11), texture(12)];
        let connections = [
            conn(1, 100, ""),
            conn(10, 1, "DiffuseColor"),
            conn(11, 1, "ReflectionColor"),
            conn(12, 1, "TransparentColor"),
            conn(13, 1, "Bump"),
            conn(10, 1, "VectorDisplacementColor"),
            conn(10, 1, "Maya|TEX_brdf_lut"),
        ];
        let (materials, _, diags) = parse(&objects, &connections, &mut textures);

        let m = &materials[0];
        assert_eq!(m.maps.map, Some(0));
        assert_eq!(m.maps.env_map, Some(1));
        assert_eq!(m.maps.alpha_map, Some(2));
        assert_eq!(m.maps.bump_map, None);
        assert!(m.transparent);
        assert!(m.has_textures());
        assert_eq!(textures[1].mapping, TextureMapping::EquirectangularReflection);
        assert_eq!(diags.count(DiagnosticKind::Reference), 1);
        assert_eq!(diags.count(DiagnosticKind::Schema), 1);
    }

    #[test]
    fn test_maya_pbr_block() {
        let mut objects = Node::new("Objects");
        let mut node = material_node(1, "unknown");
        node.set_record(
            "Maya|base_color",
            record("Vector3D", Value::Array(Array::Double(vec![0.1, 0.2, 0.3]))),
        );
        node.set_record("Maya|metallic", record("float", Value::Float(0.75)));
        node.set_record("Maya|roughness", record("float", Value::Float(0.25)));
        node.set_record("Maya|uv_scale", record("float", Value::Float(4.0)));
        node.set_record("Maya|use_color_map", record("bool", Value::Int(1)));
        node.set_record("Maya|use_normal_map", record("bool", Value::Int(0)));
        objects.add_child(node);

        let mut textures = vec![texture(10), texture(11)];
        let connections = [
            conn(1, 100, ""),
            conn(10, 1, "Maya|TEX_color_map"),
            conn(11, 1, "Maya|TEX_normal_map"),
        ];
        let (materials, _, diags) = parse(&objects, &connections, &mut textures);

        let m = &materials[0];
        assert_eq!(m.kind, MaterialKind::Standard);
        assert!((m.color - Vec3::new(0.1, 0.2, 0.3)).length() < 1e-6);
        assert_eq!(m.metalness, 0.75);
        assert_eq!(m.roughness, 0.25);
        assert_eq!(m.maps.map, Some(0));
        assert_eq!(m.maps.normal_map, None);
        assert_eq!(textures[0].wrap_s, WrapMode::Repeat);
        assert_eq!(textures[0].repeat, Vec2::splat(4.0));
        assert_eq!(textures[1].wrap_s, WrapMode::ClampToEdge);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_synthesized_materials() {
        let grey = Material::default_mesh();
        assert_eq!(grey.kind, MaterialKind::Phong);
        assert!((grey.color.x - 0.8).abs() < 1e-6);

        let line = Material::curve_line();
        assert_eq!(line.kind, MaterialKind::Line);
        assert_eq!(line.line_width, 5.0);
        assert!((line.color - Vec3::new(0.2, 0.0, 1.0)).length() < 1e-6);
    }
}
