//! Top-level decode entry points and scene assembly.
//!
//! A decode runs the pipeline front to back:
//!
//! 1. parse the document tree (binary or text)
//! 2. index connections
//! 3. extract images, textures, materials and skin deformers
//! 4. build geometries
//! 5. create one node per model, place and parent it
//! 6. put skeletons into bind pose and bind skinned meshes
//! 7. bake animation clips
//!
//! Everything degrades to a diagnostic except document-level failures.

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_3;
use std::fmt;

use fbx_math::{deg_to_rad, euler_zyx_to_quat, look_at_rotation, mat4_from_slice, Mat4, Vec3};
use thiserror::Error;

use crate::animation::extract_animations;
use crate::connections::ConnectionGraph;
use crate::deformer::{parse_deformers, Deformers};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::{parse_document, DocumentError, ErrorClass, Node};
use crate::geometry::build_geometries;
use crate::material::{parse_materials, Material};
use crate::scene::{
    Camera, Light, LightKind, MeshNode, NodeKind, Scene, SceneNode, Skeleton, SkeletonBone,
    SkinBinding, Transform,
};
use crate::texture::{parse_images, parse_textures, ResourceResolver};

/// Errors that abort a decode.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Document has no {0} section")]
    MissingSection(&'static str),
}

impl LoadError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LoadError::Document(e) => e.class(),
            LoadError::MissingSection(_) => ErrorClass::Structural,
        }
    }
}

/// Result type for decoding.
pub type LoadResult<T> = Result<T, LoadError>;

/// Decode settings.
pub struct LoadOptions {
    /// Consulted for external texture paths. Without one, external textures
    /// stay pending.
    pub resolver: Option<Box<dyn ResourceResolver>>,

    /// Aspect source for cameras without `AspectWidth`/`AspectHeight`
    pub viewport_size: (f32, f32),

    /// Also decode embedded image payloads to linear RGBA pixels
    pub decode_embedded_images: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            resolver: None,
            viewport_size: (1280.0, 720.0),
            decode_embedded_images: false,
        }
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("resolver", &self.resolver.as_ref().map(|_| "<resolver>"))
            .field("viewport_size", &self.viewport_size)
            .field("decode_embedded_images", &self.decode_embedded_images)
            .finish()
    }
}

impl LoadOptions {
    pub fn with_resolver(mut self, resolver: impl ResourceResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_viewport_size(mut self, width: f32, height: f32) -> Self {
        self.viewport_size = (width, height);
        self
    }

    pub fn with_embedded_image_decoding(mut self, enabled: bool) -> Self {
        self.decode_embedded_images = enabled;
        self
    }
}

/// Decode an FBX buffer with default options.
///
/// # Example
///
/// ```ignore
/// let bytes = std::fs::read("character.fbx")?;
/// let scene = fbx_core::decode(&bytes)?;
/// println!("{}", scene.summary());
/// ```
pub fn decode(bytes: &[u8]) -> LoadResult<Scene> {
    decode_with_options(bytes, &LoadOptions::default())
}

/// Decode an FBX buffer.
pub fn decode_with_options(bytes: &[u8], options: &LoadOptions) -> LoadResult<Scene> {
    let mut diagnostics = Diagnostics::new();

    let document = parse_document(bytes, &mut diagnostics)?;
    log::debug!(
        "Parsed {:?} document version {} ({} sections)",
        document.format,
        document.version,
        document.len()
    );
    let objects = document
        .objects()
        .ok_or(LoadError::MissingSection("Objects"))?;
    let graph = ConnectionGraph::build(document.connections());

    let (images, image_index) =
        parse_images(objects, options.decode_embedded_images, &mut diagnostics);
    let (mut textures, texture_index) = parse_textures(
        objects,
        &graph,
        &image_index,
        options.resolver.as_deref(),
        &mut diagnostics,
    );
    let (materials, material_index) = parse_materials(
        objects,
        &graph,
        &mut textures,
        &texture_index,
        &mut diagnostics,
    );
    let mut deformers = parse_deformers(objects, &graph, &mut diagnostics);
    let (geometries, geometry_index) =
        build_geometries(objects, &graph, &deformers, &mut diagnostics);

    let mut scene = Scene {
        images,
        textures,
        materials,
        geometries,
        ..Default::default()
    };

    let mut builder = SceneBuilder {
        objects,
        graph: &graph,
        options,
        material_index: &material_index,
        geometry_index: &geometry_index,
        models: HashMap::new(),
        model_order: Vec::new(),
    };
    builder.create_models(&mut scene, &mut deformers, &mut diagnostics);
    builder.place_models(&mut scene, &mut diagnostics);
    scene.update_world_matrices();
    builder.bind_skeletons(&mut scene, &deformers, &mut diagnostics);
    scene.update_world_matrices();

    let global_settings = document.node("GlobalSettings");
    scene.animations =
        extract_animations(objects, &graph, global_settings, &mut scene, &mut diagnostics);
    add_ambient_light(&mut scene, global_settings);
    scene.update_world_matrices();

    scene.diagnostics = diagnostics.into_vec();
    log::info!("Decoded FBX scene: {}", scene.summary());
    Ok(scene)
}

/// Replace whitespace with `_` and drop characters reserved in binding paths.
pub fn sanitize_node_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '[' | ']' | '.' | ':' | '/'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Ambient light from `GlobalSettings/AmbientColor`, when not black.
fn add_ambient_light(scene: &mut Scene, global_settings: Option<&Node>) {
    let Some(color) = global_settings.and_then(|g| g.vec3("AmbientColor")) else {
        return;
    };
    if color == Vec3::ZERO {
        return;
    }
    let light = Light::new(LightKind::Ambient, color, 1.0);
    let index = scene.add_node(SceneNode::new(None, "", NodeKind::Light(light)));
    scene.roots.push(index);
}

/// Creates and wires one node per `Model` object.
struct SceneBuilder<'a> {
    objects: &'a Node,
    graph: &'a ConnectionGraph,
    options: &'a LoadOptions,
    material_index: &'a HashMap<i64, usize>,
    geometry_index: &'a HashMap<i64, usize>,
    /// Model ID -> outermost node created for it
    models: HashMap<i64, usize>,
    /// Model IDs in creation order
    model_order: Vec<i64>,
}

impl<'a> SceneBuilder<'a> {
    fn create_models(
        &mut self,
        scene: &mut Scene,
        deformers: &mut Deformers,
        diagnostics: &mut Diagnostics,
    ) {
        for skin in deformers.iter_mut() {
            let count = skin.bone_count();
            skin.bones = vec![None; count];
        }

        for model in self.objects.children_named("Model") {
            let Some(id) = model.object_id() else {
                continue;
            };

            let index = match self.create_bone_chain(scene, deformers, id) {
                Some(outer) => outer,
                None => {
                    let kind = self.node_kind(scene, model, id, diagnostics);
                    scene.add_node(SceneNode::new(None, "", kind))
                }
            };

            let node = &mut scene.nodes[index];
            node.id = Some(id);
            node.name = sanitize_node_name(&model.attr_name);

            self.models.insert(id, index);
            self.model_order.push(id);
            scene.animation_nodes.push(index);
        }
        log::debug!("Created {} model nodes", self.model_order.len());
    }

    /// One bone per cluster parent of the model. Each new bone wraps the
    /// previous one; the outermost is returned.
    fn create_bone_chain(
        &self,
        scene: &mut Scene,
        deformers: &mut Deformers,
        id: i64,
    ) -> Option<usize> {
        let mut current: Option<usize> = None;
        for parent in self.graph.parents(id) {
            for skin in deformers.iter_mut() {
                let Some(slot) = skin.sub_deformer(parent.id).map(|s| s.index) else {
                    continue;
                };
                let bone = scene.add_node(SceneNode::new(None, "", NodeKind::Bone));
                if let Some(entry) = skin.bones.get_mut(slot) {
                    *entry = Some(bone);
                }
                if let Some(inner) = current {
                    scene.attach(bone, inner);
                }
                current = Some(bone);
            }
        }
        current
    }

    /// Last `NodeAttribute` among the model's connection children.
    fn node_attribute(&self, id: i64) -> Option<&'a Node> {
        self.graph
            .children(id)
            .iter()
            .filter_map(|c| self.objects.child_by_id("NodeAttribute", c.id))
            .last()
    }

    fn node_kind(
        &self,
        scene: &mut Scene,
        model: &Node,
        id: i64,
        diagnostics: &mut Diagnostics,
    ) -> NodeKind {
        match model.attr_type.as_str() {
            "Camera" => match self.node_attribute(id) {
                Some(attr) => self.camera(attr, id, diagnostics),
                None => NodeKind::Group,
            },
            "Light" => match self.node_attribute(id) {
                Some(attr) => NodeKind::Light(light(attr, id, diagnostics)),
                None => NodeKind::Group,
            },
            "Mesh" => self.mesh(scene, id, diagnostics),
            "NurbsCurve" => {
                let geometry = self
                    .graph
                    .children(id)
                    .iter()
                    .filter_map(|c| self.geometry_index.get(&c.id).copied())
                    .last();
                scene.materials.push(Material::curve_line());
                NodeKind::Curve {
                    geometry,
                    material: scene.materials.len() - 1,
                }
            }
            _ => NodeKind::Group,
        }
    }

    fn camera(&self, attr: &Node, id: i64, diagnostics: &mut Diagnostics) -> NodeKind {
        let near = attr.f64("NearPlane").map_or(1.0, |v| v / 1000.0) as f32;
        let far = attr.f64("FarPlane").map_or(1000.0, |v| v / 1000.0) as f32;

        let (width, height) = match (attr.f64("AspectWidth"), attr.f64("AspectHeight")) {
            (Some(w), Some(h)) => (w as f32, h as f32),
            _ => self.options.viewport_size,
        };
        let aspect = width / height;
        let fov = attr.f64("FieldOfView").unwrap_or(45.0) as f32;

        match attr.i64("CameraProjectionType").unwrap_or(0) {
            0 => NodeKind::Camera(Camera::Perspective {
                fov,
                aspect,
                near,
                far,
            }),
            1 => NodeKind::Camera(Camera::Orthographic {
                left: -width / 2.0,
                right: width / 2.0,
                top: height / 2.0,
                bottom: -height / 2.0,
                near,
                far,
            }),
            other => {
                diagnostics.warn(
                    DiagnosticKind::Schema,
                    format!("Camera {} has unknown projection type {}, using a group", id, other),
                );
                NodeKind::Group
            }
        }
    }

    fn mesh(&self, scene: &mut Scene, id: i64, diagnostics: &mut Diagnostics) -> NodeKind {
        let mut geometry = None;
        let mut materials = Vec::new();
        for child in self.graph.children(id) {
            if let Some(&g) = self.geometry_index.get(&child.id) {
                geometry = Some(g);
            }
            if let Some(&m) = self.material_index.get(&child.id) {
                materials.push(m);
            }
        }

        let Some(geometry) = geometry else {
            diagnostics.warn(
                DiagnosticKind::Reference,
                format!("Mesh model {} has no geometry, using a group", id),
            );
            return NodeKind::Group;
        };

        if materials.is_empty() {
            scene.materials.push(Material::default_mesh());
            materials.push(scene.materials.len() - 1);
        }

        let (has_colors, skinned) = scene
            .geometries
            .get(geometry)
            .map_or((false, false), |g| (g.has_colors(), g.deformer.is_some()));
        for &m in &materials {
            let material = &mut scene.materials[m];
            material.vertex_colors |= has_colors;
            material.skinning |= skinned;
        }

        let mesh = MeshNode {
            geometry,
            materials,
            skin: None,
        };
        if skinned {
            NodeKind::SkinnedMesh(mesh)
        } else {
            NodeKind::Mesh(mesh)
        }
    }

    fn place_models(&self, scene: &mut Scene, diagnostics: &mut Diagnostics) {
        let mut geometric_offsets = Vec::new();

        for &id in &self.model_order {
            let (Some(model), Some(&index)) =
                (self.objects.child_by_id("Model", id), self.models.get(&id))
            else {
                continue;
            };

            let node = &mut scene.nodes[index];
            node.transform = local_transform(model);
            if let Some(pre) = model.vec3("PreRotation") {
                let pre = euler_zyx_to_quat(deg_to_rad(pre));
                node.transform.rotation = pre * node.transform.rotation;
                node.pre_rotation = Some(pre);
            }

            if let Some(offset) = model.vec3("GeometricTranslation") {
                geometric_offsets.push((index, offset));
            }

            if model.has("LookAtProperty") {
                self.aim(scene, id, index, diagnostics);
            }

            let parent = self
                .graph
                .parents(id)
                .iter()
                .find_map(|p| self.models.get(&p.id).copied());
            let attached = match parent {
                Some(p) => {
                    let ok = scene.attach(p, index);
                    if !ok {
                        diagnostics.warn(
                            DiagnosticKind::Reference,
                            format!("Model {} would form a parenting cycle, kept at the root", id),
                        );
                    }
                    ok
                }
                None => false,
            };
            if !attached {
                scene.roots.push(index);
            }
        }

        for (root, offset) in geometric_offsets {
            for n in scene.descendants(root) {
                if let Some(g) = scene.nodes[n].kind.geometry() {
                    if let Some(geometry) = scene.geometries.get_mut(g) {
                        geometry.translate(offset);
                    }
                }
            }
        }
    }

    /// Point a node at its `LookAtProperty` target.
    fn aim(&self, scene: &mut Scene, id: i64, index: usize, diagnostics: &mut Diagnostics) {
        for child in self.graph.children(id) {
            if child.label != "LookAtProperty" {
                continue;
            }
            let Some(target_model) = self.objects.child_by_id("Model", child.id) else {
                diagnostics.warn(
                    DiagnosticKind::Reference,
                    format!("Look-at target {} of model {} not found", child.id, id),
                );
                continue;
            };
            let Some(target) = target_model.vec3("Lcl_Translation") else {
                continue;
            };

            let node = &mut scene.nodes[index];
            match &mut node.kind {
                NodeKind::Light(light) if light.has_target() => light.target = Some(target),
                kind => {
                    let negative_z = matches!(kind, NodeKind::Camera(_) | NodeKind::Light(_));
                    node.transform.rotation = look_at_rotation(
                        node.transform.translation,
                        target,
                        Vec3::Y,
                        negative_z,
                    );
                }
            }
        }
    }

    /// Build skeletons, apply the bind pose and bind skinned meshes.
    fn bind_skeletons(
        &self,
        scene: &mut Scene,
        deformers: &Deformers,
        diagnostics: &mut Diagnostics,
    ) {
        let pose = self.bind_pose(diagnostics);

        for skin in deformers.iter() {
            let mut bones = Vec::with_capacity(skin.bone_count());
            let mut posed = true;
            for (slot, node) in skin.bones.iter().enumerate() {
                let sub = skin.sub_deformers.iter().find(|s| s.index == slot);
                let world = node.map_or(Mat4::IDENTITY, |n| scene.nodes[n].world);

                // Pose overrides stop at the first bone the pose does not cover
                let pose_world = if posed {
                    node.and_then(|n| scene.nodes[n].id)
                        .and_then(|id| pose.get(&id))
                        .copied()
                } else {
                    None
                };
                if posed && pose_world.is_none() && sub.is_some() {
                    posed = false;
                    log::debug!("Bind pose does not cover bone slot {} of skin {}", slot, skin.id);
                }
                let bind_world = pose_world.unwrap_or(world);

                bones.push(SkeletonBone {
                    node: *node,
                    sub_deformer: sub.map(|s| s.id),
                    link_mode: sub.and_then(|s| s.link_mode.clone()),
                    inverse_bind: bind_world.inverse(),
                    indices: sub.map(|s| s.indices.clone()).unwrap_or_default(),
                    weights: sub.map(|s| s.weights.clone()).unwrap_or_default(),
                });
            }

            scene.skeletons.push(Skeleton {
                deformer: skin.id,
                bones,
            });
            let skeleton = scene.skeletons.len() - 1;

            for parent in self.graph.parents(skin.id) {
                if !self.geometry_index.contains_key(&parent.id) {
                    continue;
                }
                let Some((model_id, mesh_node)) = self
                    .graph
                    .parents(parent.id)
                    .iter()
                    .find_map(|p| self.models.get(&p.id).map(|&n| (p.id, n)))
                else {
                    continue;
                };
                let bind_matrix = scene.nodes[mesh_node].world;
                match scene.nodes[mesh_node].kind.mesh_mut() {
                    Some(mesh) => {
                        mesh.skin = Some(SkinBinding {
                            skeleton,
                            bind_matrix,
                        })
                    }
                    None => diagnostics.warn(
                        DiagnosticKind::Reference,
                        format!("Skin {} is bound to model {} which is not a mesh", skin.id, model_id),
                    ),
                }
            }
        }
    }

    /// World matrices of the first `BindPose`, keyed by model ID.
    fn bind_pose(&self, diagnostics: &mut Diagnostics) -> HashMap<i64, Mat4> {
        let mut matrices = HashMap::new();
        let Some(pose) = self
            .objects
            .children_named("Pose")
            .find(|p| p.attr_type == "BindPose")
        else {
            return matrices;
        };

        for pose_node in pose.children_named("PoseNode") {
            let Some(node_id) = pose_node.i64("Node") else {
                diagnostics.warn(DiagnosticKind::Reference, "Pose node without a Node reference");
                continue;
            };
            match pose_node.child_array("Matrix").and_then(|m| mat4_from_slice(&m)) {
                Some(matrix) => {
                    matrices.insert(node_id, matrix);
                }
                None => diagnostics.warn(
                    DiagnosticKind::Reference,
                    format!("Pose node for {} has no usable Matrix", node_id),
                ),
            }
        }
        matrices
    }
}

/// Lcl_Translation, Lcl_Rotation (degrees, ZYX) and Lcl_Scaling of a model.
fn local_transform(model: &Node) -> Transform {
    let mut transform = Transform::default();
    if let Some(t) = model.vec3("Lcl_Translation") {
        transform.translation = t;
    }
    if let Some(r) = model.vec3("Lcl_Rotation") {
        transform.set_euler_zyx(deg_to_rad(r));
    }
    if let Some(s) = model.vec3("Lcl_Scaling") {
        transform.scale = s;
    }
    transform
}

fn light(attr: &Node, id: i64, diagnostics: &mut Diagnostics) -> Light {
    let color = attr.vec3("Color").unwrap_or(Vec3::ONE);
    let intensity = match attr.i64("CastLightOnObject") {
        Some(0) => 0.0,
        _ => attr.f64("Intensity").map_or(1.0, |i| i / 100.0) as f32,
    };
    let distance = match attr.f64("FarAttenuationEnd") {
        Some(_) if attr.i64("EnableFarAttenuation") == Some(0) => 0.0,
        Some(end) => (end / 1000.0) as f32,
        None => 0.0,
    };

    let kind = match attr.i64("LightType").unwrap_or(0) {
        0 => LightKind::Point,
        1 => LightKind::Directional,
        2 => LightKind::Spot {
            angle: attr
                .f64("InnerAngle")
                .map_or(FRAC_PI_3, |a| (a as f32).to_radians()),
            penumbra: attr
                .f64("OuterAngle")
                .map_or(0.0, |a| (a as f32).to_radians().max(1.0)),
        },
        other => {
            diagnostics.warn(
                DiagnosticKind::Schema,
                format!("Light {} has unknown type {}, using a point light", id, other),
            );
            let mut fallback = Light::new(LightKind::Point, color, intensity);
            fallback.cast_shadow = attr.i64("CastShadows") == Some(1);
            return fallback;
        }
    };

    // Directional lights have no range
    let distance = match kind {
        LightKind::Directional => 0.0,
        _ => distance,
    };

    Light {
        distance,
        cast_shadow: attr.i64("CastShadows") == Some(1),
        ..Light::new(kind, color, intensity)
    }
}
