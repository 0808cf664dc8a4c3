//! Scene description produced by a decode.
//!
//! Nodes live in a flat arena (`Scene::nodes`) and refer to each other, and to
//! the geometry, material, texture, skeleton and image tables, by index. There
//! are no back-pointers into the document tree.

use std::fmt;

use fbx_math::{euler_zyx_to_quat, quat_to_euler_zyx, Mat4, Quat, Vec3};
use serde::Serialize;

use crate::animation::AnimationClip;
use crate::diagnostics::Diagnostic;
use crate::geometry::Geometry;
use crate::material::Material;
use crate::texture::{Image, Texture};

/// Transform components that can be composed into a matrix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Decompose a matrix into translation, rotation and scale.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Rotation as an XYZ Euler triple in radians, ZYX order.
    pub fn euler_zyx(&self) -> Vec3 {
        quat_to_euler_zyx(self.rotation)
    }

    pub fn set_euler_zyx(&mut self, euler: Vec3) {
        self.rotation = euler_zyx_to_quat(euler);
    }
}

/// Camera projection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Camera {
    Perspective {
        /// Vertical field of view in degrees
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum LightKind {
    Point,
    Directional,
    Spot {
        /// Cone angle in radians
        angle: f32,
        penumbra: f32,
    },
    Ambient,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    /// Cut-off distance; `0` means unlimited
    pub distance: f32,
    pub decay: f32,
    pub cast_shadow: bool,
    /// Aim point for directional and spot lights, in the light parent's space
    pub target: Option<Vec3>,
}

impl Light {
    pub fn new(kind: LightKind, color: Vec3, intensity: f32) -> Self {
        Self {
            kind,
            color,
            intensity,
            distance: 0.0,
            decay: 1.0,
            cast_shadow: false,
            target: None,
        }
    }

    /// Directional and spot lights aim at a target point.
    pub fn has_target(&self) -> bool {
        matches!(self.kind, LightKind::Directional | LightKind::Spot { .. })
    }
}

/// Binding of a skinned mesh to a skeleton.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SkinBinding {
    /// Index into `Scene::skeletons`
    pub skeleton: usize,
    /// Mesh world matrix at bind time
    pub bind_matrix: Mat4,
}

/// A mesh instance: one geometry drawn with one material per group.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MeshNode {
    /// Index into `Scene::geometries`
    pub geometry: usize,
    /// Indices into `Scene::materials`; group `material_index` selects a slot
    pub materials: Vec<usize>,
    pub skin: Option<SkinBinding>,
}

/// What a node is.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum NodeKind {
    Group,
    Bone,
    Camera(Camera),
    Light(Light),
    Mesh(MeshNode),
    SkinnedMesh(MeshNode),
    Curve {
        geometry: Option<usize>,
        material: usize,
    },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Bone => "bone",
            NodeKind::Camera(_) => "camera",
            NodeKind::Light(_) => "light",
            NodeKind::Mesh(_) => "mesh",
            NodeKind::SkinnedMesh(_) => "skinned-mesh",
            NodeKind::Curve { .. } => "curve",
        }
    }

    /// Geometry drawn by this node, if any.
    pub fn geometry(&self) -> Option<usize> {
        match self {
            NodeKind::Mesh(mesh) | NodeKind::SkinnedMesh(mesh) => Some(mesh.geometry),
            NodeKind::Curve { geometry, .. } => *geometry,
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut MeshNode> {
        match self {
            NodeKind::Mesh(mesh) | NodeKind::SkinnedMesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// A transform node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneNode {
    /// Source object ID; `None` for inner bone wrappers and synthesized nodes
    pub id: Option<i64>,
    pub name: String,
    pub kind: NodeKind,
    /// Local transform; rotation already includes any pre-rotation
    pub transform: Transform,
    pub pre_rotation: Option<Quat>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub world: Mat4,
}

impl SceneNode {
    pub fn new(id: Option<i64>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            transform: Transform::default(),
            pre_rotation: None,
            parent: None,
            children: Vec::new(),
            world: Mat4::IDENTITY,
        }
    }
}

/// One bone slot of a skeleton.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkeletonBone {
    /// Bone node; `None` when the slot's cluster never matched a model
    pub node: Option<usize>,
    pub sub_deformer: Option<i64>,
    pub link_mode: Option<String>,
    pub inverse_bind: Mat4,
    /// Influenced mesh vertices
    pub indices: Vec<i64>,
    pub weights: Vec<f64>,
}

/// Ordered bones of one skin deformer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Skeleton {
    /// Skin deformer object ID
    pub deformer: i64,
    pub bones: Vec<SkeletonBone>,
}

/// Counts for inspection tools.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SceneSummary {
    pub nodes: usize,
    pub meshes: usize,
    pub triangles: usize,
    pub skeletons: usize,
    pub materials: usize,
    pub textures: usize,
    pub clips: usize,
    pub diagnostics: usize,
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} meshes ({} triangles), {} skeletons, {} materials, {} textures, {} clips, {} diagnostics",
            self.nodes,
            self.meshes,
            self.triangles,
            self.skeletons,
            self.materials,
            self.textures,
            self.clips,
            self.diagnostics
        )
    }
}

/// A decoded scene.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
    /// Top-level nodes in creation order
    pub roots: Vec<usize>,
    pub geometries: Vec<Geometry>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub images: Vec<Image>,
    pub skeletons: Vec<Skeleton>,
    pub animations: Vec<AnimationClip>,
    /// Every model node in creation order; animation tracks index this list
    pub animation_nodes: Vec<usize>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Scene {
    /// Add a detached node and return its index.
    pub fn add_node(&mut self, node: SceneNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Parent `child` under `parent`. Refuses, returning `false`, when the
    /// child already has a parent or the link would form a cycle.
    pub fn attach(&mut self, parent: usize, child: usize) -> bool {
        if parent == child
            || self.nodes[child].parent.is_some()
            || self.is_ancestor(child, parent)
        {
            return false;
        }
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        true
    }

    /// True if `ancestor` is on the parent chain of `node`.
    pub fn is_ancestor(&self, ancestor: usize, node: usize) -> bool {
        let mut current = self.nodes[node].parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.nodes[p].parent;
        }
        false
    }

    /// `root` and every node below it, depth first.
    pub fn descendants(&self, root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.nodes[i].children.iter().rev().copied());
        }
        out
    }

    /// Recompute world matrices from the roots down.
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(usize, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|&r| (r, Mat4::IDENTITY))
            .collect();
        while let Some((i, parent_world)) = stack.pop() {
            let world = parent_world * self.nodes[i].transform.to_matrix();
            self.nodes[i].world = world;
            for &child in self.nodes[i].children.iter().rev() {
                stack.push((child, world));
            }
        }
    }

    pub fn node(&self, index: usize) -> Option<&SceneNode> {
        self.nodes.get(index)
    }

    /// First node with the given (sanitized) name.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Node created for a source object ID.
    pub fn find_by_id(&self, id: i64) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == Some(id))
    }

    pub fn summary(&self) -> SceneSummary {
        let meshes: Vec<usize> = self
            .nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Mesh(m) | NodeKind::SkinnedMesh(m) => Some(m.geometry),
                _ => None,
            })
            .collect();
        SceneSummary {
            nodes: self.nodes.len(),
            meshes: meshes.len(),
            triangles: meshes
                .iter()
                .filter_map(|&g| self.geometries.get(g))
                .map(Geometry::triangle_count)
                .sum(),
            skeletons: self.skeletons.len(),
            materials: self.materials.len(),
            textures: self.textures.len(),
            clips: self.animations.len(),
            diagnostics: self.diagnostics.len(),
        }
    }
}
