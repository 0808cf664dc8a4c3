//! Animation curve extraction and clip baking.
//!
//! Curve nodes (`T`, `R`, `S`) bind to a model of the scene's animation
//! hierarchy and own up to three per-axis curves. Layers group curve nodes by
//! bone, stacks group layers and become clips. Clips are baked frame by frame
//! without interpolation: a bone only takes a curve value on frames where every
//! axis of that channel has a sample at exactly that index.
//!
//! Baking reads and writes each bone's live transform, so a frame without a
//! sample repeats whatever the previous frame produced. Downstream consumers
//! rely on this, so it is kept as is.

use std::collections::HashMap;

use fbx_math::{deg_to_rad, euler_zyx_to_quat, quat_to_euler_zyx, Quat, Vec3};
use serde::Serialize;

use crate::connections::ConnectionGraph;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::Node;
use crate::scene::{Scene, Transform};

/// FBX time units per second.
pub const TICKS_PER_SECOND: f64 = 46_186_158_000.0;

/// Frame rate used when the file does not say otherwise.
pub const DEFAULT_FPS: f64 = 30.0;

/// Time mode code of a custom frame rate.
const CUSTOM_TIME_MODE: i64 = 14;

/// Frame rate per `TimeMode` code.
const TIME_MODE_FPS: [f64; 18] = [
    30.0,   // default
    120.0,  //
    100.0,  //
    60.0,   //
    50.0,   //
    48.0,   //
    30.0,   // black and white NTSC
    30.0,   // drop frame
    29.97,  // NTSC drop frame
    29.97,  // NTSC full frame
    25.0,   // PAL
    24.0,   // film
    1.0,    // 1000 fps, used for timestamps
    23.976, // film full frame
    30.0,   // custom, see CustomFrameRate
    96.0,   //
    72.0,   //
    59.94,  //
];

pub fn ticks_to_seconds(ticks: f64) -> f64 {
    ticks / TICKS_PER_SECOND
}

/// Frame rate from the `GlobalSettings` section.
pub fn frame_rate(global_settings: Option<&Node>) -> f64 {
    let Some(mode) = global_settings.and_then(|g| g.i64("TimeMode")) else {
        return DEFAULT_FPS;
    };
    if mode == CUSTOM_TIME_MODE {
        return match global_settings.and_then(|g| g.f64("CustomFrameRate")) {
            Some(fps) if fps > 0.0 && fps.is_finite() => fps,
            _ => DEFAULT_FPS,
        };
    }
    usize::try_from(mode)
        .ok()
        .and_then(|m| TIME_MODE_FPS.get(m))
        .copied()
        .unwrap_or(DEFAULT_FPS)
}

/// Transform channel animated by a curve node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Channel {
    Translation,
    Rotation,
    Scale,
}

impl Channel {
    pub fn from_attr_name(name: &str) -> Option<Self> {
        match name {
            "T" => Some(Channel::Translation),
            "R" => Some(Channel::Rotation),
            "S" => Some(Channel::Scale),
            _ if name.contains("Translation") => Some(Channel::Translation),
            _ if name.contains("Rotation") => Some(Channel::Rotation),
            _ if name.contains("Scaling") => Some(Channel::Scale),
            _ => None,
        }
    }
}

/// Key samples of one axis. Times are in seconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Curve {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Curve {
    /// One zero sample at time zero.
    fn zero() -> Self {
        Self {
            times: vec![0.0],
            values: vec![0.0],
        }
    }

    fn read(node: &Node) -> Option<Self> {
        let times = node.child_array("KeyTime")?;
        let values = node.child_array("KeyValueFloat")?;
        Some(Self {
            times: times.iter().map(|&t| ticks_to_seconds(t)).collect(),
            values: values.into_owned(),
        })
    }

    fn value(&self, frame: usize) -> Option<f64> {
        self.values.get(frame).copied()
    }
}

/// A curve node bound to one bone of the animation hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct CurveNode {
    pub id: i64,
    pub channel: Channel,
    /// Axes named by the node's own default-value properties
    pub populated: [bool; 3],
    /// Index into `Scene::animation_nodes`
    pub bone: usize,
    /// Pre-rotation of the bound model, radians
    pub pre_rotation: Option<Vec3>,
    pub curves: [Option<Curve>; 3],
}

impl CurveNode {
    /// Values of all three axes at `frame`, if every axis has a curve with a
    /// sample at that index.
    pub fn sample(&self, frame: usize) -> Option<[f64; 3]> {
        let [x, y, z] = &self.curves;
        Some([
            x.as_ref()?.value(frame)?,
            y.as_ref()?.value(frame)?,
            z.as_ref()?.value(frame)?,
        ])
    }

    /// Earliest first time and latest last time over the present curves.
    fn span(&self) -> Option<(f64, f64)> {
        self.curves
            .iter()
            .flatten()
            .filter_map(|c| Some((*c.times.first()?, *c.times.last()?)))
            .reduce(|(lo, hi), (first, last)| (lo.min(first), hi.max(last)))
    }

    /// Complete missing axes with zero curves, convert degrees to radians and
    /// fold in the pre-rotation.
    fn prepare_rotation(&mut self) {
        for axis in &mut self.curves {
            let curve = axis.get_or_insert_with(Curve::zero);
            for v in &mut curve.values {
                *v = v.to_radians();
            }
        }

        let Some(pre) = self.pre_rotation else {
            return;
        };
        let pre = euler_zyx_to_quat(pre);
        let [Some(x), Some(y), Some(z)] = &mut self.curves else {
            return;
        };
        for frame in 0..x.times.len() {
            let euler = Vec3::new(
                x.value(frame).unwrap_or(0.0) as f32,
                y.value(frame).unwrap_or(0.0) as f32,
                z.value(frame).unwrap_or(0.0) as f32,
            );
            let rotated = quat_to_euler_zyx(pre * euler_zyx_to_quat(euler));
            for (curve, v) in [(&mut *x, rotated.x), (&mut *y, rotated.y), (&mut *z, rotated.z)] {
                if let Some(slot) = curve.values.get_mut(frame) {
                    *slot = v as f64;
                }
            }
        }
    }
}

/// Curve nodes of one bone within a layer, as indices into the curve node list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct BoneChannels {
    translation: Option<usize>,
    rotation: Option<usize>,
    scale: Option<usize>,
}

impl BoneChannels {
    fn set(&mut self, channel: Channel, node: usize) {
        match channel {
            Channel::Translation => self.translation = Some(node),
            Channel::Rotation => self.rotation = Some(node),
            Channel::Scale => self.scale = Some(node),
        }
    }

    fn iter(&self) -> impl Iterator<Item = usize> {
        [self.rotation, self.scale, self.translation].into_iter().flatten()
    }
}

/// `bone index -> channels`
type Layer = HashMap<usize, BoneChannels>;

/// One baked key.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Keyframe {
    pub time: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Keyframe {
    fn from_transform(time: f32, transform: &Transform) -> Self {
        Self {
            time,
            position: transform.translation,
            rotation: transform.rotation,
            scale: transform.scale,
        }
    }

    fn to_transform(self) -> Transform {
        Transform {
            translation: self.position,
            rotation: self.rotation,
            scale: self.scale,
        }
    }

    fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

/// Keys of one node of the animation hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Track {
    /// Index into `Scene::nodes`
    pub node: usize,
    /// Node name without any `Namespace:` prefix
    pub name: String,
    /// Index of the parent track
    pub parent: Option<usize>,
    pub keys: Vec<Keyframe>,
}

/// A baked animation stack.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnimationClip {
    pub name: String,
    pub fps: f64,
    /// Seconds
    pub duration: f64,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    /// Frames baked per track.
    pub fn frame_count(&self) -> usize {
        self.tracks.first().map_or(0, |t| t.keys.len())
    }

    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }
}

fn strip_namespace(name: &str) -> &str {
    name.rfind(':').map_or(name, |i| &name[i + 1..])
}

/// Overwrite components whose sample is non-zero and not NaN.
fn overwrite_set_axes(target: &mut Vec3, values: [f64; 3]) {
    for (axis, v) in values.into_iter().enumerate() {
        if v != 0.0 && !v.is_nan() {
            target[axis] = v as f32;
        }
    }
}

struct CurveSet {
    nodes: Vec<CurveNode>,
    by_id: HashMap<i64, usize>,
}

impl CurveSet {
    fn load(
        objects: &Node,
        graph: &ConnectionGraph,
        bones: &HashMap<i64, usize>,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut set = CurveSet {
            nodes: Vec::new(),
            by_id: HashMap::new(),
        };

        for node in objects.children_named("AnimationCurveNode") {
            let Some(id) = node.object_id() else {
                continue;
            };
            let Some(channel) = Channel::from_attr_name(&node.attr_name) else {
                log::debug!("Skipping curve node {} ({})", id, node.attr_name);
                continue;
            };

            let mut populated = [false; 3];
            for key in node.properties.keys() {
                for (flag, axis) in populated.iter_mut().zip(['X', 'Y', 'Z']) {
                    *flag |= key.contains(axis);
                }
            }

            // The last listed parent that is a model wins
            let Some((model_id, bone)) = graph
                .parents(id)
                .iter()
                .rev()
                .find_map(|p| bones.get(&p.id).map(|&b| (p.id, b)))
            else {
                diagnostics.warn(
                    DiagnosticKind::Animation,
                    format!("Curve node {} is not connected to any model", id),
                );
                continue;
            };
            let pre_rotation = objects
                .child_by_id("Model", model_id)
                .and_then(|m| m.vec3("PreRotation"))
                .map(deg_to_rad);

            set.by_id.insert(id, set.nodes.len());
            set.nodes.push(CurveNode {
                id,
                channel,
                populated,
                bone,
                pre_rotation,
                curves: [None, None, None],
            });
        }

        set.attach_curves(objects, graph, diagnostics);
        for node in &mut set.nodes {
            if node.channel == Channel::Rotation {
                node.prepare_rotation();
            }
        }
        set
    }

    fn attach_curves(
        &mut self,
        objects: &Node,
        graph: &ConnectionGraph,
        diagnostics: &mut Diagnostics,
    ) {
        for node in objects.children_named("AnimationCurve") {
            let Some(id) = node.object_id() else {
                continue;
            };
            let Some(parent) = graph.parents(id).first() else {
                continue;
            };
            let axis = if parent.label.contains('X') {
                0
            } else if parent.label.contains('Y') {
                1
            } else if parent.label.contains('Z') {
                2
            } else {
                continue;
            };

            let Some(&target) = self.by_id.get(&parent.id) else {
                // Curves of skipped channels (visibility, camera settings) land here
                if objects.child_by_id("AnimationCurveNode", parent.id).is_none() {
                    diagnostics.warn(
                        DiagnosticKind::Animation,
                        format!("Curve {} is bound to {}, which is not a curve node", id, parent.id),
                    );
                }
                continue;
            };
            let Some(curve) = Curve::read(node) else {
                diagnostics.warn(
                    DiagnosticKind::Animation,
                    format!("Curve {} has no KeyTime/KeyValueFloat arrays", id),
                );
                continue;
            };
            self.nodes[target].curves[axis] = Some(curve);
        }
    }

    fn layer(&self, graph: &ConnectionGraph, id: i64) -> Layer {
        let mut layer = Layer::new();
        for child in graph.children(id) {
            if let Some(&index) = self.by_id.get(&child.id) {
                let node = &self.nodes[index];
                layer.entry(node.bone).or_default().set(node.channel, index);
            }
        }
        layer
    }

    /// Latest last time minus earliest first time over every curve of `layers`.
    fn duration(&self, layers: &[&Layer]) -> f64 {
        let mut max = 0.0f64;
        let mut min = f64::MAX;
        for channels in layers.iter().flat_map(|l| l.values()) {
            for (first, last) in channels.iter().filter_map(|i| self.nodes[i].span()) {
                min = min.min(first);
                max = max.max(last);
            }
        }
        max - min
    }

    fn sample_key(
        &self,
        time: f32,
        live: &Transform,
        channels: &BoneChannels,
        frame: usize,
    ) -> Result<Keyframe, String> {
        let mut key = Keyframe::from_transform(time, live);

        if let Some(values) = channels.translation.and_then(|i| self.nodes[i].sample(frame)) {
            overwrite_set_axes(&mut key.position, values);
        }
        if let Some(values) = channels.rotation.and_then(|i| self.nodes[i].sample(frame)) {
            let mut euler = live.euler_zyx();
            overwrite_set_axes(&mut euler, values);
            key.rotation = euler_zyx_to_quat(euler);
        }
        if let Some(values) = channels.scale.and_then(|i| self.nodes[i].sample(frame)) {
            overwrite_set_axes(&mut key.scale, values);
        }

        if key.is_finite() {
            Ok(key)
        } else {
            Err(format!("non-finite sample at frame {}", frame))
        }
    }
}

/// Bake one stack over the scene's animation hierarchy.
fn bake(
    name: &str,
    duration: f64,
    fps: f64,
    layer: Option<&Layer>,
    curves: &CurveSet,
    scene: &mut Scene,
    diagnostics: &mut Diagnostics,
) -> AnimationClip {
    let hierarchy = scene.animation_nodes.clone();
    let mut tracks: Vec<Track> = hierarchy
        .iter()
        .map(|&n| {
            let node = &scene.nodes[n];
            Track {
                node: n,
                name: strip_namespace(&node.name).to_string(),
                parent: node
                    .parent
                    .and_then(|p| hierarchy.iter().position(|&h| h == p)),
                keys: Vec::new(),
            }
        })
        .collect();

    let last_frame = (duration * fps).ceil() as usize;
    for frame in 0..=last_frame {
        let time = (frame as f64 / fps) as f32;
        for (bone, &n) in hierarchy.iter().enumerate() {
            let live = scene.nodes[n].transform;
            let key = match layer.and_then(|l| l.get(&bone)) {
                None => Keyframe::from_transform(time, &live),
                Some(channels) => match curves.sample_key(time, &live, channels, frame) {
                    Ok(key) => key,
                    Err(reason) => {
                        diagnostics.warn(
                            DiagnosticKind::Animation,
                            format!("Clip {}, bone {}: {}", name, tracks[bone].name, reason),
                        );
                        Keyframe::from_transform(time, &live)
                    }
                },
            };
            scene.nodes[n].transform = key.to_transform();
            tracks[bone].keys.push(key);
        }
    }

    AnimationClip {
        name: name.to_string(),
        fps,
        duration,
        tracks,
    }
}

/// Extract and bake every animation stack with a positive time span.
///
/// Bones are the entries of `scene.animation_nodes`; their transforms are
/// updated as frames are baked.
pub fn extract_animations(
    objects: &Node,
    graph: &ConnectionGraph,
    global_settings: Option<&Node>,
    scene: &mut Scene,
    diagnostics: &mut Diagnostics,
) -> Vec<AnimationClip> {
    if objects.child_group("AnimationStack").is_none() {
        return Vec::new();
    }

    let fps = frame_rate(global_settings);
    let bones: HashMap<i64, usize> = scene
        .animation_nodes
        .iter()
        .enumerate()
        .filter_map(|(bone, &n)| scene.nodes[n].id.map(|id| (id, bone)))
        .collect();

    let curves = CurveSet::load(objects, graph, &bones, diagnostics);
    let layers: HashMap<i64, Layer> = objects
        .children_named("AnimationLayer")
        .filter_map(|n| n.object_id())
        .map(|id| (id, curves.layer(graph, id)))
        .collect();

    let mut clips = Vec::new();
    for stack in objects.children_named("AnimationStack") {
        let Some(id) = stack.object_id() else {
            continue;
        };
        let stack_layers: Vec<&Layer> = graph
            .children(id)
            .iter()
            .filter_map(|c| layers.get(&c.id))
            .collect();

        let duration = curves.duration(&stack_layers);
        if duration <= 0.0 {
            log::debug!("Animation stack {} has no time span, skipped", stack.attr_name);
            continue;
        }

        let clip = bake(
            &stack.attr_name,
            duration,
            fps,
            stack_layers.first().copied(),
            &curves,
            scene,
            diagnostics,
        );
        log::debug!(
            "Baked clip {} ({:.3}s at {} fps, {} frames)",
            clip.name,
            clip.duration,
            clip.fps,
            clip.frame_count()
        );
        clips.push(clip);
    }
    clips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Array, NodeId, RawConnection, Value};
    use crate::scene::{NodeKind, SceneNode};

    fn object(name: &str, id: i64, attr_name: &str) -> Node {
        let mut n = Node::new(name);
        n.id = NodeId::Int(id);
        n.attr_name = attr_name.to_string();
        n
    }

    fn array_child(name: &str, values: Vec<f64>) -> Node {
        let mut n = Node::new(name);
        n.set_property("a", Value::Array(Array::Double(values)));
        n
    }

    fn curve(id: i64, seconds: &[f64], values: &[f64]) -> Node {
        let mut n = object("AnimationCurve", id, "");
        n.add_child(array_child(
            "KeyTime",
            seconds.iter().map(|s| s * TICKS_PER_SECOND).collect(),
        ));
        n.add_child(array_child("KeyValueFloat", values.to_vec()));
        n
    }

    fn conn(child: i64, parent: i64, label: &str) -> RawConnection {
        RawConnection {
            child,
            parent,
            label: label.to_string(),
        }
    }

    fn scene_with_model(id: i64) -> Scene {
        let mut scene = Scene::default();
        let n = scene.add_node(SceneNode::new(Some(id), "rig_Hips", NodeKind::Bone));
        scene.roots.push(n);
        scene.animation_nodes.push(n);
        scene
    }

    fn translation_setup() -> (Node, ConnectionGraph) {
        let mut objects = Node::new("Objects");
        objects.add_child(object("Model", 10, "rig:Hips"));
        let mut curve_node = object("AnimationCurveNode", 20, "T");
        curve_node.set_property("d|X", Value::Float(0.0));
        curve_node.set_property("d|Y", Value::Float(0.0));
        curve_node.set_property("d|Z", Value::Float(0.0));
        objects.add_child(curve_node);
        objects.add_child(curve(31, &[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0]));
        objects.add_child(curve(32, &[0.0, 1.0, 2.0], &[0.0, 0.0, 0.0]));
        objects.add_child(curve(33, &[0.0, 1.0, 2.0], &[5.0, 5.0, 5.0]));
        objects.add_child(object("AnimationLayer", 40, "BaseLayer"));
        objects.add_child(object("AnimationStack", 50, "Take 001"));

        let graph = ConnectionGraph::build(&[
            conn(20, 10, "Lcl Translation"),
            conn(31, 20, "d|X"),
            conn(32, 20, "d|Y"),
            conn(33, 20, "d|Z"),
            conn(20, 40, ""),
            conn(40, 50, ""),
        ]);
        (objects, graph)
    }

    #[test]
    fn test_frame_rate_table() {
        let mut settings = Node::new("GlobalSettings");
        assert_eq!(frame_rate(Some(&settings)), 30.0);

        settings.set_property("TimeMode", Value::Int(3));
        assert_eq!(frame_rate(Some(&settings)), 60.0);
        settings.set_property("TimeMode", Value::Int(11));
        assert_eq!(frame_rate(Some(&settings)), 24.0);
        settings.set_property("TimeMode", Value::Int(40));
        assert_eq!(frame_rate(Some(&settings)), 30.0);

        settings.set_property("TimeMode", Value::Int(14));
        assert_eq!(frame_rate(Some(&settings)), 30.0);
        settings.set_property("CustomFrameRate", Value::Float(-1.0));
        assert_eq!(frame_rate(Some(&settings)), 30.0);
        settings.set_property("CustomFrameRate", Value::Float(12.0));
        assert_eq!(frame_rate(Some(&settings)), 12.0);
        assert_eq!(frame_rate(None), 30.0);
    }

    #[test]
    fn test_ticks_to_seconds() {
        assert!((ticks_to_seconds(46_186_158_000.0) - 1.0).abs() < 1e-12);
        assert_eq!(ticks_to_seconds(0.0), 0.0);
        assert!((ticks_to_seconds(1_539_538_600.0) - 1.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::from_attr_name("T"), Some(Channel::Translation));
        assert_eq!(Channel::from_attr_name("Lcl Rotation"), Some(Channel::Rotation));
        assert_eq!(Channel::from_attr_name("Visibility"), None);
        assert_eq!(strip_namespace("rig:Hips"), "Hips");
        assert_eq!(strip_namespace("Hips"), "Hips");
    }

    #[test]
    fn test_bake_translation_accumulates() {
        let (objects, graph) = translation_setup();
        let mut scene = scene_with_model(10);
        let mut diags = Diagnostics::new();

        let clips = extract_animations(&objects, &graph, None, &mut scene, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(clips.len(), 1);

        let clip = &clips[0];
        assert_eq!(clip.name, "Take 001");
        assert!((clip.duration - 2.0).abs() < 1e-9);
        assert_eq!(clip.frame_count(), 61);

        let keys = &clip.tracks[0].keys;
        // Zero samples keep the live value
        assert_eq!(keys[0].position, Vec3::new(1.0, 0.0, 5.0));
        assert_eq!(keys[2].position, Vec3::new(3.0, 0.0, 5.0));
        // Frames past the last sample repeat the previous frame
        assert_eq!(keys[3].position, Vec3::new(3.0, 0.0, 5.0));
        assert_eq!(keys[60].position, Vec3::new(3.0, 0.0, 5.0));
        assert!((keys[30].time - 1.0).abs() < 1e-6);
        assert_eq!(scene.nodes[0].transform.translation, Vec3::new(3.0, 0.0, 5.0));
    }

    #[test]
    fn test_rotation_missing_axes_default_to_zero() {
        let mut objects = Node::new("Objects");
        objects.add_child(object("Model", 10, "Hips"));
        objects.add_child(object("AnimationCurveNode", 21, "R"));
        objects.add_child(curve(34, &[0.0, 1.0], &[90.0, 90.0]));
        let graph = ConnectionGraph::build(&[conn(21, 10, "Lcl Rotation"), conn(34, 21, "d|X")]);

        let mut diags = Diagnostics::new();
        let mut bones = HashMap::new();
        bones.insert(10, 0);
        let set = CurveSet::load(&objects, &graph, &bones, &mut diags);

        let node = &set.nodes[0];
        assert_eq!(node.populated, [false, false, false]);
        let x = node.curves[0].as_ref().unwrap();
        assert!((x.values[0] - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(node.curves[1].as_ref().unwrap().values, vec![0.0]);
        // Axis y and z only have frame 0
        assert!(node.sample(0).is_some());
        assert!(node.sample(1).is_none());
    }

    #[test]
    fn test_pre_rotation_folds_into_samples() {
        let mut objects = Node::new("Objects");
        let mut model = object("Model", 10, "Hips");
        model.set_property("PreRotation", Value::Array(Array::Double(vec![0.0, 0.0, 90.0])));
        objects.add_child(model);
        objects.add_child(object("AnimationCurveNode", 21, "R"));
        objects.add_child(curve(34, &[0.0], &[0.0]));
        objects.add_child(curve(35, &[0.0], &[0.0]));
        objects.add_child(curve(36, &[0.0], &[0.0]));
        let graph = ConnectionGraph::build(&[
            conn(21, 10, "Lcl Rotation"),
            conn(34, 21, "d|X"),
            conn(35, 21, "d|Y"),
            conn(36, 21, "d|Z"),
        ]);

        let mut diags = Diagnostics::new();
        let mut bones = HashMap::new();
        bones.insert(10, 0);
        let set = CurveSet::load(&objects, &graph, &bones, &mut diags);
        let [x, y, z] = set.nodes[0].sample(0).unwrap();
        assert!(x.abs() < 1e-5 && y.abs() < 1e-5);
        assert!((z - std::f64::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_unbound_curve_node_is_reported() {
        let mut objects = Node::new("Objects");
        objects.add_child(object("AnimationCurveNode", 22, "S"));
        objects.add_child(object("AnimationStack", 50, "Take"));
        let graph = ConnectionGraph::build(&[]);
        let mut scene = scene_with_model(10);
        let mut diags = Diagnostics::new();

        let clips = extract_animations(&objects, &graph, None, &mut scene, &mut diags);
        assert!(clips.is_empty());
        assert_eq!(diags.count(DiagnosticKind::Animation), 1);
    }

    #[test]
    fn test_curve_on_non_curve_node_is_reported() {
        let mut objects = Node::new("Objects");
        objects.add_child(curve(37, &[0.0], &[1.0]));
        let graph = ConnectionGraph::build(&[conn(37, 99, "d|X")]);
        let mut diags = Diagnostics::new();
        let set = CurveSet::load(&objects, &graph, &HashMap::new(), &mut diags);
        assert!(set.nodes.is_empty());
        assert_eq!(diags.count(DiagnosticKind::Animation), 1);
    }

    #[test]
    fn test_zero_span_stack_has_no_clip() {
        let (mut objects, graph) = translation_setup();
        objects.children.remove("AnimationCurve");
        let mut scene = scene_with_model(10);
        let mut diags = Diagnostics::new();
        let clips = extract_animations(&objects, &graph, None, &mut scene, &mut diags);
        assert!(clips.is_empty());
    }
}
