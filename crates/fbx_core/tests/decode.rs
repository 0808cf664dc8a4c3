//! End-to-end decoding of small synthesized documents.

mod common;

use common::*;
use fbx_core::{
    decode, decode_with_options, Camera, DiagnosticKind, ErrorClass, GeometryKind, LightKind,
    LoadOptions, MaterialKind, NodeKind, ResolvedResource, TextureSource,
};
use fbx_math::Vec3;

fn quad_document(version: u32) -> Vec<u8> {
    DocumentBuilder::new(version)
        .object(model(100, "Quad", "Mesh", [0.0, 0.0, 0.0]))
        .object(mesh_geometry(200, &QUAD, &[0, 1, 2, -4]))
        .connect(100, 0, "")
        .connect(200, 100, "")
        .build()
}

fn assert_vec3_eq(actual: Vec3, expected: Vec3) {
    assert!(
        (actual - expected).length() < 1e-5,
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

#[test]
fn test_quad_mesh_both_record_widths() {
    for version in [7400, 7500] {
        let scene = decode(&quad_document(version)).unwrap();

        assert_eq!(scene.geometries.len(), 1);
        let geometry = &scene.geometries[0];
        assert_eq!(geometry.kind, GeometryKind::Mesh);
        assert_eq!(geometry.triangle_count(), 2);
        assert_eq!(geometry.positions.len(), 6);
        assert_vec3_eq(geometry.positions[4], Vec3::new(1.0, 1.0, 0.0));
        assert!(geometry.skin.is_none());

        assert_eq!(scene.nodes.len(), 1);
        assert_eq!(scene.roots, vec![0]);
        let node = &scene.nodes[0];
        assert_eq!(node.name, "Quad");
        assert_eq!(node.id, Some(100));
        match &node.kind {
            NodeKind::Mesh(mesh) => {
                assert_eq!(mesh.geometry, 0);
                assert_eq!(mesh.materials.len(), 1);
            }
            other => panic!("expected a mesh, got {:?}", other),
        }
        assert_eq!(scene.materials.len(), 1);
        assert!(scene.diagnostics.is_empty(), "{:?}", scene.diagnostics);
    }
}

#[test]
fn test_hierarchy_world_matrices() {
    let bytes = DocumentBuilder::new(7400)
        .object(model(1, "Root", "Null", [1.0, 0.0, 0.0]))
        .object(model(2, "Child", "Null", [0.0, 2.0, 0.0]))
        .connect(1, 0, "")
        .connect(2, 1, "")
        .build();
    let scene = decode(&bytes).unwrap();

    let child = scene.find_by_name("Child").unwrap();
    let root = scene.find_by_name("Root").unwrap();
    assert_eq!(scene.nodes[child].parent, Some(root));
    assert_eq!(scene.roots, vec![root]);
    assert_vec3_eq(
        scene.nodes[child].world.transform_point3(Vec3::ZERO),
        Vec3::new(1.0, 2.0, 0.0),
    );
}

#[test]
fn test_truncated_binary_is_structural() {
    let vertices = vec![0.5; 600];
    let bytes = DocumentBuilder::new(7400)
        .object(mesh_geometry(200, &vertices, &[0, 1, 2, -4]))
        .build();
    let err = decode(&bytes[..500]).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Structural);
}

#[test]
fn test_garbage_is_rejected() {
    let err = decode(b"not an fbx file at all").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Format);
}

#[test]
fn test_missing_objects_section() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[0x1a, 0x00]);
    bytes.extend_from_slice(&7400u32.to_le_bytes());
    bytes.extend(std::iter::repeat(0).take(13 + 176));
    let err = decode(&bytes).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Structural);
}

#[cfg(feature = "deflate")]
#[test]
fn test_compressed_arrays() {
    let geometry = Record::object("Geometry", 200, "", "Mesh")
        .with("Vertices", Prop::PackedDoubles(QUAD.to_vec()))
        .with("PolygonVertexIndex", Prop::PackedInts(vec![0, 1, 2, -4]));
    let bytes = DocumentBuilder::new(7500)
        .object(model(100, "Quad", "Mesh", [0.0; 3]))
        .object(geometry)
        .connect(100, 0, "")
        .connect(200, 100, "")
        .build();
    let scene = decode(&bytes).unwrap();
    assert_eq!(scene.geometries[0].triangle_count(), 2);
    assert_vec3_eq(scene.geometries[0].positions[2], Vec3::new(1.0, 1.0, 0.0));
}

#[cfg(not(feature = "deflate"))]
#[test]
fn test_compressed_arrays_need_codec() {
    let geometry = Record::object("Geometry", 200, "", "Mesh")
        .with("Vertices", Prop::PackedDoubles(QUAD.to_vec()));
    let bytes = DocumentBuilder::new(7500).object(geometry).build();
    let err = decode(&bytes).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Capability);
}

const TEXT_HEADER: &str = "; FBX 7.4.0 project file\n\
FBXHeaderExtension:  {\n\
\tFBXVersion: 7400\n\
}\n";

#[test]
fn test_text_document_scaling_and_mesh() {
    let text = format!(
        "{}Objects:  {{\n\
         \tModel: 100, \"Model::Box\", \"Null\" {{\n\
         \t\tVersion: 232\n\
         \t\tProperties70:  {{\n\
         \t\t\tP: \"Lcl Scaling\", \"Lcl Scaling\", \"\", \"A\",2,2,2\n\
         \t\t}}\n\
         \t}}\n\
         \tModel: 101, \"Model::Tri\", \"Mesh\" {{\n\
         \t\tVersion: 232\n\
         \t}}\n\
         \tGeometry: 200, \"Geometry::\", \"Mesh\" {{\n\
         \t\tVertices: *9 {{\n\
         \t\t\ta: 0,0,0,1,0,0,\n\
         0,1,0\n\
         \t\t}}\n\
         \t\tPolygonVertexIndex: *3 {{\n\
         \t\t\ta: 0,1,-3\n\
         \t\t}}\n\
         \t}}\n\
         }}\n\
         Connections:  {{\n\
         \tC: \"OO\",100,0\n\
         \tC: \"OO\",101,100\n\
         \tC: \"OO\",200,101\n\
         }}\n",
        TEXT_HEADER
    );
    let scene = decode(text.as_bytes()).unwrap();

    let index = scene.find_by_name("Box").unwrap();
    assert_vec3_eq(scene.nodes[index].transform.scale, Vec3::splat(2.0));

    let tri = scene.find_by_name("Tri").unwrap();
    assert_eq!(scene.nodes[tri].parent, Some(index));
    assert_eq!(scene.geometries[0].triangle_count(), 1);
    assert!(matches!(scene.nodes[tri].kind, NodeKind::Mesh(_)));
}

#[test]
fn test_materials_and_external_textures() {
    let material = Record::object("Material", 300, "Skin", "")
        .with("ShadingModel", Prop::Str("phong".into()))
        .properties(vec![
            p_vector("Diffuse", "Color", [0.5, 0.25, 1.0]),
            p_number("Shininess", 12.0),
            p_number("Opacity", 0.5),
        ]);
    let texture = Record::object("Texture", 400, "skin_tex", "")
        .with("FileName", Prop::Str("C:\\maps\\skin.png".into()))
        .with("RelativeFilename", Prop::Str("textures\\skin.png".into()));
    let bytes = DocumentBuilder::new(7400)
        .object(model(100, "Body", "Mesh", [0.0; 3]))
        .object(mesh_geometry(200, &QUAD, &[0, 1, 2, -4]))
        .object(material)
        .object(texture)
        .connect(100, 0, "")
        .connect(200, 100, "")
        .connect(300, 100, "")
        .connect(400, 300, "DiffuseColor")
        .build();

    let options = LoadOptions::default().with_resolver(|path: &str| {
        if path.ends_with("skin.png") {
            ResolvedResource::Loaded(vec![1, 2, 3])
        } else {
            ResolvedResource::Pending
        }
    });
    let scene = decode_with_options(&bytes, &options).unwrap();

    assert_eq!(scene.materials.len(), 1);
    let material = &scene.materials[0];
    assert_eq!(material.kind, MaterialKind::Phong);
    assert_eq!(material.name, "Skin");
    assert_vec3_eq(material.color, Vec3::new(0.5, 0.25, 1.0));
    assert_eq!(material.shininess, 12.0);
    assert!(material.transparent);

    let texture = material.maps.map.map(|t| &scene.textures[t]).unwrap();
    assert_eq!(texture.name, "skin_tex");
    match &texture.source {
        TextureSource::External { path, payload } => {
            assert_eq!(path, "textures\\skin.png");
            assert_eq!(payload.as_deref(), Some(&[1u8, 2, 3][..]));
        }
        other => panic!("expected an external texture, got {:?}", other),
    }
    assert!(!texture.is_pending());

    match &scene.nodes[0].kind {
        NodeKind::Mesh(mesh) => assert_eq!(mesh.materials, vec![0]),
        other => panic!("expected a mesh, got {:?}", other),
    }
}

#[test]
fn test_texture_pending_without_resolver() {
    let material = Record::object("Material", 300, "Skin", "")
        .with("ShadingModel", Prop::Str("lambert".into()));
    let texture = Record::object("Texture", 400, "skin_tex", "")
        .with("FileName", Prop::Str("/abs/skin.jpg".into()));
    let bytes = DocumentBuilder::new(7400)
        .object(material)
        .object(texture)
        .connect(400, 300, "DiffuseColor")
        .build();
    let scene = decode(&bytes).unwrap();

    assert_eq!(scene.materials[0].kind, MaterialKind::Lambert);
    assert_eq!(scene.textures.len(), 1);
    assert!(scene.textures[0].is_pending());
}

#[test]
fn test_camera_and_light_attributes() {
    let camera_attr = Record::object("NodeAttribute", 500, "", "Camera").properties(vec![
        p_number("FieldOfView", 60.0),
        p_number("AspectWidth", 640.0),
        p_number("AspectHeight", 480.0),
        p_number("NearPlane", 100.0),
        p_int("CameraProjectionType", 0),
    ]);
    let light_attr = Record::object("NodeAttribute", 510, "", "Light").properties(vec![
        p_int("LightType", 2),
        p_vector("Color", "Color", [1.0, 0.5, 0.0]),
        p_number("Intensity", 200.0),
        p_number("InnerAngle", 30.0),
        p_int("CastShadows", 1),
    ]);
    let bytes = DocumentBuilder::new(7500)
        .object(model(100, "Cam", "Camera", [0.0, 0.0, 10.0]))
        .object(model(110, "Spot", "Light", [0.0, 5.0, 0.0]))
        .object(camera_attr)
        .object(light_attr)
        .connect(100, 0, "")
        .connect(110, 0, "")
        .connect(500, 100, "")
        .connect(510, 110, "")
        .build();
    let scene = decode(&bytes).unwrap();

    let cam = scene.find_by_name("Cam").unwrap();
    match scene.nodes[cam].kind {
        NodeKind::Camera(Camera::Perspective {
            fov,
            aspect,
            near,
            far,
        }) => {
            assert_eq!(fov, 60.0);
            assert!((aspect - 640.0 / 480.0).abs() < 1e-6);
            assert!((near - 0.1).abs() < 1e-6);
            assert_eq!(far, 1000.0);
        }
        ref other => panic!("expected a perspective camera, got {:?}", other),
    }

    let spot = scene.find_by_name("Spot").unwrap();
    match &scene.nodes[spot].kind {
        NodeKind::Light(light) => {
            match light.kind {
                LightKind::Spot { angle, .. } => assert!((angle - 30f32.to_radians()).abs() < 1e-6),
                other => panic!("expected a spot light, got {:?}", other),
            }
            assert_vec3_eq(light.color, Vec3::new(1.0, 0.5, 0.0));
            assert_eq!(light.intensity, 2.0);
            assert!(light.cast_shadow);
        }
        other => panic!("expected a light, got {:?}", other),
    }
    assert!(scene.diagnostics.is_empty(), "{:?}", scene.diagnostics);
}

#[test]
fn test_unknown_camera_projection_becomes_group() {
    let camera_attr = Record::object("NodeAttribute", 500, "", "Camera")
        .properties(vec![p_int("CameraProjectionType", 7)]);
    let bytes = DocumentBuilder::new(7400)
        .object(model(100, "Cam", "Camera", [0.0; 3]))
        .object(camera_attr)
        .connect(100, 0, "")
        .connect(500, 100, "")
        .build();
    let scene = decode(&bytes).unwrap();
    assert!(matches!(scene.nodes[0].kind, NodeKind::Group));
    assert_eq!(scene.summary().diagnostics, 1);
    assert_eq!(scene.diagnostics[0].kind, DiagnosticKind::Schema);
}

#[test]
fn test_ambient_light_from_global_settings() {
    let settings = Record::new("GlobalSettings")
        .properties(vec![p_vector("AmbientColor", "ColorRGB", [0.2, 0.2, 0.2])]);
    let bytes = DocumentBuilder::new(7400)
        .section(settings)
        .object(model(1, "Root", "Null", [0.0; 3]))
        .connect(1, 0, "")
        .build();
    let scene = decode(&bytes).unwrap();

    assert_eq!(scene.roots.len(), 2);
    let ambient = *scene.roots.last().unwrap();
    match &scene.nodes[ambient].kind {
        NodeKind::Light(light) => {
            assert_eq!(light.kind, LightKind::Ambient);
            assert_vec3_eq(light.color, Vec3::splat(0.2));
        }
        other => panic!("expected an ambient light, got {:?}", other),
    }
}

#[test]
fn test_black_ambient_is_ignored() {
    let settings = Record::new("GlobalSettings")
        .properties(vec![p_vector("AmbientColor", "ColorRGB", [0.0, 0.0, 0.0])]);
    let bytes = DocumentBuilder::new(7400).section(settings).build();
    let scene = decode(&bytes).unwrap();
    assert!(scene.nodes.is_empty());
}

#[test]
fn test_mesh_without_geometry_is_group() {
    let bytes = DocumentBuilder::new(7400)
        .object(model(100, "Empty", "Mesh", [0.0; 3]))
        .connect(100, 0, "")
        .build();
    let scene = decode(&bytes).unwrap();
    assert!(matches!(scene.nodes[0].kind, NodeKind::Group));
    assert_eq!(
        scene
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Reference)
            .count(),
        1
    );
}

#[test]
fn test_geometric_translation_offsets_geometry() {
    let mesh_model = Record::object("Model", 100, "Quad", "Mesh")
        .with("Version", Prop::Int(232))
        .properties(vec![p_vector(
            "GeometricTranslation",
            "Vector3D",
            [0.0, 0.0, 3.0],
        )]);
    let bytes = DocumentBuilder::new(7400)
        .object(mesh_model)
        .object(mesh_geometry(200, &QUAD, &[0, 1, 2, -4]))
        .connect(100, 0, "")
        .connect(200, 100, "")
        .build();
    let scene = decode(&bytes).unwrap();
    assert_vec3_eq(scene.geometries[0].positions[0], Vec3::new(0.0, 0.0, 3.0));
}
