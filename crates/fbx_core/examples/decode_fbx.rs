//! Example: Decode and inspect an FBX file.
//!
//! Run with: cargo run --example decode_fbx -- path/to/model.fbx

use std::env;
use std::fs;

use fbx_core::{decode, NodeKind};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: decode_fbx <path-to-fbx-file>");
        println!("\nExample:");
        println!("  cargo run --example decode_fbx -- assets/character.fbx");
        return;
    }

    let path = &args[1];
    println!("Decoding FBX file: {}", path);

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    };

    match decode(&bytes) {
        Ok(scene) => {
            println!("\n=== {} ===", scene.summary());

            println!("\n--- Geometries ---");
            for (i, geometry) in scene.geometries.iter().enumerate() {
                println!(
                    "  [{}] {} - {} vertices, {} triangles, {} groups{}",
                    i,
                    geometry.name,
                    geometry.vertex_count(),
                    geometry.triangle_count(),
                    geometry.groups.len(),
                    if geometry.is_skinned() { ", skinned" } else { "" }
                );
            }

            println!("\n--- Nodes ---");
            for (i, node) in scene.nodes.iter().enumerate() {
                let pos = node.world.transform_point3(fbx_math::Vec3::ZERO);
                println!(
                    "  [{}] {} ({}) at ({:.2}, {:.2}, {:.2})",
                    i,
                    node.name,
                    node.kind.label(),
                    pos.x,
                    pos.y,
                    pos.z
                );
                if let NodeKind::SkinnedMesh(mesh) = &node.kind {
                    if let Some(skin) = mesh.skin {
                        let bones = scene.skeletons[skin.skeleton].bones.len();
                        println!("       Bound to skeleton {} ({} bones)", skin.skeleton, bones);
                    }
                }
            }

            println!("\n--- Clips ---");
            for clip in &scene.animations {
                println!(
                    "  {} - {:.2}s at {} fps, {} tracks, {} frames",
                    clip.name,
                    clip.duration,
                    clip.fps,
                    clip.tracks.len(),
                    clip.frame_count()
                );
            }

            if !scene.diagnostics.is_empty() {
                println!("\n--- Diagnostics ---");
                for diagnostic in &scene.diagnostics {
                    println!("  {:?}: {}", diagnostic.kind, diagnostic.message);
                }
            }
        }
        Err(e) => {
            eprintln!("Error decoding FBX ({:?}): {}", e.class(), e);
            std::process::exit(1);
        }
    }
}
