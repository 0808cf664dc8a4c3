//! Command-line inspector for FBX files.
//!
//! Run with: cargo run -p fbx_inspect -- [--json] [--images] path/to/model.fbx

use std::cell::RefCell;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fbx_core::{
    decode_with_options, LoadOptions, NodeKind, ResolvedResource, ResourceResolver, Scene,
    TextureSource,
};
use fbx_math::Vec3;

/// Reads external textures relative to the FBX file's directory.
struct FileResolver {
    base_dir: PathBuf,
    /// Resolved payloads by path as written in the file
    cache: RefCell<HashMap<String, ResolvedResource>>,
}

impl FileResolver {
    fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let normalized = path.replace('\\', "/");
        let path = Path::new(&normalized);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl ResourceResolver for FileResolver {
    fn resolve(&self, path: &str) -> ResolvedResource {
        if let Some(cached) = self.cache.borrow().get(path) {
            return cached.clone();
        }

        let full_path = self.resolve_path(path);
        let resolved = match fs::read(&full_path) {
            Ok(bytes) => {
                log::debug!(
                    "Loaded texture: {} ({:.1} KB)",
                    full_path.display(),
                    bytes.len() as f32 / 1024.0
                );
                ResolvedResource::Loaded(bytes)
            }
            Err(e) => {
                log::warn!("Texture {} not available: {}", full_path.display(), e);
                ResolvedResource::Pending
            }
        };

        self.cache
            .borrow_mut()
            .insert(path.to_string(), resolved.clone());
        resolved
    }
}

struct Args {
    path: PathBuf,
    json: bool,
    images: bool,
}

fn parse_args() -> Result<Args> {
    let mut path = None;
    let mut json = false;
    let mut images = false;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            "--images" => images = true,
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            _ if path.is_some() => bail!("only one input file is supported"),
            _ => path = Some(PathBuf::from(arg)),
        }
    }

    let Some(path) = path else {
        bail!("Usage: fbx_inspect [--json] [--images] <path-to-fbx-file>");
    };
    Ok(Args { path, json, images })
}

fn print_report(scene: &Scene) {
    println!("{}", scene.summary());

    println!("\nNodes:");
    let mut stack: Vec<(usize, usize)> = scene.roots.iter().rev().map(|&r| (r, 0)).collect();
    while let Some((index, depth)) = stack.pop() {
        let node = &scene.nodes[index];
        let pos = node.world.transform_point3(Vec3::ZERO);
        println!(
            "{}{} [{}] ({:.2}, {:.2}, {:.2})",
            "  ".repeat(depth + 1),
            if node.name.is_empty() { "<unnamed>" } else { node.name.as_str() },
            node.kind.label(),
            pos.x,
            pos.y,
            pos.z
        );
        stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
    }

    if !scene.geometries.is_empty() {
        println!("\nGeometries:");
        for geometry in &scene.geometries {
            println!(
                "  {} {:?}: {} vertices, {} triangles, {} uv sets{}",
                geometry.id,
                geometry.kind,
                geometry.vertex_count(),
                geometry.triangle_count(),
                geometry.uvs.len(),
                if geometry.is_skinned() { ", skinned" } else { "" }
            );
        }
    }

    if !scene.materials.is_empty() {
        println!("\nMaterials:");
        for material in &scene.materials {
            let name = if material.name.is_empty() { "<default>" } else { material.name.as_str() };
            println!(
                "  {} {:?}{}{}",
                name,
                material.kind,
                if material.has_textures() { ", textured" } else { "" },
                if material.transparent { ", transparent" } else { "" }
            );
        }
    }

    if !scene.textures.is_empty() {
        println!("\nTextures:");
        for texture in &scene.textures {
            let source = match &texture.source {
                TextureSource::Embedded(image) => {
                    format!("embedded {}", scene.images[*image].file_name)
                }
                TextureSource::External { path, .. } if texture.is_pending() => {
                    format!("{} (missing)", path)
                }
                TextureSource::External { path, .. } => path.clone(),
            };
            println!("  {}: {}", texture.name, source);
        }
    }

    let skinned = scene
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::SkinnedMesh(_)))
        .count();
    if !scene.skeletons.is_empty() {
        println!(
            "\nSkeletons: {} ({} skinned meshes)",
            scene.skeletons.len(),
            skinned
        );
    }

    for clip in &scene.animations {
        println!(
            "\nClip {}: {:.2}s at {} fps, {} frames, {} tracks",
            clip.name,
            clip.duration,
            clip.fps,
            clip.frame_count(),
            clip.tracks.len()
        );
    }

    if !scene.diagnostics.is_empty() {
        println!("\nDiagnostics:");
        for diagnostic in &scene.diagnostics {
            println!("  {:?}: {}", diagnostic.kind, diagnostic.message);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let args = parse_args()?;
    let bytes =
        fs::read(&args.path).with_context(|| format!("Failed to read {}", args.path.display()))?;

    let base_dir = args
        .path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let options = LoadOptions::default()
        .with_resolver(FileResolver::new(base_dir))
        .with_embedded_image_decoding(args.images);

    let scene = decode_with_options(&bytes, &options).with_context(|| {
        format!("Failed to decode {}", args.path.display())
    })?;

    if args.json {
        let json = serde_json::to_string_pretty(&scene).context("Failed to serialize scene")?;
        println!("{}", json);
    } else {
        print_report(&scene);
    }
    Ok(())
}
