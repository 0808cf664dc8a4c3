//! FBX Core - Binary and ASCII FBX scene decoding.
//!
//! This crate provides:
//!
//! - **Document parsing**: binary (`Kaydara FBX Binary`) and text encodings
//!   into one generic node tree
//! - **Scene assembly**: transform hierarchy, cameras, lights, triangulated
//!   meshes, skeletons with skin weights, materials and texture references
//! - **Animation**: frame-rate resolution and per-frame clip baking
//!
//! Decoding performs no I/O. External texture payloads are fetched through an
//! optional [`ResourceResolver`] supplied in [`LoadOptions`].
//!
//! # Example
//!
//! ```ignore
//! use fbx_core::decode;
//!
//! let bytes = std::fs::read("character.fbx")?;
//! let scene = decode(&bytes)?;
//! println!("{}", scene.summary());
//! for clip in &scene.animations {
//!     println!("{}: {:.2}s at {} fps", clip.name, clip.duration, clip.fps);
//! }
//! ```

pub mod animation;
pub mod connections;
pub mod deformer;
pub mod diagnostics;
pub mod document;
pub mod geometry;
pub mod loader;
pub mod material;
pub mod scene;
pub mod texture;

// Re-export commonly used types
pub use animation::{AnimationClip, Keyframe, Track};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use document::{parse_document, Document, DocumentError, ErrorClass};
pub use geometry::{Geometry, GeometryKind, MaterialGroup};
pub use loader::{decode, decode_with_options, LoadError, LoadOptions, LoadResult};
pub use material::{Material, MaterialKind};
pub use scene::{Camera, Light, LightKind, NodeKind, Scene, SceneNode, SceneSummary, Transform};
pub use texture::{Image, ResolvedResource, ResourceResolver, Texture, TextureSource};
