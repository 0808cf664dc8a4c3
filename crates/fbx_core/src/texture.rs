//! Image payloads and texture references.
//!
//! `Video` objects carrying a `Content` payload become [`Image`]s; `Texture`
//! objects become [`Texture`]s that point either at an embedded image or at an
//! external file path handed to the caller's [`ResourceResolver`].

use std::collections::HashMap;

use fbx_math::Vec2;
use serde::Serialize;
use thiserror::Error;

use crate::connections::ConnectionGraph;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::{Node, Value};

/// Errors that can occur while decoding image payloads to pixels.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Image payload is not raw bytes (data URI of type {0})")]
    UnsupportedPayload(String),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// Outcome of asking the caller for an external file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedResource {
    /// The caller supplied the file contents
    Loaded(Vec<u8>),
    /// The caller will fetch it later, or cannot
    Pending,
}

/// Caller-supplied lookup for texture files referenced by path.
///
/// The decoder never touches the file system; every external path goes
/// through this trait.
pub trait ResourceResolver {
    fn resolve(&self, path: &str) -> ResolvedResource;
}

impl<F> ResourceResolver for F
where
    F: Fn(&str) -> ResolvedResource,
{
    fn resolve(&self, path: &str) -> ResolvedResource {
        self(path)
    }
}

/// Raw image payload as stored in the file.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageData {
    /// Text documents carry base64; wrapped as `data:<mime>;base64,<content>`
    DataUri(String),
    /// Binary documents carry the encoded file bytes
    Bytes(Vec<u8>),
}

/// An embedded image extracted from a `Video` object.
#[derive(Clone, Debug, Serialize)]
pub struct Image {
    /// Source object ID
    pub id: i64,

    /// `RelativeFilename`, or `Filename` when the former is absent
    pub file_name: String,

    /// MIME type chosen from the file extension
    pub mime_type: &'static str,

    /// Encoded payload
    #[serde(skip)]
    pub data: ImageData,

    /// Decoded pixels, only when requested through `LoadOptions`
    #[serde(skip)]
    pub pixels: Option<DecodedImage>,
}

impl Image {
    /// Decode the payload to linear RGBA floats.
    pub fn decode(&self) -> TextureResult<DecodedImage> {
        match &self.data {
            ImageData::Bytes(bytes) => DecodedImage::from_memory(bytes),
            ImageData::DataUri(_) => Err(TextureError::UnsupportedPayload(self.mime_type.to_string())),
        }
    }
}

/// Decoded pixel data.
///
/// Stores pixels in linear RGB(A) float format.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,

    /// [R, G, B, A] per pixel, row-major
    pub pixels: Vec<[f32; 4]>,
}

impl DecodedImage {
    /// Decode an encoded image (PNG, JPEG, BMP, TIFF) held in memory.
    pub fn from_memory(bytes: &[u8]) -> TextureResult<Self> {
        let img = image::load_from_memory(bytes)?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let pixels: Vec<[f32; 4]> = rgba
            .pixels()
            .map(|p| {
                [
                    srgb_to_linear(p[0] as f32 / 255.0),
                    srgb_to_linear(p[1] as f32 / 255.0),
                    srgb_to_linear(p[2] as f32 / 255.0),
                    p[3] as f32 / 255.0, // Alpha is linear
                ]
            })
            .collect();

        log::debug!("Decoded embedded image: {}x{}", width, height);
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Pixel at integer coordinates, opaque black when out of range.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        if x >= self.width || y >= self.height {
            return [0.0, 0.0, 0.0, 1.0];
        }
        let idx = (y * self.width + x) as usize;
        self.pixels.get(idx).copied().unwrap_or([0.0, 0.0, 0.0, 1.0])
    }

    /// Approximate size of the pixel buffer in bytes.
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<[f32; 4]>()
    }
}

/// Convert sRGB to linear color space.
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Per-axis wrap behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

impl WrapMode {
    /// `0` repeats, anything else clamps.
    fn from_code(code: i64) -> Self {
        if code == 0 {
            WrapMode::Repeat
        } else {
            WrapMode::ClampToEdge
        }
    }
}

/// How the texture is projected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TextureMapping {
    Uv,
    EquirectangularReflection,
}

/// Where a texture's pixels come from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TextureSource {
    /// Index into `Scene::images`
    Embedded(usize),
    /// A file path handed to the resolver; `payload` is `None` while pending
    External {
        path: String,
        #[serde(skip)]
        payload: Option<Vec<u8>>,
    },
}

/// A texture reference.
#[derive(Clone, Debug, Serialize)]
pub struct Texture {
    pub id: i64,
    pub name: String,
    pub source: TextureSource,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub repeat: Vec2,
    pub mapping: TextureMapping,
}

impl Texture {
    /// True while an external source has not been supplied by the resolver.
    pub fn is_pending(&self) -> bool {
        matches!(self.source, TextureSource::External { payload: None, .. })
    }
}

/// Extension after the last `.`, lowercased. A name without a dot is its own
/// extension.
fn extension(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or(file_name)
        .to_ascii_lowercase()
}

fn mime_type(extension: &str) -> Option<&'static str> {
    match extension {
        "bmp" => Some("image/bmp"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "tif" => Some("image/tiff"),
        _ => None,
    }
}

const TEXTURE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Non-empty string property.
fn non_empty<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.str(key).filter(|s| !s.is_empty())
}

/// Extract embedded images from `Video` objects that carry content.
///
/// Returns the image table and an object ID → table index map.
pub fn parse_images(
    objects: &Node,
    decode_pixels: bool,
    diagnostics: &mut Diagnostics,
) -> (Vec<Image>, HashMap<i64, usize>) {
    let mut images = Vec::new();
    let mut index = HashMap::new();

    for video in objects.children_named("Video") {
        let Some(content) = video.value("Content") else {
            continue;
        };
        let Some(id) = video.object_id() else {
            continue;
        };
        let file_name = non_empty(video, "RelativeFilename")
            .or_else(|| non_empty(video, "Filename"))
            .unwrap_or_default()
            .to_string();
        let ext = extension(&file_name);
        let Some(mime) = mime_type(&ext) else {
            diagnostics.warn(
                DiagnosticKind::Schema,
                format!("Image type \"{}\" is not supported (video {})", ext, id),
            );
            continue;
        };

        let data = match content {
            Value::String(s) => ImageData::DataUri(format!("data:{};base64,{}", mime, s)),
            Value::Bytes(b) => ImageData::Bytes(b.clone()),
            _ => {
                diagnostics.warn(
                    DiagnosticKind::Schema,
                    format!("Video {} has Content that is neither bytes nor text", id),
                );
                continue;
            }
        };

        let mut image = Image {
            id,
            file_name,
            mime_type: mime,
            data,
            pixels: None,
        };
        if decode_pixels {
            match image.decode() {
                Ok(pixels) => image.pixels = Some(pixels),
                Err(TextureError::UnsupportedPayload(_)) => {}
                Err(e) => log::warn!("Failed to decode image {}: {}", id, e),
            }
        }

        index.insert(id, images.len());
        images.push(image);
    }

    log::debug!("Parsed {} embedded images", images.len());
    (images, index)
}

/// Display filename for a texture that has no embedded image: the relative
/// path when it is not rooted, otherwise the basename of `FileName`.
fn external_file_name(texture: &Node, file_path: &str) -> String {
    if let Some(relative) = texture.str("RelativeFilename") {
        if !relative.starts_with('/') && !is_drive_rooted(relative) {
            return relative.to_string();
        }
    }
    file_path
        .rsplit(|c| c == '\\' || c == '/')
        .next()
        .unwrap_or(file_path)
        .to_string()
}

fn is_drive_rooted(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Extract texture references.
///
/// Textures whose `FileName` extension is not an allowed image type are
/// skipped. Returns the texture table and an object ID → table index map.
pub fn parse_textures(
    objects: &Node,
    graph: &ConnectionGraph,
    images: &HashMap<i64, usize>,
    resolver: Option<&dyn ResourceResolver>,
    diagnostics: &mut Diagnostics,
) -> (Vec<Texture>, HashMap<i64, usize>) {
    let mut textures = Vec::new();
    let mut index = HashMap::new();

    for node in objects.children_named("Texture") {
        let Some(id) = node.object_id() else {
            continue;
        };
        let Some(file_path) = node.str("FileName") else {
            diagnostics.warn(
                DiagnosticKind::Schema,
                format!("Texture {} has no FileName", id),
            );
            continue;
        };
        let ext = extension(file_path);
        if !TEXTURE_EXTENSIONS.contains(&ext.as_str()) {
            diagnostics.warn(
                DiagnosticKind::Schema,
                format!("Texture {} has unsupported extension \"{}\"", id, ext),
            );
            continue;
        }

        let embedded = graph
            .children(id)
            .first()
            .and_then(|child| images.get(&child.id).copied());
        let source = match embedded {
            Some(image) => TextureSource::Embedded(image),
            None => {
                let path = external_file_name(node, file_path);
                let payload = match resolver.map(|r| r.resolve(&path)) {
                    Some(ResolvedResource::Loaded(bytes)) => Some(bytes),
                    Some(ResolvedResource::Pending) | None => None,
                };
                TextureSource::External { path, payload }
            }
        };

        let repeat = node
            .array("Scaling")
            .filter(|v| v.len() >= 2)
            .map(|v| Vec2::new(v[0] as f32, v[1] as f32))
            .unwrap_or(Vec2::ONE);

        let texture = Texture {
            id,
            name: node.attr_name.clone(),
            source,
            wrap_s: WrapMode::from_code(node.i64("WrapModeU").unwrap_or(0)),
            wrap_t: WrapMode::from_code(node.i64("WrapModeV").unwrap_or(0)),
            repeat,
            mapping: TextureMapping::Uv,
        };
        index.insert(id, textures.len());
        textures.push(texture);
    }

    log::debug!("Parsed {} textures", textures.len());
    (textures, index)
}
