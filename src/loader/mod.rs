//! Format decoders
//!
//! One decoder per supported source format, selected by [`ModelFormat`].
//! Every decoder turns a resource path into a [`DecodedAsset`]: a root
//! scene node plus whatever animation clips the format embeds.

pub mod fbx;
pub mod gltf;
pub mod obj;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::animation::AnimationClip;
use crate::error::DecodeError;
use crate::fetch::ResourceFetcher;
use crate::scene::SceneNode;

/// Supported model formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelFormat {
    /// glTF 2.0, JSON (`.gltf`) or binary (`.glb`)
    #[default]
    Gltf,
    /// Wavefront OBJ with an optional `.mtl` companion
    Obj,
    /// Autodesk FBX, binary encoding
    Fbx,
}

impl ModelFormat {
    /// Format for a file extension, case-insensitive
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "gltf" | "glb" => Some(Self::Gltf),
            "obj" => Some(Self::Obj),
            "fbx" => Some(Self::Fbx),
            _ => None,
        }
    }

    /// Format inferred from the extension of `path`
    pub fn from_path(path: &str) -> Result<Self, DecodeError> {
        crate::manifest::extension(path).unwrap_or_default().parse()
    }

    /// Like [`ModelFormat::from_path`], but `fallback` when `path` has no extension
    pub fn from_path_or(path: &str, fallback: Self) -> Result<Self, DecodeError> {
        match crate::manifest::extension(path) {
            Some(ext) if !ext.is_empty() => ext.parse(),
            _ => Ok(fallback),
        }
    }

    /// Canonical file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gltf => "gltf",
            Self::Obj => "obj",
            Self::Fbx => "fbx",
        }
    }
}

impl FromStr for ModelFormat {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| DecodeError::UnsupportedFormat(s.to_string()))
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Raw decoder output
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAsset {
    pub root: SceneNode,
    pub animations: Vec<Arc<AnimationClip>>,
}

impl DecodedAsset {
    /// Wrap a root, attaching `animations` to it as well
    pub fn new(mut root: SceneNode, animations: Vec<Arc<AnimationClip>>) -> Self {
        root.animations = animations.clone();
        Self { root, animations }
    }
}

/// Decodes models through a [`ResourceFetcher`]
#[derive(Debug, Clone)]
pub struct ModelLoader<F> {
    fetcher: F,
    companion_materials: bool,
}

impl<F: ResourceFetcher> ModelLoader<F> {
    /// Create a new model loader
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            companion_materials: true,
        }
    }

    /// Enable or disable the `.mtl` lookup for OBJ models
    pub fn with_companion_materials(mut self, enabled: bool) -> Self {
        self.companion_materials = enabled;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Decode the resource at `path` as `format`
    pub async fn decode(&self, format: ModelFormat, path: &str) -> Result<DecodedAsset, DecodeError> {
        log::debug!("Decoding {path} as {format}");
        match format {
            ModelFormat::Gltf => gltf::decode(&self.fetcher, path).await,
            ModelFormat::Obj => obj::decode(&self.fetcher, path, self.companion_materials).await,
            ModelFormat::Fbx => fbx::decode(&self.fetcher, path).await,
        }
    }

    /// Decode the resource at `path`, inferring the format from its extension
    pub async fn decode_path(&self, path: &str) -> Result<DecodedAsset, DecodeError> {
        let format = ModelFormat::from_path(path)?;
        self.decode(format, path).await
    }
}
