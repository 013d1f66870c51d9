//! Error types for archetype_scene

use std::fmt;

use thiserror::Error;

use crate::fetch::FetchError;

/// Failure to fetch or parse an asset manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to fetch manifest {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest {path} must be a JSON object of asset names to options")]
    NotAnObject { path: String },

    #[error("invalid options for asset `{name}` in manifest {path}: {source}")]
    Entry {
        path: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a format decoder to fetch or parse a resource.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to fetch {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error("glTF error in {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },

    #[error("OBJ error in {path}: {source}")]
    Obj {
        path: String,
        #[source]
        source: tobj::LoadError,
    },

    #[error("FBX error in {path}: {reason}")]
    Fbx { path: String, reason: String },

    #[error("invalid data in {path}: {reason}")]
    InvalidData { path: String, reason: String },

    #[error("unsupported model format `{0}`")]
    UnsupportedFormat(String),
}

impl DecodeError {
    /// Path of the resource that failed, when known.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Fetch { path, .. }
            | Self::Gltf { path, .. }
            | Self::Obj { path, .. }
            | Self::Fbx { path, .. }
            | Self::InvalidData { path, .. } => Some(path),
            Self::UnsupportedFormat(_) => None,
        }
    }

    pub(crate) fn fetch(path: &str, source: FetchError) -> Self {
        Self::Fetch {
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn invalid(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Main error type for registry operations
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, AssetError>;

/// Non-fatal problem found while assembling a LOD node.
#[derive(Debug, Clone, PartialEq)]
pub enum LodIntegrityWarning {
    /// The root's immediate child count differs from the number of levels.
    ChildCountMismatch { children: usize, levels: usize },
    /// No child carries the `LOD<index>` token.
    MissingLevel { index: usize },
    /// No child is named exactly as the explicit level mapping asks.
    MissingNamedChild { index: usize, node: String },
    /// Several children carry the same `LOD<index>` token; the first one is used.
    DuplicateLevel {
        index: usize,
        kept: String,
        ignored: String,
    },
}

impl fmt::Display for LodIntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChildCountMismatch { children, levels } => write!(
                f,
                "root has {children} children but {levels} LOD levels were requested"
            ),
            Self::MissingLevel { index } => write!(f, "no LOD mesh for level {index}"),
            Self::MissingNamedChild { index, node } => {
                write!(f, "no child named `{node}` for LOD level {index}")
            }
            Self::DuplicateLevel {
                index,
                kept,
                ignored,
            } => write!(
                f,
                "children `{kept}` and `{ignored}` both claim LOD level {index}; using `{kept}`"
            ),
        }
    }
}

/// A non-fatal event recorded by the registry's diagnostic channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    Lod {
        asset: String,
        warning: LodIntegrityWarning,
    },
    /// A decode failure that the configured policy chose to tolerate.
    DecodeTolerated { asset: String, message: String },
}

impl Diagnostic {
    /// Name of the asset the diagnostic refers to.
    pub fn asset(&self) -> &str {
        match self {
            Self::Lod { asset, .. } | Self::DecodeTolerated { asset, .. } => asset,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lod { asset, warning } => write!(f, "{asset}: {warning}"),
            Self::DecodeTolerated { asset, message } => {
                write!(f, "{asset}: decode failure tolerated: {message}")
            }
        }
    }
}
