//! archetype_scene - Runtime 3D model loading with clone-on-read instancing
//!
//! # Features
//! - glTF/GLB, OBJ (+ MTL) and binary FBX decoding
//! - Manifest-driven bulk loading with concurrent fan-out
//! - LOD assembly from `*_LOD<n>` children
//! - Canonical models handed out as independent deep clones
//! - Animation clips collected into a shared registry
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_scene::{FileFetcher, ModelRegistry};
//!
//! let registry = ModelRegistry::new(FileFetcher::with_root("assets"));
//! registry.load_all_from_file("trees/trees.json").await?;
//! let tree = registry.create_model("pine").expect("pine is in the manifest");
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio`: Enable the Tokio file fetcher

// Core modules
pub mod cache;
pub mod loader;
pub mod lod;
pub mod manifest;

// Support modules
pub mod animation;
pub mod config;
pub mod fetch;
pub mod scene;

// Error types
mod error;
pub use error::{
    AssetError, DecodeError, Diagnostic, LodIntegrityWarning, ManifestError, Result,
};

// Re-export main types from cache
pub use cache::metrics::{RegistryMetrics, RegistryMetricsHandle};
pub use cache::ModelRegistry;

// Re-export fetcher types
pub use fetch::{FetchError, FileFetcher, MockFetcher, ResourceFetcher};
#[cfg(feature = "runtime-tokio")]
pub use fetch::TokioFileFetcher;

// Re-export loader types
pub use loader::{DecodedAsset, ModelFormat, ModelLoader};

// Re-export scene types
pub use scene::{
    AlphaMode, Material, Mesh, MeshBinding, MeshPrimitive, NodeKind, PrimitiveType, SceneNode,
    Skin, Transform, Vertex,
};

// Re-export LOD types
pub use lod::{assemble_lod, lod_index, LodAssembly, LodLevel, LodLevelSpec, LodNode};

// Re-export manifest, animation and config types
pub use animation::{
    AnimationClip, AnimationRegistry, AnimationRegistryHandle, Interpolation, Track, TrackProperty,
};
pub use config::{FailurePolicy, RegistryConfig};
pub use manifest::{AssetManifest, AssetOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
