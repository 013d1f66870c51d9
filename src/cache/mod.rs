//! Model registry
//!
//! Loads models once, keeps one canonical scene tree per asset name and
//! hands out independent deep clones. Canonical trees are frozen behind
//! `Arc` once stored: scaling and LOD assembly happen before insertion, and
//! callers only ever mutate their own clones.

pub mod metrics;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};

use crate::animation::AnimationRegistryHandle;
use crate::config::{FailurePolicy, RegistryConfig};
use crate::error::{Diagnostic, Result};
use crate::fetch::{FileFetcher, ResourceFetcher};
use crate::loader::{DecodedAsset, ModelFormat, ModelLoader};
use crate::lod::assemble_lod;
use crate::manifest::{base_directory, AssetManifest, AssetOptions};
use crate::scene::SceneNode;
use metrics::RegistryMetricsHandle;

/// Named store of canonical models
///
/// Generic over the resource fetcher so tests can serve assets from memory.
pub struct ModelRegistry<F: ResourceFetcher = FileFetcher> {
    loader: ModelLoader<F>,
    config: RegistryConfig,
    models: RwLock<HashMap<String, Arc<SceneNode>>>,
    animations: AnimationRegistryHandle,
    diagnostics: Mutex<Vec<Diagnostic>>,
    metrics: RegistryMetricsHandle,
}

impl<F: ResourceFetcher> ModelRegistry<F> {
    /// Create a registry with the default configuration
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, RegistryConfig::default())
    }

    pub fn with_config(fetcher: F, config: RegistryConfig) -> Self {
        Self {
            loader: ModelLoader::new(fetcher).with_companion_materials(config.companion_materials),
            config,
            models: RwLock::new(HashMap::new()),
            animations: AnimationRegistryHandle::new(),
            diagnostics: Mutex::new(Vec::new()),
            metrics: RegistryMetricsHandle::new(),
        }
    }

    /// Register clips into a shared animation registry instead of a private one
    pub fn with_animation_registry(mut self, animations: AnimationRegistryHandle) -> Self {
        self.animations = animations;
        self
    }

    /// Load every asset named in the manifest at `path`.
    ///
    /// All loads are issued before any is awaited and the call returns once
    /// every one of them has settled. Assets that loaded stay stored even
    /// when another fails; the first failure in manifest order is returned.
    /// An empty path is a no-op.
    pub async fn load_all_from_file(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }

        let manifest = AssetManifest::fetch(self.loader.fetcher(), path).await?;
        let directory = base_directory(path);
        log::debug!("Manifest {path} lists {} assets", manifest.len());

        let results = join_all(
            manifest
                .iter()
                .map(|(name, options)| self.load_model(directory, name, options)),
        )
        .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            log::warn!("{failed} of {} assets in {path} failed to load", results.len());
        } else {
            log::info!("Loaded {} assets from {path}", results.len());
        }

        match results.into_iter().find_map(|r| r.err()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Load one asset from `${directory}${name}.${extension}` and store it
    /// under `name`, replacing any earlier model of that name.
    pub async fn load_model(
        &self,
        directory: &str,
        name: &str,
        options: &AssetOptions,
    ) -> Result<Arc<SceneNode>> {
        let start = Instant::now();
        match self.load_and_store(directory, name, options).await {
            Ok(model) => {
                let elapsed = start.elapsed();
                self.metrics.record_load(name, elapsed);
                log::info!("Loaded {name} in {elapsed:?}");
                Ok(model)
            }
            Err(err) => {
                self.metrics.record_load_failure();
                Err(err)
            }
        }
    }

    async fn load_and_store(
        &self,
        directory: &str,
        name: &str,
        options: &AssetOptions,
    ) -> Result<Arc<SceneNode>> {
        let (format, extension) = match options.extension() {
            Some(ext) => (ext.parse::<ModelFormat>()?, ext),
            None => (
                self.config.default_format,
                self.config.default_format.extension(),
            ),
        };
        let path = format!("{directory}{name}.{extension}");

        let decoded = self.decode(name, format, &path).await?;
        if !decoded.animations.is_empty() {
            log::debug!("Registering {} clips for {name}", decoded.animations.len());
            self.animations.set_animations(name, decoded.animations);
        }

        let mut root = decoded.root;
        if let Some(scale) = options.scale {
            root.transform.set_uniform_scale(scale);
        }
        if let Some(levels) = &options.lod {
            let assembly = assemble_lod(root, levels);
            for warning in assembly.warnings {
                log::warn!("LOD assembly of {name}: {warning}");
                self.record(Diagnostic::Lod {
                    asset: name.to_string(),
                    warning,
                });
            }
            root = assembly.node;
        }

        let root = Arc::new(root);
        self.models.write().insert(name.to_string(), Arc::clone(&root));
        Ok(root)
    }

    /// Decode `path`, applying the failure policy configured for `format`
    async fn decode(&self, asset: &str, format: ModelFormat, path: &str) -> Result<DecodedAsset> {
        match self.loader.decode(format, path).await {
            Ok(decoded) => Ok(decoded),
            Err(err) => match self.config.failure_policy(format) {
                FailurePolicy::Propagate => Err(err.into()),
                FailurePolicy::Report => {
                    log::error!("Failed to decode {path}, storing an empty model: {err}");
                    self.record(Diagnostic::DecodeTolerated {
                        asset: asset.to_string(),
                        message: err.to_string(),
                    });
                    Ok(DecodedAsset::new(SceneNode::group(asset), Vec::new()))
                }
            },
        }
    }

    /// Decode the model at `path` without storing it.
    ///
    /// The format comes from the path's extension. No clips are registered
    /// and no scale or LOD assembly is applied.
    pub async fn load_model_without_storage(&self, path: &str) -> Result<SceneNode> {
        let format = ModelFormat::from_path_or(path, self.config.default_format)?;
        let asset = crate::manifest::file_stem(path);
        Ok(self.decode(asset, format, path).await?.root)
    }

    /// A fresh deep clone of the model stored under `name`
    pub fn create_model(&self, name: &str) -> Option<SceneNode> {
        let models = self.models.read();
        match models.get(name) {
            Some(model) => {
                self.metrics.record_instance();
                Some(model.instantiate())
            }
            None => {
                self.metrics.record_instance_miss();
                log::debug!("No model named {name}");
                None
            }
        }
    }

    /// The canonical model stored under `name`
    pub fn canonical(&self, name: &str) -> Option<Arc<SceneNode>> {
        self.models.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    /// Stored asset names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn animations(&self) -> &AnimationRegistryHandle {
        &self.animations
    }

    /// Diagnostics recorded so far
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Drain the recorded diagnostics
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }

    pub fn metrics(&self) -> &RegistryMetricsHandle {
        &self.metrics
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        self.loader.fetcher()
    }

    fn record(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().push(diagnostic);
    }
}
