//! Registry configuration

use crate::loader::ModelFormat;

/// What to do when a decoder rejects a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Fail the load with the decode error
    #[default]
    Propagate,
    /// Log the error, record a diagnostic and store an empty group instead
    Report,
}

/// Configuration for a [`ModelRegistry`](crate::cache::ModelRegistry)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Format used when an asset names no extension
    pub default_format: ModelFormat,
    /// Handling of FBX decode failures
    pub fbx_failures: FailurePolicy,
    /// Look up a `.mtl` next to every OBJ model
    pub companion_materials: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_format: ModelFormat::Gltf,
            fbx_failures: FailurePolicy::Propagate,
            companion_materials: true,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_format(mut self, format: ModelFormat) -> Self {
        self.default_format = format;
        self
    }

    pub fn with_fbx_failures(mut self, policy: FailurePolicy) -> Self {
        self.fbx_failures = policy;
        self
    }

    pub fn with_companion_materials(mut self, enabled: bool) -> Self {
        self.companion_materials = enabled;
        self
    }

    /// Failure policy for `format`
    pub fn failure_policy(&self, format: ModelFormat) -> FailurePolicy {
        match format {
            ModelFormat::Fbx => self.fbx_failures,
            ModelFormat::Gltf | ModelFormat::Obj => FailurePolicy::Propagate,
        }
    }
}
