//! Asset manifests
//!
//! A manifest is a JSON object mapping asset names to load options:
//!
//! ```json
//! {
//!   "tree": { "extension": "gltf", "scale": 0.5, "lod": [5, 20, 50] },
//!   "crate": { "extension": "obj" },
//!   "soldier": { "extension": "fbx" }
//! }
//! ```
//!
//! Each asset lives next to the manifest at `<name>.<extension>`.

use serde::Deserialize;

use crate::error::ManifestError;
use crate::fetch::ResourceFetcher;
use crate::lod::LodLevelSpec;

/// Per-asset load options
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetOptions {
    /// File extension, `gltf` when absent or empty
    pub extension: Option<String>,
    /// Uniform scale applied once to the canonical root
    pub scale: Option<f32>,
    /// LOD levels, one per detail child of the root
    pub lod: Option<Vec<LodLevelSpec>>,
}

impl AssetOptions {
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_lod(mut self, levels: impl IntoIterator<Item = impl Into<LodLevelSpec>>) -> Self {
        self.lod = Some(levels.into_iter().map(Into::into).collect());
        self
    }

    /// The extension to load with, if one was given
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref().filter(|ext| !ext.is_empty())
    }
}

/// Named assets in manifest order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetManifest {
    entries: Vec<(String, AssetOptions)>,
}

impl AssetManifest {
    /// Parse manifest bytes; `path` is only used in error messages
    pub fn from_slice(path: &str, bytes: &[u8]) -> Result<Self, ManifestError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|source| ManifestError::Parse {
                path: path.to_string(),
                source,
            })?;
        let serde_json::Value::Object(object) = value else {
            return Err(ManifestError::NotAnObject {
                path: path.to_string(),
            });
        };

        let entries = object
            .into_iter()
            .map(|(name, options)| {
                // `null` options mean defaults
                let options = if options.is_null() {
                    AssetOptions::default()
                } else {
                    serde_json::from_value(options).map_err(|source| ManifestError::Entry {
                        path: path.to_string(),
                        name: name.clone(),
                        source,
                    })?
                };
                Ok((name, options))
            })
            .collect::<Result<Vec<_>, ManifestError>>()?;

        Ok(Self { entries })
    }

    /// Fetch and parse the manifest at `path`
    pub async fn fetch<F: ResourceFetcher + ?Sized>(
        fetcher: &F,
        path: &str,
    ) -> Result<Self, ManifestError> {
        let bytes = fetcher
            .fetch(path)
            .await
            .map_err(|source| ManifestError::Fetch {
                path: path.to_string(),
                source,
            })?;
        Self::from_slice(path, &bytes)
    }

    /// Add an entry, replacing any entry with the same name in place
    pub fn insert(&mut self, name: impl Into<String>, options: AssetOptions) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = options,
            None => self.entries.push((name, options)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AssetOptions> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, options)| options)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetOptions)> {
        self.entries
            .iter()
            .map(|(name, options)| (name.as_str(), options))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Directory part of a resource path, up to and including the last separator.
///
/// Returns an empty string when the path has no separator.
pub fn base_directory(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(at) => &path[..=at],
        None => "",
    }
}

/// File name of a resource path without directory and extension
pub fn file_stem(path: &str) -> &str {
    let name = &path[base_directory(path).len()..];
    match name.rfind('.') {
        Some(at) if at > 0 => &name[..at],
        _ => name,
    }
}

/// Extension of a resource path, without the dot
pub fn extension(path: &str) -> Option<&str> {
    let name = &path[base_directory(path).len()..];
    name.rfind('.').map(|at| &name[at + 1..])
}

/// Replace the extension of `path`, appending one if it has none
pub fn with_extension(path: &str, extension: &str) -> String {
    let name_start = base_directory(path).len();
    let stem_end = path[name_start..]
        .rfind('.')
        .map_or(path.len(), |at| name_start + at);
    format!("{}.{}", &path[..stem_end], extension)
}
