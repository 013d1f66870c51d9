//! Filesystem fetchers

use std::path::{Path, PathBuf};

use super::{FetchError, ResourceFetcher};

/// Simple file-based fetcher
///
/// Paths are resolved against an optional root directory.
///
/// Reads use blocking `std::fs::read` inside the async `fetch`, so the
/// concurrent loads of a manifest do not overlap their I/O and each read
/// stalls the executor thread it runs on. Under a tokio runtime prefer
/// `TokioFileFetcher` (feature `runtime-tokio`).
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    /// Create a fetcher that resolves paths as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher that resolves paths under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Resolve a resource path to a filesystem path
    pub fn resolve(&self, path: &str) -> PathBuf {
        resolve(self.root.as_deref(), path)
    }
}

fn resolve(root: Option<&Path>, path: &str) -> PathBuf {
    match root {
        Some(root) => root.join(path),
        None => PathBuf::from(path),
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for FileFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let resolved = self.resolve(path);
        log::debug!("Reading {}", resolved.display());
        std::fs::read(&resolved).map_err(|e| FetchError::from_io(path, e))
    }
}

/// Tokio-based filesystem fetcher
#[cfg(feature = "runtime-tokio")]
#[derive(Debug, Clone, Default)]
pub struct TokioFileFetcher {
    root: Option<PathBuf>,
}

#[cfg(feature = "runtime-tokio")]
impl TokioFileFetcher {
    /// Create a fetcher that resolves paths as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher that resolves paths under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

#[cfg(feature = "runtime-tokio")]
#[async_trait::async_trait]
impl ResourceFetcher for TokioFileFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let resolved = resolve(self.root.as_deref(), path);
        log::debug!("Reading {}", resolved.display());
        tokio::fs::read(&resolved)
            .await
            .map_err(|e| FetchError::from_io(path, e))
    }
}
