//! Resource fetching
//!
//! Every decoder and the manifest loader read their bytes through a
//! [`ResourceFetcher`]. Each `fetch` call is a suspension point: loads
//! interleave at these awaits and nowhere else.

pub mod file;
pub mod mock;

use std::sync::Arc;

use thiserror::Error;

pub use file::FileFetcher;
#[cfg(feature = "runtime-tokio")]
pub use file::TokioFileFetcher;
pub use mock::MockFetcher;

/// Error type for fetch operations
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub(crate) fn from_io(path: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

/// Trait for fetching the raw bytes of a resource
///
/// Uses async-trait for dyn compatibility
#[async_trait::async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the resource at `path`.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

#[async_trait::async_trait]
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for &T {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(path).await
    }
}

#[async_trait::async_trait]
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for Arc<T> {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(path).await
    }
}
