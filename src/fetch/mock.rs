//! Mock fetcher for testing
//!
//! Serves resources from memory and records every request, so tests can
//! check which resources a load touched and in what order.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};

use super::{FetchError, ResourceFetcher};

/// In-memory fetcher for testing
#[derive(Debug, Default)]
pub struct MockFetcher {
    resources: RwLock<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    /// Create an empty mock fetcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, builder style
    pub fn with_resource(self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    /// Add or replace a resource
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.resources.write().insert(path.into(), bytes.into());
    }

    /// Remove a resource
    pub fn remove(&self, path: &str) -> bool {
        self.resources.write().remove(path).is_some()
    }

    /// Every path requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Number of times `path` was requested
    pub fn request_count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|p| *p == path).count()
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for MockFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().push(path.to_string());
        self.resources
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.to_string()))
    }
}
