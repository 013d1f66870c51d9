use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks load and instancing metrics for a model registry
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    load_times: RwLock<HashMap<String, Duration>>,
    load_counts: RwLock<HashMap<String, u64>>,
    loads_completed: AtomicU64,
    loads_failed: AtomicU64,
    instances_created: AtomicU64,
    instance_misses: AtomicU64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful load of `asset` and how long it took
    pub fn record_load(&self, asset: &str, duration: Duration) {
        self.loads_completed.fetch_add(1, Ordering::Relaxed);
        self.load_times.write().insert(asset.to_string(), duration);
        *self
            .load_counts
            .write()
            .entry(asset.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_load_failure(&self) {
        self.loads_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a `create_model` call that found its asset
    pub fn record_instance(&self) {
        self.instances_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a `create_model` call for an unknown name
    pub fn record_instance_miss(&self) {
        self.instance_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn loads_completed(&self) -> u64 {
        self.loads_completed.load(Ordering::Relaxed)
    }

    pub fn loads_failed(&self) -> u64 {
        self.loads_failed.load(Ordering::Relaxed)
    }

    pub fn instances_created(&self) -> u64 {
        self.instances_created.load(Ordering::Relaxed)
    }

    pub fn instance_misses(&self) -> u64 {
        self.instance_misses.load(Ordering::Relaxed)
    }

    /// Share of `create_model` calls that found their asset, as a percentage
    pub fn instance_hit_rate(&self) -> f32 {
        let hits = self.instances_created() as f32;
        let misses = self.instance_misses() as f32;

        if hits + misses > 0.0 {
            hits / (hits + misses) * 100.0
        } else {
            0.0
        }
    }

    /// Duration of the most recent load of `asset`
    pub fn load_time(&self, asset: &str) -> Option<Duration> {
        self.load_times.read().get(asset).copied()
    }

    /// How many times `asset` has been loaded
    pub fn load_count(&self, asset: &str) -> u64 {
        self.load_counts.read().get(asset).copied().unwrap_or(0)
    }

    pub fn all_load_times(&self) -> HashMap<String, Duration> {
        self.load_times.read().clone()
    }
}

/// A thread-safe wrapper around RegistryMetrics
#[derive(Debug, Clone, Default)]
pub struct RegistryMetricsHandle(Arc<RegistryMetrics>);

impl RegistryMetricsHandle {
    pub fn new() -> Self {
        Self(Arc::new(RegistryMetrics::new()))
    }

    /// Get a reference to the underlying metrics
    pub fn inner(&self) -> &RegistryMetrics {
        &self.0
    }
}

impl std::ops::Deref for RegistryMetricsHandle {
    type Target = RegistryMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
