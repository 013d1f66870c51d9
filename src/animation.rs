//! Animation clips and the animation registry
//!
//! Decoders hand back the clips embedded in a model; the model registry
//! files them here under the asset's name for playback systems to pick up.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Animated property of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackProperty {
    Translation,
    /// Quaternion rotation (x, y, z, w)
    Rotation,
    Scale,
    MorphWeights,
}

impl TrackProperty {
    /// Number of floats per keyframe value
    pub fn components(&self) -> usize {
        match self {
            Self::Translation | Self::Scale => 3,
            Self::Rotation => 4,
            Self::MorphWeights => 1,
        }
    }
}

/// Keyframe interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

/// Keyframes for one property of one node
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Name of the animated node
    pub target: String,
    pub property: TrackProperty,
    pub interpolation: Interpolation,
    /// Keyframe times in seconds
    pub times: Vec<f32>,
    /// Flattened keyframe values
    pub values: Vec<f32>,
}

/// A named animation
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Length in seconds
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    /// Create a clip whose duration is the last keyframe time of its tracks
    pub fn from_tracks(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .filter_map(|track| track.times.last().copied())
            .fold(0.0, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}

/// Clips keyed by asset name
#[derive(Debug, Default)]
pub struct AnimationRegistry {
    clips: RwLock<HashMap<String, Vec<Arc<AnimationClip>>>>,
}

impl AnimationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the clips registered for `asset`
    pub fn set_animations(&self, asset: impl Into<String>, clips: Vec<Arc<AnimationClip>>) {
        self.clips.write().insert(asset.into(), clips);
    }

    /// All clips registered for `asset`
    pub fn animations(&self, asset: &str) -> Option<Vec<Arc<AnimationClip>>> {
        self.clips.read().get(asset).cloned()
    }

    /// One clip of `asset` by clip name
    pub fn clip(&self, asset: &str, clip: &str) -> Option<Arc<AnimationClip>> {
        self.clips
            .read()
            .get(asset)?
            .iter()
            .find(|c| c.name == clip)
            .cloned()
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.clips.read().contains_key(asset)
    }

    /// Number of assets with registered clips
    pub fn len(&self) -> usize {
        self.clips.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.read().is_empty()
    }
}

/// A shareable handle to an AnimationRegistry
#[derive(Debug, Clone, Default)]
pub struct AnimationRegistryHandle(Arc<AnimationRegistry>);

impl AnimationRegistryHandle {
    pub fn new() -> Self {
        Self(Arc::new(AnimationRegistry::new()))
    }

    pub fn inner(&self) -> &AnimationRegistry {
        &self.0
    }
}

impl std::ops::Deref for AnimationRegistryHandle {
    type Target = AnimationRegistry;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
