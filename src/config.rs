//! Scene configuration.
//!
//! All counts and tuning constants live here so the scene can be scaled down
//! for weaker GPUs (or tests) without touching subsystem code. Every section
//! is `#[serde(default)]`, so a TOML file only needs the keys it overrides:
//!
//! ```toml
//! seed = 1
//!
//! [counts]
//! foliage = 8000
//! snow = 1500
//!
//! [post]
//! bloom_intensity = 1.2
//! ```

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level scene configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Fixed RNG seed. `None` draws a fresh seed at startup.
    pub seed: Option<u64>,
    pub counts: Counts,
    pub tree: TreeShape,
    pub gifts: GiftTuning,
    pub snow: SnowTuning,
    pub camera: CameraConfig,
    pub post: PostConfig,
    pub render: RenderConfig,
    pub audio: AudioConfig,
    pub photos: PhotoConfig,
}

impl SceneConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve the seed, drawing one from the OS when none is configured.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

/// Instance counts per subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counts {
    pub foliage: usize,
    pub ornaments: usize,
    pub lights: usize,
    /// Segments per ribbon strand (there are always two strands).
    pub ribbon_segments: usize,
    pub photos: usize,
    pub gifts: usize,
    pub snow: usize,
    pub stars: usize,
}

impl Default for Counts {
    fn default() -> Self {
        Self {
            foliage: 15_000,
            ornaments: 400,
            lights: 600,
            ribbon_segments: 300,
            photos: 24,
            gifts: 80,
            snow: 3_000,
            stars: 5_000,
        }
    }
}

/// Tree silhouette and per-layer cone radii.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeShape {
    pub height: f32,
    pub foliage_radius: f32,
    pub ornament_radius: f32,
    pub light_radius: f32,
    pub ribbon_radius: f32,
    pub photo_radius: f32,
    /// Vertical offset applied to the whole tree group.
    pub staging_offset: f32,
    /// Constant spin of the tree group around y, rad/s.
    pub group_spin: f32,
}

impl Default for TreeShape {
    fn default() -> Self {
        Self {
            height: 12.0,
            foliage_radius: 5.0,
            ornament_radius: 5.2,
            light_radius: 5.3,
            ribbon_radius: 5.2,
            photo_radius: 5.5,
            staging_offset: -5.0,
            group_spin: 0.05,
        }
    }
}

/// A closed-open sampling range `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Map a unit sample `u ∈ [0,1)` into the range.
    #[inline]
    pub fn lerp(&self, u: f32) -> f32 {
        self.min + (self.max - self.min) * u
    }
}

/// Falling gift loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiftTuning {
    pub velocity: Range,
    pub dwell: Range,
    pub spawn_height: Range,
    pub respawn_height: Range,
    pub ring_radius: Range,
    pub pile_height: Range,
    pub scale: Range,
    pub spin: Range,
}

impl Default for GiftTuning {
    fn default() -> Self {
        Self {
            velocity: Range::new(4.0, 8.0),
            dwell: Range::new(10.0, 20.0),
            spawn_height: Range::new(20.0, 60.0),
            respawn_height: Range::new(30.0, 40.0),
            ring_radius: Range::new(2.0, 7.0),
            pile_height: Range::new(0.0, 1.5),
            scale: Range::new(0.4, 0.8),
            spin: Range::new(-1.5, 1.5),
        }
    }
}

/// Snow field tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowTuning {
    pub half_width: f32,
    pub height: f32,
    pub fall_speed: Range,
}

impl Default for SnowTuning {
    fn default() -> Self {
        Self {
            half_width: 30.0,
            height: 50.0,
            fall_speed: Range::new(2.0, 5.0),
        }
    }
}

/// Perspective camera and orbit limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Largest polar angle measured from +y; `π/2` keeps the camera above the floor.
    pub max_polar_angle: f32,
    /// Auto-rotation while the tree is formed, rad/s.
    pub auto_rotate_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 4.0, 20.0),
            fov_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
            min_distance: 10.0,
            max_distance: 40.0,
            max_polar_angle: std::f32::consts::FRAC_PI_2,
            auto_rotate_speed: 0.5,
        }
    }
}

/// Post-processing chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    pub bloom_threshold: f32,
    pub bloom_intensity: f32,
    pub bloom_radius: f32,
    pub vignette_offset: f32,
    pub vignette_darkness: f32,
    pub exposure: f32,
    pub background: Vec3,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            bloom_threshold: 0.8,
            bloom_intensity: 1.5,
            bloom_radius: 0.6,
            vignette_offset: 0.1,
            vignette_darkness: 0.6,
            exposure: 1.5,
            // #020502
            background: Vec3::new(2.0 / 255.0, 5.0 / 255.0, 2.0 / 255.0),
        }
    }
}

/// Rasterization tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Multiplier from shader point-size units to framebuffer pixels.
    pub point_scale: f32,
    pub min_pixel_ratio: f32,
    pub max_pixel_ratio: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            point_scale: 20.0,
            min_pixel_ratio: 1.0,
            max_pixel_ratio: 2.0,
        }
    }
}

/// Looped by default when no `--music` track is given.
pub const DEFAULT_TRACK: &str =
    "https://upload.wikimedia.org/wikipedia/commons/e/ed/We_Wish_You_a_Merry_Christmas_Kevin_MacLeod.ogg";

/// Background music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Track URI: a file path, `file://` URI or `http(s)://` URL. `None` or
    /// an empty string runs silent.
    pub track: Option<String>,
    pub volume: f32,
    pub looped: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            track: Some(DEFAULT_TRACK.to_string()),
            volume: 0.3,
            looped: true,
        }
    }
}

/// Photo frame sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    /// Used whenever the user has not supplied any images.
    pub default_urls: Vec<String>,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            default_urls: [1011, 1025, 102, 106, 13, 16]
                .iter()
                .map(|id| format!("https://picsum.photos/id/{id}/500/500"))
                .collect(),
        }
    }
}
