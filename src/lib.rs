//! # Evergreen - a morphing Christmas tree
//!
//! A real-time 3D scene of a Christmas tree built from tens of thousands of
//! instanced elements: needle particles, ornaments, fairy lights, two spiral
//! ribbons, polaroid photos and a star on top. Every element has two
//! positions, a scattered *chaos* one and a *formed* one on the tree, and the
//! whole scene morphs between them when the state flips. Gifts fall and pile
//! up at the foot of the tree, snow drifts through, and a star field sits
//! behind everything.
//!
//! ## Quick Start
//!
//! ```ignore
//! use evergreen::prelude::*;
//!
//! fn main() -> Result<(), AppError> {
//!     evergreen::run(RunOptions {
//!         config: SceneConfig::default(),
//!         initial: TreeState::Chaos,
//!         images: vec![],
//!     })
//! }
//! ```
//!
//! ## Without a window
//!
//! The whole CPU side is independent of the GPU. A [`Scene`] can be stepped
//! with a fixed clock, which is how the tests and benches drive it:
//!
//! ```ignore
//! let mut scene = Scene::new(SceneConfig::default(), 42, TreeState::Chaos);
//! let mut clock = FrameClock::new();
//! scene.set_state(TreeState::Formed);
//! for _ in 0..120 {
//!     scene.update(clock.advance(1.0 / 60.0));
//! }
//! assert!(scene.foliage.progress() > 0.9);
//! ```
//!
//! ## Controls
//!
//! | Input | Action |
//! |-------|--------|
//! | Space / "Assemble The Tree" | toggle chaos and formed |
//! | M / music button | play or pause the music |
//! | U / "Upload Photos" / drop files | show your own photos on the tree |
//! | Drag | orbit |
//! | Wheel | zoom |
//!
//! ## Subsystems
//!
//! | Module | Draws |
//! |--------|-------|
//! | [`tree::Foliage`] | needle particles morphing on the GPU |
//! | [`tree::Ornaments`] | metallic spheres |
//! | [`tree::Lights`] | twinkling additive sprites |
//! | [`tree::RibbonStrand`] | two spiral ribbons |
//! | [`tree::Photos`] | polaroids with user images |
//! | [`tree::TopStar`] | the extruded star and its point light |
//! | [`tree::FallingGifts`] | the gift fall, land and recycle loop |
//! | [`tree::Snow`] | the wrapping snow field |
//! | [`tree::Sky`] | the background star field |

pub mod app;
pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod gpu;
pub mod input;
pub mod morph;
pub mod overlay;
pub mod pose;
pub mod sampling;
pub mod scene;
pub mod state;
pub mod textures;
pub mod time;
pub mod tree;

pub use app::{run, App, RunOptions};
pub use config::SceneConfig;
pub use error::{AppError, AssetError, AudioError, ConfigError, GpuError};
pub use glam::{Mat4, Quat, Vec2, Vec3};
pub use scene::Scene;
pub use state::{StateStore, TreeState};
pub use time::{FrameClock, FrameTime};

/// Common imports.
///
/// ```ignore
/// use evergreen::prelude::*;
/// ```
pub mod prelude {
    pub use crate::app::{run, RunOptions};
    pub use crate::config::SceneConfig;
    pub use crate::error::AppError;
    pub use crate::input::{Input, KeyCode, MouseButton};
    pub use crate::morph::MorphProgress;
    pub use crate::overlay::{Overlay, OverlayAction};
    pub use crate::pose::Pose;
    pub use crate::scene::Scene;
    pub use crate::state::{Change, StateStore, TreeState};
    pub use crate::time::{FrameClock, FrameTime};
    pub use glam::{Mat4, Quat, Vec2, Vec3};
}
