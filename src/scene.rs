//! Scene composer.
//!
//! Owns the shared [`StateStore`] and every subsystem, and advances them
//! once per frame. The composer is GPU-independent: the renderer only
//! reads instance data and uniforms from it.
//!
//! ```ignore
//! let mut scene = Scene::new(SceneConfig::default(), 42, TreeState::Chaos);
//! scene.set_state(TreeState::Formed);
//!
//! let mut clock = FrameClock::new();
//! loop {
//!     scene.update(clock.tick());
//! }
//! ```

use std::cell::Cell;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::config::SceneConfig;
use crate::sampling::{streams, SceneRng};
use crate::state::{Change, StateStore, SubscriptionId, TreeState};
use crate::time::FrameTime;
use crate::tree::{
    srgb_hex, FallingGifts, Foliage, Lights, MeshInstance, Ornaments, Photos, PointLight,
    RibbonStrand, Sky, Snow, StrandParams, Subsystem, TopStar,
};

/// A cone light with a smooth penumbra.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub target: Vec3,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
    /// Half-angle of the cone in radians.
    pub angle: f32,
    pub penumbra: f32,
    pub decay: f32,
}

/// Every light in the scene, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: Vec3,
    pub spot: SpotLight,
    pub fill: PointLight,
    pub star: PointLight,
    /// Hemispheric stand-in for the environment probe: sky and ground colors.
    pub env_sky: Vec3,
    pub env_ground: Vec3,
}

/// Mesh instances grouped by the geometry they are drawn with.
#[derive(Debug, Default, Clone)]
pub struct MeshBatches {
    pub ornaments: Vec<MeshInstance>,
    pub ribbons: Vec<MeshInstance>,
    pub gifts: Vec<MeshInstance>,
    pub frames: Vec<MeshInstance>,
    pub star: Vec<MeshInstance>,
}

impl MeshBatches {
    pub fn clear(&mut self) {
        self.ornaments.clear();
        self.ribbons.clear();
        self.gifts.clear();
        self.frames.clear();
        self.star.clear();
    }

    pub fn len(&self) -> usize {
        self.ornaments.len() + self.ribbons.len() + self.gifts.len() + self.frames.len() + self.star.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Scene {
    config: SceneConfig,
    seed: u64,
    store: StateStore,
    images_dirty: Rc<Cell<bool>>,
    photo_generation: u64,
    frame: FrameTime,

    pub foliage: Foliage,
    pub ornaments: Ornaments,
    pub lights: Lights,
    pub ribbons: [RibbonStrand; 2],
    pub photos: Photos,
    pub star: TopStar,
    pub gifts: FallingGifts,
    pub snow: Snow,
    pub sky: Sky,
}

impl Scene {
    /// Build every subsystem from `seed`, starting in `initial`.
    pub fn new(config: SceneConfig, seed: u64, initial: TreeState) -> Self {
        let root = SceneRng::new(seed);
        let counts = config.counts;
        let shape = &config.tree;

        let foliage = Foliage::new(counts.foliage, shape, &mut root.fork(streams::FOLIAGE), initial);
        let ornaments = Ornaments::new(counts.ornaments, shape, &mut root.fork(streams::ORNAMENTS), initial);
        let lights = Lights::new(counts.lights, shape, &mut root.fork(streams::LIGHTS), initial);
        let ribbons = [
            RibbonStrand::new(
                StrandParams::RED,
                counts.ribbon_segments,
                shape,
                &mut root.fork(streams::RIBBON_RED),
                initial,
            ),
            RibbonStrand::new(
                StrandParams::GOLD,
                counts.ribbon_segments,
                shape,
                &mut root.fork(streams::RIBBON_GOLD),
                initial,
            ),
        ];
        let photos = Photos::new(
            counts.photos,
            shape,
            config.photos.default_urls.clone(),
            &mut root.fork(streams::PHOTOS),
            initial,
        );
        let star = TopStar::new(&mut root.fork(streams::STAR), initial);
        let gifts = FallingGifts::new(counts.gifts, &config.gifts, root.fork(streams::GIFTS));
        let snow = Snow::new(counts.snow, &config.snow, &mut root.fork(streams::SNOW));
        let sky = Sky::new(counts.stars, &mut root.fork(streams::SKY));

        let mut store = StateStore::with_state(initial);
        let images_dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&images_dirty);
        store.subscribe(move |change, _| {
            if change == Change::UserImages {
                flag.set(true);
            }
        });

        log::info!(
            "scene built: seed {}, {} foliage, {} ornaments, {} lights, {} photos, {} gifts, {} flakes",
            seed,
            foliage.len(),
            ornaments.len(),
            lights.len(),
            photos.len(),
            gifts.len(),
            snow.len()
        );

        Self {
            config,
            seed,
            store,
            images_dirty,
            photo_generation: 0,
            frame: FrameTime::default(),
            foliage,
            ornaments,
            lights,
            ribbons,
            photos,
            star,
            gifts,
            snow,
            sky,
        }
    }

    /// Build from a config, resolving its seed.
    pub fn from_config(config: SceneConfig, initial: TreeState) -> Self {
        let seed = config.resolve_seed();
        Self::new(config, seed, initial)
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Timing of the last update.
    pub fn frame(&self) -> FrameTime {
        self.frame
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn state(&self) -> TreeState {
        self.store.state()
    }

    // ========== Inputs from the overlay ==========

    pub fn set_state(&mut self, state: TreeState) {
        self.store.set_state(state);
    }

    pub fn toggle_state(&mut self) -> TreeState {
        self.store.toggle_state()
    }

    /// Replace the user image list. Photos pick it up on the next update.
    pub fn set_user_images(&mut self, images: Vec<String>) {
        self.store.set_user_images(images);
    }

    pub fn set_music_playing(&mut self, playing: bool) {
        self.store.set_music_playing(playing);
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(Change, &StateStore) + 'static,
    {
        self.store.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Bumped whenever the photo URL list changes.
    pub fn photo_generation(&self) -> u64 {
        self.photo_generation
    }

    // ========== Frame ==========

    pub fn update(&mut self, frame: FrameTime) {
        self.frame = frame;
        let state = self.store.state();

        if self.images_dirty.replace(false) {
            self.photos.set_user_images(self.store.user_images());
            self.photo_generation += 1;
            log::debug!("photos now cycle {} urls", self.photos.active_urls().len());
        }

        self.foliage.update(frame, state);
        self.ornaments.update(frame, state);
        self.lights.update(frame, state);
        for strand in &mut self.ribbons {
            strand.update(frame, state);
        }
        self.photos.update(frame, state);
        self.star.update(frame, state);
        self.gifts.update(frame, state);
        self.snow.update(frame, state);
        self.sky.update(frame, state);
    }

    /// Tree group transform: lowered onto the floor and slowly turning.
    ///
    /// Applies to every subsystem except snow and sky.
    pub fn group_matrix(&self) -> Mat4 {
        let tree = &self.config.tree;
        Mat4::from_translation(Vec3::Y * tree.staging_offset)
            * Mat4::from_rotation_y(self.frame.elapsed * tree.group_spin)
    }

    /// Orbit auto-rotation speed in rad/s; zero unless formed.
    pub fn auto_rotate_speed(&self) -> f32 {
        if self.state().is_formed() {
            self.config.camera.auto_rotate_speed
        } else {
            0.0
        }
    }

    /// Collect this frame's mesh instances in tree-group space.
    pub fn write_meshes(&self, out: &mut MeshBatches) {
        out.clear();
        self.ornaments.write_instances(&mut out.ornaments);
        for strand in &self.ribbons {
            strand.write_instances(&mut out.ribbons);
        }
        self.gifts.write_instances(&mut out.gifts);
        self.photos.write_frame_instances(&mut out.frames);
        self.star.write_instances(&mut out.star);
    }

    pub fn lighting(&self) -> Lighting {
        let mut star = self.star.light();
        star.position = self.group_matrix().transform_point3(star.position);

        Lighting {
            ambient: srgb_hex(0x004400) * 0.2,
            spot: SpotLight {
                position: Vec3::new(10.0, 20.0, 10.0),
                target: Vec3::ZERO,
                color: srgb_hex(0xfff5b6),
                intensity: 200.0,
                angle: 0.2,
                penumbra: 1.0,
                decay: 2.0,
            },
            fill: PointLight {
                position: Vec3::new(-10.0, 5.0, -10.0),
                color: srgb_hex(0xff0000),
                intensity: 50.0,
                distance: 20.0,
                decay: 2.0,
            },
            star,
            env_sky: srgb_hex(0x3a3550) * 0.6,
            env_ground: srgb_hex(0x0b1408) * 0.6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Counts;

    fn small_config() -> SceneConfig {
        SceneConfig {
            counts: Counts {
                foliage: 200,
                ornaments: 20,
                lights: 30,
                ribbon_segments: 30,
                photos: 6,
                gifts: 10,
                snow: 50,
                stars: 50,
            },
            ..SceneConfig::default()
        }
    }

    fn step(scene: &mut Scene, frames: u32) {
        let mut frame = scene.frame();
        for _ in 0..frames {
            frame.delta = 1.0 / 60.0;
            frame.elapsed += frame.delta;
            frame.frame += 1;
            scene.update(frame);
        }
    }

    #[test]
    fn test_user_images_apply_next_frame() {
        let mut scene = Scene::new(small_config(), 1, TreeState::Chaos);
        scene.set_user_images(vec!["file:///tmp/a.png".into()]);
        assert_eq!(scene.photo_generation(), 0);
        step(&mut scene, 1);
        assert_eq!(scene.photo_generation(), 1);
        for i in 0..6 {
            assert_eq!(scene.photos.url(i), Some("file:///tmp/a.png"));
        }
    }

    #[test]
    fn test_auto_rotate_only_when_formed() {
        let mut scene = Scene::new(small_config(), 1, TreeState::Chaos);
        assert_eq!(scene.auto_rotate_speed(), 0.0);
        scene.toggle_state();
        assert_eq!(scene.auto_rotate_speed(), 0.5);
    }

    #[test]
    fn test_mesh_batch_sizes() {
        let scene = Scene::new(small_config(), 1, TreeState::Chaos);
        let mut batches = MeshBatches::default();
        scene.write_meshes(&mut batches);
        assert_eq!(batches.ornaments.len(), 20);
        assert_eq!(batches.ribbons.len(), 60);
        assert_eq!(batches.gifts.len(), 10);
        assert_eq!(batches.frames.len(), 6);
        assert_eq!(batches.star.len(), 1);
    }

    #[test]
    fn test_group_matrix_spins_slowly() {
        let mut scene = Scene::new(small_config(), 1, TreeState::Chaos);
        step(&mut scene, 600);
        let m = scene.group_matrix();
        assert!((m.w_axis.y + 5.0).abs() < 1e-5);
        let x = m.transform_vector3(Vec3::X);
        let angle = (-x.z).atan2(x.x);
        assert!((angle - 0.5).abs() < 1e-3);
    }
}
