//! End-to-end scene scenarios, driven without a window or GPU.
//!
//! Every scene here is stepped with a fixed 60 Hz clock.

use evergreen::audio::Silence;
use evergreen::config::{Counts, Range};
use evergreen::morph::foliage_morph;
use evergreen::overlay::Overlay;
use evergreen::scene::MeshBatches;
use evergreen::tree::Subsystem;
use evergreen::{FrameClock, Scene, SceneConfig, TreeState};

const DT: f32 = 1.0 / 60.0;

fn config() -> SceneConfig {
    SceneConfig {
        counts: Counts {
            foliage: 2_000,
            ornaments: 100,
            lights: 150,
            ribbon_segments: 60,
            photos: 24,
            gifts: 80,
            snow: 300,
            stars: 200,
        },
        ..SceneConfig::default()
    }
}

fn run(scene: &mut Scene, clock: &mut FrameClock, seconds: f32) {
    let frames = (seconds / DT).round() as u32;
    for _ in 0..frames {
        scene.update(clock.advance(DT));
    }
}

// ============================================================================
// Morph scenarios
// ============================================================================

#[test]
fn test_chaos_stays_scattered() {
    let mut scene = Scene::new(config(), 1, TreeState::Chaos);
    let mut clock = FrameClock::new();
    run(&mut scene, &mut clock, 2.0);

    assert!(scene.foliage.progress().abs() < 1e-6);
    assert!(scene.lights.progress().abs() < 1e-6);
    for p in scene.foliage.particles().iter().take(200) {
        let (position, activation) = foliage_morph(p.chaos(), p.target(), p.random, scene.foliage.progress());
        assert!((position - p.chaos()).length() < 1e-5);
        assert_eq!(activation, 0.0);
    }
}

#[test]
fn test_formed_from_the_start() {
    let mut scene = Scene::new(config(), 1, TreeState::Formed);
    let mut clock = FrameClock::new();
    run(&mut scene, &mut clock, 5.0);

    assert!(scene.foliage.progress() > 0.999);
    for o in scene.ornaments.items() {
        assert!((o.pose.position - o.target).length() < 0.02);
    }
}

#[test]
fn test_assembly_converges() {
    let mut scene = Scene::new(config(), 3, TreeState::Chaos);
    let mut clock = FrameClock::new();
    run(&mut scene, &mut clock, 0.5);
    scene.set_state(TreeState::Formed);

    let mut last = scene.foliage.progress();
    for _ in 0..300 {
        scene.update(clock.advance(DT));
        let p = scene.foliage.progress();
        assert!(p >= last);
        last = p;
    }
    assert!((1.0 - scene.foliage.progress()) < 1e-3);
    assert!((1.0 - scene.lights.progress()) < 1e-3);
    // Lights ease more slowly than the needles.
    assert!(scene.lights.progress() <= scene.foliage.progress());

    run(&mut scene, &mut clock, 5.0);
    for o in scene.ornaments.items() {
        assert!((o.pose.position - o.target).length() < 0.02);
    }
    for p in scene.foliage.particles().iter().take(200) {
        let (position, _) = foliage_morph(p.chaos(), p.target(), p.random, 1.0);
        assert!((position - p.target()).length() < 1e-3);
    }
}

#[test]
fn test_quick_toggles_settle_formed() {
    let mut scene = Scene::new(config(), 5, TreeState::Formed);
    let mut clock = FrameClock::new();
    scene.set_state(TreeState::Chaos);
    run(&mut scene, &mut clock, 0.25);
    scene.set_state(TreeState::Formed);
    run(&mut scene, &mut clock, 0.25);
    run(&mut scene, &mut clock, 5.0);

    assert!((1.0 - scene.foliage.progress()) < 1e-3);
    let mut batches = MeshBatches::default();
    scene.write_meshes(&mut batches);
    for instance in batches
        .ornaments
        .iter()
        .chain(&batches.ribbons)
        .chain(&batches.gifts)
        .chain(&batches.frames)
        .chain(&batches.star)
    {
        assert!(instance.translation().is_finite());
    }
}

// ============================================================================
// Overlay scenarios
// ============================================================================

#[test]
fn test_upload_forms_and_cycles_images() {
    let mut scene = Scene::new(config(), 1, TreeState::Chaos);
    let mut overlay = Overlay::new(Box::new(Silence::default()));
    let mut clock = FrameClock::new();

    overlay.upload(&mut scene, ["/photos/one.jpg", "/photos/two.jpg"]);
    assert_eq!(scene.state(), TreeState::Formed);

    scene.update(clock.advance(DT));
    for i in 0..scene.photos.len() {
        let expected = if i % 2 == 0 { "file:///photos/one.jpg" } else { "file:///photos/two.jpg" };
        assert_eq!(scene.photos.url(i), Some(expected));
    }
}

#[test]
fn test_empty_images_fall_back_to_defaults() {
    let mut scene = Scene::new(config(), 1, TreeState::Chaos);
    let mut clock = FrameClock::new();
    let defaults = scene.config().photos.default_urls.clone();
    assert_eq!(defaults.len(), 6);

    scene.set_user_images(vec!["file:///a.png".into()]);
    scene.update(clock.advance(DT));
    scene.set_user_images(Vec::new());
    scene.update(clock.advance(DT));

    for i in 0..scene.photos.len() {
        assert_eq!(scene.photos.url(i), Some(defaults[i % 6].as_str()));
    }
}

#[test]
fn test_silent_music_never_plays() {
    let mut scene = Scene::new(config(), 1, TreeState::Chaos);
    let mut overlay = Overlay::new(Box::new(Silence::because("no device")));
    overlay.toggle(&mut scene);
    assert_eq!(scene.state(), TreeState::Formed);
    assert!(!overlay.toggle_music(&mut scene));
    assert!(!scene.store().music_playing());
}

// ============================================================================
// Gifts and snow
// ============================================================================

#[test]
fn test_every_gift_cycles() {
    let mut config = config();
    config.gifts.velocity = Range::new(4.0, 4.0);
    config.gifts.dwell = Range::new(10.0, 10.0);
    let mut scene = Scene::new(config, 9, TreeState::Chaos);
    let mut clock = FrameClock::new();

    let n = scene.gifts.len();
    let mut seen_landed = vec![false; n];
    let mut seen_falling = vec![false; n];
    for _ in 0..(30.0 / DT) as u32 {
        scene.update(clock.advance(DT));
        for (i, gift) in scene.gifts.items().iter().enumerate() {
            assert!(gift.position.y >= gift.land.y);
            if gift.phase.is_landed() {
                seen_landed[i] = true;
            } else {
                seen_falling[i] = true;
            }
        }
    }
    assert!(seen_landed.iter().all(|s| *s));
    assert!(seen_falling.iter().all(|s| *s));
}

#[test]
fn test_snow_stays_in_its_box() {
    let mut scene = Scene::new(config(), 2, TreeState::Chaos);
    let mut clock = FrameClock::new();
    let height = scene.snow.height();
    let half = height * 0.5;

    let mut last: Vec<f32> = (0..scene.snow.len())
        .filter_map(|i| scene.snow.vertex(i))
        .map(|v| v.position.y)
        .collect();
    for _ in 0..1200 {
        scene.update(clock.advance(DT));
        for (i, prev) in last.iter_mut().enumerate() {
            let y = scene.snow.vertex(i).map(|v| v.position.y).unwrap_or(0.0);
            assert!((-half..=half).contains(&y));
            let step = y - *prev;
            // Either a small fall or a wrap back to the top.
            assert!(step.abs() < 0.5 || step > half, "flake {} jumped {}", i, step);
            *prev = y;
        }
    }
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_same_seed_same_scene() {
    let a = Scene::new(config(), 77, TreeState::Chaos);
    let b = Scene::new(config(), 77, TreeState::Chaos);
    let c = Scene::new(config(), 78, TreeState::Chaos);

    let bytes = |s: &Scene| bytemuck::cast_slice::<_, u8>(s.foliage.particles()).to_vec();
    assert_eq!(bytes(&a), bytes(&b));
    assert_ne!(bytes(&a), bytes(&c));
    assert_eq!(
        bytemuck::cast_slice::<_, u8>(a.snow.flakes()),
        bytemuck::cast_slice::<_, u8>(b.snow.flakes())
    );
    assert_eq!(a.ornaments.items(), b.ornaments.items());
}
