//! Benchmarks for scene construction and the per-frame CPU work.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use evergreen::config::Counts;
use evergreen::scene::MeshBatches;
use evergreen::{FrameClock, Scene, SceneConfig, TreeState};

fn scaled(factor: f32) -> SceneConfig {
    let full = Counts::default();
    let n = |count: usize| ((count as f32 * factor) as usize).max(1);
    SceneConfig {
        counts: Counts {
            foliage: n(full.foliage),
            ornaments: n(full.ornaments),
            lights: n(full.lights),
            ribbon_segments: n(full.ribbon_segments),
            photos: n(full.photos),
            gifts: n(full.gifts),
            snow: n(full.snow),
            stars: n(full.stars),
        },
        ..SceneConfig::default()
    }
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_new");
    for factor in [0.1f32, 1.0] {
        let config = scaled(factor);
        group.bench_with_input(BenchmarkId::from_parameter(factor), &config, |b, config| {
            b.iter(|| black_box(Scene::new(config.clone(), 42, TreeState::Chaos)))
        });
    }
    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_tick");

    group.bench_function("morphing", |b| {
        let mut scene = Scene::new(SceneConfig::default(), 42, TreeState::Chaos);
        let mut clock = FrameClock::new();
        let mut formed = false;
        b.iter(|| {
            // Flip every so often so the CPU lerps never settle.
            if clock.frame() % 240 == 0 {
                formed = !formed;
                scene.set_state(if formed { TreeState::Formed } else { TreeState::Chaos });
            }
            scene.update(clock.advance(1.0 / 60.0));
            black_box(scene.group_matrix())
        })
    });

    group.bench_function("write_meshes", |b| {
        let scene = Scene::new(SceneConfig::default(), 42, TreeState::Formed);
        let mut batches = MeshBatches::default();
        b.iter(|| {
            scene.write_meshes(&mut batches);
            black_box(batches.len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_construction, bench_tick);
criterion_main!(benches);
