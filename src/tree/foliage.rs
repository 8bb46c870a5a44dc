//! Needle cloud: a volumetric cone of point sprites.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::Subsystem;
use crate::config::TreeShape;
use crate::morph::{self, MorphProgress, PointVertex, FOLIAGE_PROGRESS_RATE};
use crate::sampling::SceneRng;
use crate::state::TreeState;
use crate::time::FrameTime;

/// Chaos sphere radius and lift.
const CHAOS_RADIUS: f32 = 15.0;
const CHAOS_LIFT: f32 = 5.0;

/// Static per-needle attributes, laid out as the instance vertex buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FoliageParticle {
    pub chaos: [f32; 3],
    pub random: f32,
    pub target: [f32; 3],
    pub _pad: f32,
}

impl FoliageParticle {
    #[inline]
    pub fn chaos(&self) -> Vec3 {
        Vec3::from_array(self.chaos)
    }

    #[inline]
    pub fn target(&self) -> Vec3 {
        Vec3::from_array(self.target)
    }
}

/// The needle cloud. CPU state is the particle table plus one eased scalar.
#[derive(Debug, Clone)]
pub struct Foliage {
    particles: Vec<FoliageParticle>,
    progress: MorphProgress,
    time: f32,
}

impl Foliage {
    pub fn new(count: usize, shape: &TreeShape, rng: &mut SceneRng, initial: TreeState) -> Self {
        let particles = (0..count)
            .map(|_| {
                let chaos = rng.sample_sphere_volume(CHAOS_RADIUS) + Vec3::Y * CHAOS_LIFT;
                let target = rng.sample_cone_volume(shape.height, shape.foliage_radius);
                FoliageParticle {
                    chaos: chaos.to_array(),
                    random: rng.unit(),
                    target: target.to_array(),
                    _pad: 0.0,
                }
            })
            .collect();

        Self {
            particles,
            progress: MorphProgress::with_value(FOLIAGE_PROGRESS_RATE, initial.progress_target()),
            time: 0.0,
        }
    }

    pub fn particles(&self) -> &[FoliageParticle] {
        &self.particles
    }

    /// Current `uProgress`.
    pub fn progress(&self) -> f32 {
        self.progress.value()
    }

    /// Replay from a captured progress value.
    pub fn set_progress(&mut self, value: f32) {
        self.progress.set(value);
    }

    /// Evaluate the vertex program for needle `index` at the current frame.
    pub fn vertex(&self, index: usize) -> Option<PointVertex> {
        let p = self.particles.get(index)?;
        Some(morph::foliage_vertex(p.chaos(), p.target(), p.random, self.progress(), self.time))
    }
}

impl Subsystem for Foliage {
    fn name(&self) -> &'static str {
        "foliage"
    }

    fn len(&self) -> usize {
        self.particles.len()
    }

    fn update(&mut self, frame: FrameTime, state: TreeState) {
        self.time = frame.elapsed;
        self.progress.step(state.progress_target(), frame.delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(count: usize) -> Foliage {
        Foliage::new(count, &TreeShape::default(), &mut SceneRng::new(1), TreeState::Chaos)
    }

    #[test]
    fn test_targets_inside_cone() {
        let foliage = build(20_000);
        for p in foliage.particles() {
            let t = p.target();
            assert!((0.0..=12.0).contains(&t.y));
            let rho = (t.x * t.x + t.z * t.z).sqrt();
            assert!(rho <= 5.0 * (1.0 - t.y / 12.0) + 1e-5);
            assert!((0.0..1.0).contains(&p.random));
        }
    }

    #[test]
    fn test_chaos_in_lifted_sphere() {
        let foliage = build(5_000);
        for p in foliage.particles() {
            assert!((p.chaos() - Vec3::Y * 5.0).length() <= 15.0 + 1e-4);
        }
    }

    #[test]
    fn test_zero_count() {
        let mut foliage = build(0);
        assert!(foliage.is_empty());
        foliage.update(FrameTime { elapsed: 0.1, delta: 0.1, frame: 1 }, TreeState::Formed);
        assert!(foliage.vertex(0).is_none());
    }

    #[test]
    fn test_progress_follows_state() {
        let mut foliage = build(1);
        let mut frame = FrameTime::default();
        for i in 0..300 {
            frame.delta = 1.0 / 60.0;
            frame.elapsed = i as f32 / 60.0;
            foliage.update(frame, TreeState::Formed);
        }
        assert!(foliage.progress() > 0.999);
    }
}
