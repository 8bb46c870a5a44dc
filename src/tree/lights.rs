//! Fairy lights: twinkling additive sprites on the cone surface.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::{outset, Subsystem};
use crate::config::TreeShape;
use crate::morph::{self, MorphProgress, PointVertex, LIGHTS_PROGRESS_RATE};
use crate::sampling::SceneRng;
use crate::state::TreeState;
use crate::time::FrameTime;

const CHAOS_RADIUS: f32 = 25.0;
const CHAOS_LIFT: f32 = 8.0;
/// Lights sit just outside the ornaments.
const SURFACE_OUTSET: f32 = 0.1;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LightParticle {
    pub chaos: [f32; 3],
    pub blink_offset: f32,
    pub target: [f32; 3],
    pub blink_speed: f32,
}

impl LightParticle {
    #[inline]
    pub fn chaos(&self) -> Vec3 {
        Vec3::from_array(self.chaos)
    }

    #[inline]
    pub fn target(&self) -> Vec3 {
        Vec3::from_array(self.target)
    }
}

#[derive(Debug, Clone)]
pub struct Lights {
    particles: Vec<LightParticle>,
    progress: MorphProgress,
    time: f32,
}

impl Lights {
    pub fn new(count: usize, shape: &TreeShape, rng: &mut SceneRng, initial: TreeState) -> Self {
        let particles = (0..count)
            .map(|_| {
                let chaos = rng.sample_sphere_volume(CHAOS_RADIUS) + Vec3::Y * CHAOS_LIFT;
                let surface = rng.sample_cone_surface(shape.height, shape.light_radius);
                LightParticle {
                    chaos: chaos.to_array(),
                    blink_offset: rng.range(0.0, 100.0),
                    target: outset(surface, SURFACE_OUTSET).to_array(),
                    blink_speed: rng.range(2.0, 5.0),
                }
            })
            .collect();

        Self {
            particles,
            progress: MorphProgress::with_value(LIGHTS_PROGRESS_RATE, initial.progress_target()),
            time: 0.0,
        }
    }

    pub fn particles(&self) -> &[LightParticle] {
        &self.particles
    }

    pub fn progress(&self) -> f32 {
        self.progress.value()
    }

    pub fn set_progress(&mut self, value: f32) {
        self.progress.set(value);
    }

    pub fn vertex(&self, index: usize) -> Option<PointVertex> {
        let p = self.particles.get(index)?;
        Some(morph::lights_vertex(
            p.chaos(),
            p.target(),
            p.blink_offset,
            p.blink_speed,
            self.progress(),
            self.time,
        ))
    }
}

impl Subsystem for Lights {
    fn name(&self) -> &'static str {
        "lights"
    }

    fn len(&self) -> usize {
        self.particles.len()
    }

    fn update(&mut self, frame: FrameTime, state: TreeState) {
        self.time = frame.elapsed;
        self.progress.step(state.progress_target(), frame.delta);
    }
}
