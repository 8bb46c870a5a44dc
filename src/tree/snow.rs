//! Snowfall around the whole scene.
//!
//! Flakes have no CPU state beyond their static attributes; the vertex
//! program derives every frame's position from the elapsed time and wraps
//! each flake through the box height.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::Subsystem;
use crate::config::SnowTuning;
use crate::morph::{self, PointVertex};
use crate::sampling::SceneRng;
use crate::state::TreeState;
use crate::time::FrameTime;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Snowflake {
    pub base: [f32; 3],
    pub speed: f32,
    pub random: f32,
    pub _pad: [f32; 3],
}

impl Snowflake {
    #[inline]
    pub fn base(&self) -> Vec3 {
        Vec3::from_array(self.base)
    }
}

#[derive(Debug, Clone)]
pub struct Snow {
    flakes: Vec<Snowflake>,
    height: f32,
    time: f32,
}

impl Snow {
    pub fn new(count: usize, tuning: &SnowTuning, rng: &mut SceneRng) -> Self {
        let half = Vec3::new(tuning.half_width, tuning.height * 0.5, tuning.half_width);
        let flakes = (0..count)
            .map(|_| Snowflake {
                base: rng.sample_box(half).to_array(),
                speed: rng.in_range(tuning.fall_speed),
                random: rng.unit(),
                _pad: [0.0; 3],
            })
            .collect();

        Self {
            flakes,
            height: tuning.height,
            time: 0.0,
        }
    }

    pub fn flakes(&self) -> &[Snowflake] {
        &self.flakes
    }

    /// Vertical extent of the wrap.
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn vertex(&self, index: usize) -> Option<PointVertex> {
        self.vertex_at(index, self.time)
    }

    /// Vertex for flake `index` at an arbitrary time.
    pub fn vertex_at(&self, index: usize, time: f32) -> Option<PointVertex> {
        let f = self.flakes.get(index)?;
        Some(morph::snow_vertex(f.base(), f.speed, f.random, time, self.height))
    }
}

impl Subsystem for Snow {
    fn name(&self) -> &'static str {
        "snow"
    }

    fn len(&self) -> usize {
        self.flakes.len()
    }

    fn update(&mut self, frame: FrameTime, _state: TreeState) {
        self.time = frame.elapsed;
    }
}
