//! Distant star field behind everything else.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::Subsystem;
use crate::sampling::SceneRng;
use crate::state::TreeState;
use crate::time::FrameTime;

const SHELL_RADIUS: f32 = 100.0;
const SHELL_DEPTH: f32 = 50.0;
const SIZE_FACTOR: f32 = 4.0;
/// Pale, fully desaturated.
const STAR_LIGHTNESS: f32 = 0.9;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SkyStar {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 3],
    pub random: f32,
}

/// Rasterized size in pixels for a star at view depth `depth` (positive).
pub fn sky_point_size(size: f32, depth: f32, time: f32, random: f32) -> f32 {
    size * (30.0 / depth.max(1e-3)) * (3.0 + (time + 100.0 * random).sin())
}

/// Soft disc falloff; `dist` is the distance from the sprite center in `[0, 0.5]`.
pub fn sky_sprite_alpha(dist: f32) -> f32 {
    1.0 / (1.0 + (16.0 * (dist - 0.25)).exp())
}

#[derive(Debug, Clone)]
pub struct Sky {
    stars: Vec<SkyStar>,
    time: f32,
}

impl Sky {
    pub fn new(count: usize, rng: &mut SceneRng) -> Self {
        let stars = (0..count)
            .map(|_| {
                let radius = SHELL_RADIUS + SHELL_DEPTH * rng.unit();
                SkyStar {
                    position: rng.sample_sphere_surface(radius).to_array(),
                    size: (0.5 + 0.5 * rng.unit()) * SIZE_FACTOR,
                    color: [STAR_LIGHTNESS; 3],
                    random: rng.unit(),
                }
            })
            .collect();
        Self { stars, time: 0.0 }
    }

    pub fn stars(&self) -> &[SkyStar] {
        &self.stars
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

impl Subsystem for Sky {
    fn name(&self) -> &'static str {
        "sky"
    }

    fn len(&self) -> usize {
        self.stars.len()
    }

    fn update(&mut self, frame: FrameTime, _state: TreeState) {
        self.time = frame.elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_and_sizes() {
        let sky = Sky::new(5_000, &mut SceneRng::new(1));
        for s in sky.stars() {
            let r = Vec3::from_array(s.position).length();
            assert!((100.0 - 1e-3..=150.0 + 1e-3).contains(&r));
            assert!((2.0..=4.0).contains(&s.size));
        }
    }

    #[test]
    fn test_twinkle_bounds() {
        for i in 0..100 {
            let px = sky_point_size(4.0, 120.0, i as f32 * 0.37, 0.5);
            let base = 4.0 * 30.0 / 120.0;
            assert!(px >= base * 2.0 - 1e-4 && px <= base * 4.0 + 1e-4);
        }
    }

    #[test]
    fn test_sprite_fades_out() {
        assert!(sky_sprite_alpha(0.0) > 0.98);
        assert!((sky_sprite_alpha(0.25) - 0.5).abs() < 1e-6);
        assert!(sky_sprite_alpha(0.5) < 0.02);
    }
}
