//! Baubles on the cone surface, lerped on the CPU.
//!
//! Each bauble carries its own `speed`. Lower-speed baubles trail the
//! others on every transition, so the tree settles in a staggered wave
//! rather than all at once.

use std::f32::consts::PI;

use glam::Vec3;

use super::{outset, srgb_hex, Material, MeshInstance, Subsystem};
use crate::config::TreeShape;
use crate::pose::Pose;
use crate::sampling::SceneRng;
use crate::state::TreeState;
use crate::time::FrameTime;

const CHAOS_RADIUS: f32 = 20.0;
const CHAOS_LIFT: f32 = 10.0;
/// Baubles sit on top of the needles.
const SURFACE_OUTSET: f32 = 0.2;

/// Gold, deep red, silver, bright red.
pub const ORNAMENT_PALETTE: [u32; 4] = [0xD4AF37, 0x800000, 0xC0C0C0, 0xFF0000];

pub const ORNAMENT_MATERIAL: Material = Material {
    roughness: 0.1,
    metalness: 0.9,
    // #330000
    emissive: Vec3::new(0.033104762, 0.0, 0.0),
    emissive_intensity: 0.2,
    env_intensity: 1.5,
    double_sided: false,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Ornament {
    pub chaos: Vec3,
    pub target: Vec3,
    /// Linear RGB.
    pub color: Vec3,
    pub scale: f32,
    pub rotation_offset: Vec3,
    /// Lerp rate multiplier in `[0.5, 1.0)`; higher settles faster.
    pub speed: f32,
    pub pose: Pose,
}

#[derive(Debug, Clone)]
pub struct Ornaments {
    items: Vec<Ornament>,
}

impl Ornaments {
    pub fn new(count: usize, shape: &TreeShape, rng: &mut SceneRng, initial: TreeState) -> Self {
        let items = (0..count)
            .map(|_| {
                let chaos = rng.sample_sphere_volume(CHAOS_RADIUS) + Vec3::Y * CHAOS_LIFT;
                let surface = rng.sample_cone_surface(shape.height, shape.ornament_radius);
                let target = outset(surface, SURFACE_OUTSET);
                let scale = rng.range(0.1, 0.5);
                let speed = rng.range(0.5, 1.0);
                let color = srgb_hex(*rng.pick(&ORNAMENT_PALETTE));
                let rotation_offset = Vec3::new(rng.unit() * PI, rng.unit() * PI, 0.0);

                let start = if initial.is_formed() { target } else { chaos };
                Ornament {
                    chaos,
                    target,
                    color,
                    scale,
                    rotation_offset,
                    speed,
                    pose: Pose::at(start).with_scale(Vec3::splat(scale)),
                }
            })
            .collect();

        Self { items }
    }

    pub fn items(&self) -> &[Ornament] {
        &self.items
    }

    pub fn write_instances(&self, out: &mut Vec<MeshInstance>) {
        out.extend(
            self.items
                .iter()
                .map(|o| MeshInstance::new(o.pose.matrix(), o.color, &ORNAMENT_MATERIAL)),
        );
    }
}

impl Subsystem for Ornaments {
    fn name(&self) -> &'static str {
        "ornaments"
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn update(&mut self, frame: FrameTime, state: TreeState) {
        let formed = state.is_formed();
        let delta = frame.delta;

        for (id, o) in self.items.iter_mut().enumerate() {
            let target = if formed { o.target } else { o.chaos };
            o.pose.approach(target, delta * o.speed * 2.0);

            if formed {
                let mut euler = o.pose.euler();
                euler.x = (frame.elapsed + id as f32).sin() * 0.1 + o.rotation_offset.x;
                euler.y += delta * 0.5;
                o.pose.set_euler(euler);
            } else {
                o.pose.spin(Vec3::new(delta, 0.0, delta));
            }

            o.pose.scale = Vec3::splat(o.scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ornaments: &mut Ornaments, state: TreeState, seconds: f32) {
        let delta = 1.0 / 60.0;
        let frames = (seconds / delta).round() as u32;
        let mut frame = FrameTime::default();
        for _ in 0..frames {
            frame.delta = delta;
            frame.elapsed += delta;
            frame.frame += 1;
            ornaments.update(frame, state);
        }
    }

    #[test]
    fn test_static_ranges() {
        let ornaments = Ornaments::new(1_000, &TreeShape::default(), &mut SceneRng::new(4), TreeState::Chaos);
        let palette: Vec<Vec3> = ORNAMENT_PALETTE.iter().map(|&c| srgb_hex(c)).collect();
        for o in ornaments.items() {
            assert!((0.1..=0.5).contains(&o.scale));
            assert!((0.5..=1.0).contains(&o.speed));
            assert!(palette.contains(&o.color));
            assert_eq!(o.pose.position, o.chaos);
            let rho = (o.target.x * o.target.x + o.target.z * o.target.z).sqrt();
            assert!((rho - (5.2 * (1.0 - o.target.y / 12.0) + 0.2)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_settle_on_targets() {
        let mut ornaments = Ornaments::new(400, &TreeShape::default(), &mut SceneRng::new(1), TreeState::Chaos);
        run(&mut ornaments, TreeState::Formed, 10.0);
        for o in ornaments.items() {
            assert!((o.pose.position - o.target).length() < 0.02);
            assert!(o.pose.position.is_finite());
        }
    }

    #[test]
    fn test_faster_ornaments_lead() {
        let mut ornaments = Ornaments::new(400, &TreeShape::default(), &mut SceneRng::new(3), TreeState::Chaos);
        run(&mut ornaments, TreeState::Formed, 1.0);
        // Fraction of the journey left shrinks faster for higher speeds.
        let remaining = |o: &Ornament| {
            (o.pose.position - o.target).length() / (o.chaos - o.target).length().max(1e-6)
        };
        let slowest_fast = ornaments.items().iter().filter(|o| o.speed > 0.9).map(remaining).fold(0.0f32, f32::max);
        let fastest_slow = ornaments.items().iter().filter(|o| o.speed < 0.6).map(remaining).fold(1.0f32, f32::min);
        assert!(slowest_fast < fastest_slow);
    }

    #[test]
    fn test_scale_held() {
        let mut ornaments = Ornaments::new(10, &TreeShape::default(), &mut SceneRng::new(5), TreeState::Chaos);
        run(&mut ornaments, TreeState::Chaos, 2.0);
        for o in ornaments.items() {
            assert_eq!(o.pose.scale, Vec3::splat(o.scale));
        }
    }

    #[test]
    fn test_instances_match_count() {
        let ornaments = Ornaments::new(7, &TreeShape::default(), &mut SceneRng::new(5), TreeState::Formed);
        let mut out = Vec::new();
        ornaments.write_instances(&mut out);
        assert_eq!(out.len(), 7);
        assert_eq!(out[0].translation(), ornaments.items()[0].target);
    }
}
