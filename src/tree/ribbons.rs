//! Spiral ribbon strands.
//!
//! A strand is a chain of short flattened boxes. In the formed state each
//! segment sits on a four-turn spiral up the cone and points at the next
//! segment, which reads as a continuous ribbon from a distance.

use std::f32::consts::PI;

use glam::{Quat, Vec3};

use super::{srgb_hex, Material, MeshInstance, Subsystem};
use crate::config::TreeShape;
use crate::pose::{look_rotation, Pose};
use crate::sampling::SceneRng;
use crate::state::TreeState;
use crate::time::FrameTime;

const CHAOS_RADIUS: f32 = 20.0;
const CHAOS_LIFT: f32 = 6.0;
/// Full turns of the spiral, in radians.
const SPIRAL_SWEEP: f32 = 8.0 * PI;
/// Segment box: width, thickness, length along the strand.
pub const SEGMENT_SIZE: Vec3 = Vec3::new(0.15, 0.02, 0.4);

/// Per-strand layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrandParams {
    pub start_angle: f32,
    pub radius_offset: f32,
    pub speed_offset: f32,
    /// sRGB hex.
    pub color: u32,
}

impl StrandParams {
    /// The red strand.
    pub const RED: Self = Self {
        start_angle: 0.0,
        radius_offset: 0.3,
        speed_offset: 0.2,
        color: 0x8a0000,
    };

    /// The gold strand, half a turn behind the red one.
    pub const GOLD: Self = Self {
        start_angle: PI,
        radius_offset: 0.35,
        speed_offset: 0.0,
        color: 0xFFD700,
    };
}

/// Point `i` of `n` on the spiral.
///
/// The radius narrows toward `height + 1` rather than `height`, so the
/// strand ends just short of the apex.
pub fn spiral_point(i: usize, n: usize, height: f32, max_radius: f32, start_angle: f32) -> Vec3 {
    let t = if n == 0 { 0.0 } else { i as f32 / n as f32 };
    let y = t * height;
    let r = max_radius * (1.0 - y / (height + 1.0));
    let angle = SPIRAL_SWEEP * t + start_angle;
    Vec3::new(r * angle.cos(), y, r * angle.sin())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RibbonSegment {
    pub chaos: Vec3,
    pub target: Vec3,
    pub target_rotation: Quat,
    pub speed: f32,
    pub pose: Pose,
}

#[derive(Debug, Clone)]
pub struct RibbonStrand {
    params: StrandParams,
    color: Vec3,
    material: Material,
    segments: Vec<RibbonSegment>,
}

impl RibbonStrand {
    pub fn new(
        params: StrandParams,
        count: usize,
        shape: &TreeShape,
        rng: &mut SceneRng,
        initial: TreeState,
    ) -> Self {
        let max_radius = shape.ribbon_radius + params.radius_offset;
        let segments = (0..count)
            .map(|i| {
                let target = spiral_point(i, count, shape.height, max_radius, params.start_angle);
                let next = spiral_point(i + 1, count, shape.height, max_radius, params.start_angle);
                let target_rotation = look_rotation(target, next, Vec3::Y);

                let chaos = rng.sample_sphere_volume(CHAOS_RADIUS) + Vec3::Y * CHAOS_LIFT;
                let chaos_euler = Vec3::new(rng.unit() * PI, rng.unit() * PI, rng.unit() * PI);
                let speed = rng.range(0.5, 1.0) + params.speed_offset;

                let mut pose = Pose::default();
                if initial.is_formed() {
                    pose.position = target;
                    pose.rotation = target_rotation;
                } else {
                    pose.position = chaos;
                    pose.set_euler(chaos_euler);
                }

                RibbonSegment {
                    chaos,
                    target,
                    target_rotation,
                    speed,
                    pose,
                }
            })
            .collect();

        let color = srgb_hex(params.color);
        Self {
            params,
            color,
            material: Material {
                roughness: 0.2,
                metalness: 0.6,
                emissive: color,
                emissive_intensity: 0.2,
                env_intensity: 1.0,
                double_sided: true,
            },
            segments,
        }
    }

    pub fn params(&self) -> &StrandParams {
        &self.params
    }

    pub fn segments(&self) -> &[RibbonSegment] {
        &self.segments
    }

    pub fn write_instances(&self, out: &mut Vec<MeshInstance>) {
        out.extend(
            self.segments
                .iter()
                .map(|s| MeshInstance::new(s.pose.matrix(), self.color, &self.material)),
        );
    }
}

impl Subsystem for RibbonStrand {
    fn name(&self) -> &'static str {
        "ribbon"
    }

    fn len(&self) -> usize {
        self.segments.len()
    }

    fn update(&mut self, frame: FrameTime, state: TreeState) {
        let formed = state.is_formed();
        let delta = frame.delta;

        for s in &mut self.segments {
            let target = if formed { s.target } else { s.chaos };
            s.pose.approach(target, delta * s.speed);

            if formed {
                s.pose.turn_toward(s.target_rotation, delta * s.speed);
            } else {
                s.pose.spin(Vec3::new(delta * 0.5, 0.0, delta * 0.5));
            }
            s.pose.scale = Vec3::ONE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spiral_formula() {
        let p = spiral_point(0, 300, 12.0, 5.5, 0.0);
        assert!((p - Vec3::new(5.5, 0.0, 0.0)).length() < 1e-5);

        let p = spiral_point(150, 300, 12.0, 5.5, 0.0);
        // Half way up, two full turns: back on +x.
        let r = 5.5 * (1.0 - 6.0 / 13.0);
        assert!((p - Vec3::new(r, 6.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_strands_are_offset_half_turn() {
        let red = spiral_point(0, 300, 12.0, 5.5, StrandParams::RED.start_angle);
        let gold = spiral_point(0, 300, 12.0, 5.5, StrandParams::GOLD.start_angle);
        assert!((red.x + gold.x).abs() < 1e-4);
    }

    #[test]
    fn test_segments_point_along_path() {
        let strand = RibbonStrand::new(
            StrandParams::RED,
            300,
            &TreeShape::default(),
            &mut SceneRng::new(1),
            TreeState::Chaos,
        );
        let segs = strand.segments();
        for pair in segs.windows(2) {
            let forward = pair[0].target_rotation * Vec3::Z;
            let along = (pair[1].target - pair[0].target).normalize();
            assert!(forward.dot(along) > 0.999);
        }
        assert!(segs.iter().all(|s| (0.7..=1.2).contains(&s.speed)));
    }

    #[test]
    fn test_formed_transition_settles() {
        let mut strand = RibbonStrand::new(
            StrandParams::GOLD,
            50,
            &TreeShape::default(),
            &mut SceneRng::new(2),
            TreeState::Chaos,
        );
        let mut frame = FrameTime::default();
        for _ in 0..1200 {
            frame.delta = 1.0 / 60.0;
            frame.elapsed += frame.delta;
            strand.update(frame, TreeState::Formed);
        }
        for s in strand.segments() {
            assert!((s.pose.position - s.target).length() < 0.01);
            assert!(s.pose.rotation.angle_between(s.target_rotation) < 0.01);
        }
    }
}
