//! The crowning star and its warm light.

use std::f32::consts::PI;

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};

use super::{srgb_hex, Material, MeshInstance, Subsystem};
use crate::sampling::SceneRng;
use crate::state::TreeState;
use crate::time::FrameTime;

pub const STAR_CHAOS_POSITION: Vec3 = Vec3::new(0.0, 6.0, 0.0);
pub const STAR_FORMED_POSITION: Vec3 = Vec3::new(0.0, 13.0, 0.0);

pub const OUTER_RADIUS: f32 = 1.2;
pub const INNER_RADIUS: f32 = 0.5;
const POINTS: usize = 5;

/// Floating wobble: speed, rotation and float intensities.
const FLOAT_SPEED: f32 = 2.0;
const FLOAT_ROTATION: f32 = 0.2;
const FLOAT_HEIGHT: f32 = 0.5;

const STAR_MATERIAL: Material = Material {
    roughness: 0.2,
    metalness: 1.0,
    // #996515
    emissive: Vec3::new(0.31854683, 0.13286833, 0.0069954102),
    emissive_intensity: 0.5,
    env_intensity: 2.0,
    double_sided: false,
};

/// A point light with physically based falloff and a hard cutoff distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
    /// Zero means no cutoff.
    pub distance: f32,
    pub decay: f32,
}

/// Outline of the five-point star, alternating outer and inner vertices,
/// starting at the bottom point and winding counter-clockwise.
pub fn star_outline() -> Vec<Vec2> {
    (0..POINTS * 2)
        .map(|i| {
            let angle = i as f32 * PI / POINTS as f32 - PI / 2.0;
            let radius = if i % 2 == 0 { OUTER_RADIUS } else { INNER_RADIUS };
            Vec2::new(angle.cos() * radius, angle.sin() * radius)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct TopStar {
    position: Vec3,
    euler: Vec3,
    scale: f32,
    float_offset: f32,
    time: f32,
    color: Vec3,
}

impl TopStar {
    pub fn new(rng: &mut SceneRng, initial: TreeState) -> Self {
        let position = if initial.is_formed() { STAR_FORMED_POSITION } else { STAR_CHAOS_POSITION };
        Self {
            position,
            euler: Vec3::ZERO,
            scale: 1.0,
            float_offset: rng.range(0.0, 100.0),
            time: 0.0,
            color: srgb_hex(0xFFD700),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn euler(&self) -> Vec3 {
        self.euler
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Wobble layered under the lerped transform: `(offset, rotation)`.
    pub fn float_transform(&self) -> (Vec3, Quat) {
        let tau = (self.time + self.float_offset) / 4.0 * FLOAT_SPEED;
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            tau.cos() / 8.0 * FLOAT_ROTATION,
            tau.sin() / 8.0 * FLOAT_ROTATION,
            tau.sin() / 20.0 * FLOAT_ROTATION,
        );
        let lift = tau.sin() / 10.0 * FLOAT_HEIGHT;
        (Vec3::Y * lift, rotation)
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.euler.x, self.euler.y, self.euler.z);
        let (lift, wobble) = self.float_transform();
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), rotation, self.position)
            * Mat4::from_rotation_translation(wobble, lift)
    }

    /// The warm light that travels with the star.
    pub fn light(&self) -> PointLight {
        PointLight {
            position: self.matrix().transform_point3(Vec3::ZERO),
            color: srgb_hex(0xffaa00),
            intensity: 80.0,
            distance: 10.0,
            decay: 2.0,
        }
    }

    pub fn write_instances(&self, out: &mut Vec<MeshInstance>) {
        out.push(MeshInstance::new(self.matrix(), self.color, &STAR_MATERIAL));
    }
}

impl Subsystem for TopStar {
    fn name(&self) -> &'static str {
        "star"
    }

    fn len(&self) -> usize {
        1
    }

    fn update(&mut self, frame: FrameTime, state: TreeState) {
        let formed = state.is_formed();
        let delta = frame.delta;
        self.time = frame.elapsed;

        let target = if formed { STAR_FORMED_POSITION } else { STAR_CHAOS_POSITION };
        self.position = self.position.lerp(target, (delta * 1.5).clamp(0.0, 1.0));

        self.euler.y += delta * 0.5;

        let pulse = (frame.elapsed * 2.0).sin() * 0.1;
        let target_scale = if formed { 1.0 } else { 1.5 } + pulse;
        self.scale += (target_scale - self.scale) * (delta * 2.0).clamp(0.0, 1.0);

        if formed {
            let damp = (delta * 2.0).clamp(0.0, 1.0);
            self.euler.x -= self.euler.x * damp;
            self.euler.z -= self.euler.z * damp;
        } else {
            self.euler.z += delta * 0.5;
            self.euler.x += delta * 0.2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(star: &mut TopStar, state: TreeState, frames: u32) {
        let mut frame = FrameTime {
            elapsed: star.time,
            ..FrameTime::default()
        };
        for _ in 0..frames {
            frame.delta = 1.0 / 60.0;
            frame.elapsed += frame.delta;
            star.update(frame, state);
        }
    }

    #[test]
    fn test_outline_shape() {
        let outline = star_outline();
        assert_eq!(outline.len(), 10);
        assert!((outline[0] - Vec2::new(0.0, -1.2)).length() < 1e-5);
        for (i, p) in outline.iter().enumerate() {
            let expected = if i % 2 == 0 { OUTER_RADIUS } else { INNER_RADIUS };
            assert!((p.length() - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rises_when_formed() {
        let mut star = TopStar::new(&mut SceneRng::new(1), TreeState::Chaos);
        assert_eq!(star.position(), STAR_CHAOS_POSITION);
        run(&mut star, TreeState::Formed, 600);
        assert!((star.position() - STAR_FORMED_POSITION).length() < 1e-3);
        assert!(star.euler().x.abs() < 1e-3);
        assert!(star.euler().z.abs() < 1e-3);
        assert!((0.85..=1.15).contains(&star.scale()));
    }

    #[test]
    fn test_chaos_tumbles_and_grows() {
        let mut star = TopStar::new(&mut SceneRng::new(1), TreeState::Chaos);
        run(&mut star, TreeState::Chaos, 300);
        assert!(star.euler().z > 2.0);
        assert!(star.euler().x > 0.9);
        assert!((1.35..=1.65).contains(&star.scale()));
    }

    #[test]
    fn test_light_follows_star() {
        let star = TopStar::new(&mut SceneRng::new(1), TreeState::Formed);
        let light = star.light();
        assert!((light.position - STAR_FORMED_POSITION).length() < 0.1);
        assert_eq!(light.distance, 10.0);
        assert_eq!(light.intensity, 80.0);
    }
}
