//! Polaroid frames spiralling around the tree.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{EulerRot, Mat4, Quat, Vec3};

use super::{srgb_hex, Material, MeshInstance, Subsystem};
use crate::config::TreeShape;
use crate::pose::Pose;
use crate::sampling::SceneRng;
use crate::state::TreeState;
use crate::time::FrameTime;

const CHAOS_RADIUS: f32 = 18.0;
const CHAOS_LIFT: f32 = 8.0;
const POLAROID_SCALE: f32 = 0.8;
/// White backing card, slightly behind the photo.
pub const FRAME_SIZE: (f32, f32) = (1.2, 1.5);
const FRAME_OFFSET: Vec3 = Vec3::new(0.0, 0.0, -0.01);
/// The photo sits above center, leaving the classic thick bottom border.
const PHOTO_OFFSET: Vec3 = Vec3::new(0.0, 0.1, 0.0);
/// Shown until a photo's texture has loaded.
pub const PLACEHOLDER_COLOR: u32 = 0x333333;

const FRAME_MATERIAL: Material = Material {
    roughness: 0.8,
    metalness: 0.0,
    emissive: Vec3::ZERO,
    emissive_intensity: 1.0,
    env_intensity: 1.0,
    double_sided: false,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Polaroid {
    pub chaos: Vec3,
    pub target: Vec3,
    pub target_rotation: Quat,
    pub speed: f32,
    pub pose: Pose,
}

impl Polaroid {
    /// Transform of the white backing card.
    pub fn frame_matrix(&self) -> Mat4 {
        self.pose.matrix()
            * Mat4::from_translation(FRAME_OFFSET)
            * Mat4::from_scale(Vec3::new(FRAME_SIZE.0, FRAME_SIZE.1, 1.0))
    }

    /// Transform of the unit photo plane.
    pub fn photo_matrix(&self) -> Mat4 {
        self.pose.matrix() * Mat4::from_translation(PHOTO_OFFSET)
    }
}

#[derive(Debug, Clone)]
pub struct Photos {
    items: Vec<Polaroid>,
    default_urls: Vec<String>,
    active_urls: Vec<String>,
    frame_color: Vec3,
}

impl Photos {
    pub fn new(
        count: usize,
        shape: &TreeShape,
        default_urls: Vec<String>,
        rng: &mut SceneRng,
        initial: TreeState,
    ) -> Self {
        let items = (0..count)
            .map(|i| {
                let chaos = rng.sample_sphere_volume(CHAOS_RADIUS) + Vec3::Y * CHAOS_LIFT;

                // Keep clear of the very bottom and the apex.
                let y = rng.range(1.0, shape.height - 1.0);
                let radius = shape.photo_radius * (1.0 - y / shape.height);
                let angle = (i as f32 / count as f32) * 4.0 * 2.0 * PI;
                let target = Vec3::new(radius * angle.cos(), y, radius * angle.sin());

                // Yaw so the face looks away from the trunk, then a small roll.
                let roll = (rng.unit() - 0.5) * 0.4;
                let target_rotation = Quat::from_euler(EulerRot::XYZ, 0.0, FRAC_PI_2 - angle, roll);

                let speed = rng.range(1.0, 1.5);
                let start = if initial.is_formed() {
                    Pose::at(target).with_rotation(target_rotation)
                } else {
                    Pose::at(chaos)
                };

                Polaroid {
                    chaos,
                    target,
                    target_rotation,
                    speed,
                    pose: start.with_scale(Vec3::splat(POLAROID_SCALE)),
                }
            })
            .collect();

        let active_urls = default_urls.clone();
        Self {
            items,
            default_urls,
            active_urls,
            frame_color: srgb_hex(0xfffff0),
        }
    }

    pub fn items(&self) -> &[Polaroid] {
        &self.items
    }

    /// Switch to the user's images, or back to the defaults for an empty list.
    pub fn set_user_images(&mut self, images: &[String]) {
        self.active_urls = if images.is_empty() {
            self.default_urls.clone()
        } else {
            images.to_vec()
        };
    }

    /// The URL polaroid `index` shows: entry `index mod k` of the active list.
    pub fn url(&self, index: usize) -> Option<&str> {
        if index >= self.items.len() || self.active_urls.is_empty() {
            return None;
        }
        Some(&self.active_urls[index % self.active_urls.len()])
    }

    /// The list polaroids currently index into.
    pub fn active_urls(&self) -> &[String] {
        &self.active_urls
    }

    pub fn write_frame_instances(&self, out: &mut Vec<MeshInstance>) {
        out.extend(
            self.items
                .iter()
                .map(|p| MeshInstance::new(p.frame_matrix(), self.frame_color, &FRAME_MATERIAL)),
        );
    }
}

impl Subsystem for Photos {
    fn name(&self) -> &'static str {
        "photos"
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn update(&mut self, frame: FrameTime, state: TreeState) {
        let formed = state.is_formed();
        let delta = frame.delta;

        for p in &mut self.items {
            let target = if formed { p.target } else { p.chaos };
            p.pose.approach(target, delta * p.speed);

            if formed {
                p.pose.turn_toward(p.target_rotation, delta * 2.0);
            } else {
                p.pose.spin(Vec3::new(delta * 0.5, 0.0, delta));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhotoConfig;

    fn build(count: usize) -> Photos {
        Photos::new(
            count,
            &TreeShape::default(),
            PhotoConfig::default().default_urls,
            &mut SceneRng::new(1),
            TreeState::Chaos,
        )
    }

    #[test]
    fn test_default_urls_cycle() {
        let photos = build(24);
        let defaults = PhotoConfig::default().default_urls;
        for i in 0..24 {
            assert_eq!(photos.url(i), Some(defaults[i % 6].as_str()));
        }
        assert_eq!(photos.url(24), None);
    }

    #[test]
    fn test_user_images_override_and_reset() {
        let mut photos = build(24);
        let user = vec!["file:///a.png".to_string(), "file:///b.png".to_string()];
        photos.set_user_images(&user);
        for i in 0..24 {
            assert_eq!(photos.url(i), Some(user[i % 2].as_str()));
        }
        photos.set_user_images(&[]);
        assert_eq!(photos.active_urls().len(), 6);
    }

    #[test]
    fn test_targets_face_outward() {
        let photos = build(24);
        for p in photos.items() {
            assert!((1.0..=11.0).contains(&p.target.y));
            let normal = p.target_rotation * Vec3::Z;
            let outward = Vec3::new(p.target.x, 0.0, p.target.z).normalize();
            // Roll keeps the normal; only the yaw decides where it points.
            assert!(normal.dot(outward) > 0.999);
        }
    }

    #[test]
    fn test_chaos_spin_then_formed_slerp() {
        let mut photos = build(3);
        let mut frame = FrameTime::default();
        for _ in 0..60 {
            frame.delta = 1.0 / 60.0;
            frame.elapsed += frame.delta;
            photos.update(frame, TreeState::Chaos);
        }
        assert!(photos.items()[0].pose.rotation.angle_between(Quat::IDENTITY) > 0.5);

        for _ in 0..900 {
            frame.delta = 1.0 / 60.0;
            frame.elapsed += frame.delta;
            photos.update(frame, TreeState::Formed);
        }
        for p in photos.items() {
            assert!((p.pose.position - p.target).length() < 0.01);
            assert!(p.pose.rotation.angle_between(p.target_rotation) < 0.01);
            assert_eq!(p.pose.scale, Vec3::splat(0.8));
        }
    }
}
