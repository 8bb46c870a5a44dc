//! Orbit camera around the tree.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::config::CameraConfig;

/// Fraction of the pending orbit motion applied per 60 Hz frame.
const DAMPING: f32 = 0.05;
/// Dolly factor per scroll line.
const ZOOM_STEP: f32 = 0.95;
const MIN_POLAR: f32 = 1e-3;

/// Uniform block shared by every pass, bind group 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub eye: [f32; 4],
    /// Target width and height in pixels, point scale, unused.
    pub viewport: [f32; 4],
    /// Elapsed seconds, frame delta, unused, unused.
    pub time: [f32; 4],
}

/// Damped orbit camera with distance and polar limits.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Azimuth around +y in radians, 0 looking down -z.
    pub azimuth: f32,
    /// Angle from +y in radians.
    pub polar: f32,
    pub distance: f32,
    pub target: Vec3,
    pending_azimuth: f32,
    pending_polar: f32,
    config: CameraConfig,
}

impl OrbitCamera {
    pub fn new(config: &CameraConfig) -> Self {
        let offset = config.position;
        let distance = offset.length().max(1e-3);
        let polar = (offset.y / distance).clamp(-1.0, 1.0).acos();
        let azimuth = offset.x.atan2(offset.z);

        let mut camera = Self {
            azimuth,
            polar,
            distance,
            target: Vec3::ZERO,
            pending_azimuth: 0.0,
            pending_polar: 0.0,
            config: *config,
        };
        camera.clamp();
        camera
    }

    /// Queue a drag of `pixels`. A drag across the full height turns a full circle.
    pub fn drag(&mut self, pixels: Vec2, viewport_height: f32) {
        let h = viewport_height.max(1.0);
        self.pending_azimuth -= TAU * pixels.x / h;
        self.pending_polar -= TAU * pixels.y / h;
    }

    /// Dolly in for positive `lines`, out for negative.
    pub fn zoom(&mut self, lines: f32) {
        self.distance *= ZOOM_STEP.powf(lines);
        self.clamp();
    }

    /// Apply damped motion and auto-rotation for one frame.
    pub fn update(&mut self, delta: f32, auto_rotate_speed: f32) {
        let alpha = 1.0 - (1.0 - DAMPING).powf(delta.max(0.0) * 60.0);
        self.azimuth += self.pending_azimuth * alpha + auto_rotate_speed * delta;
        self.polar += self.pending_polar * alpha;
        self.pending_azimuth *= 1.0 - alpha;
        self.pending_polar *= 1.0 - alpha;
        self.clamp();
    }

    fn clamp(&mut self) {
        self.polar = self.polar.clamp(MIN_POLAR, self.config.max_polar_angle);
        self.distance = self
            .distance
            .clamp(self.config.min_distance, self.config.max_distance);
    }

    pub fn position(&self) -> Vec3 {
        let s = self.polar.sin();
        self.target
            + self.distance * Vec3::new(s * self.azimuth.sin(), self.polar.cos(), s * self.azimuth.cos())
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.config.fov_degrees.to_radians(),
            aspect.max(1e-3),
            self.config.near,
            self.config.far,
        )
    }

    pub fn uniform(&self, width: u32, height: u32, point_scale: f32, elapsed: f32, delta: f32) -> CameraUniform {
        let view = self.view_matrix();
        let proj = self.projection(width as f32 / height.max(1) as f32);
        CameraUniform {
            view_proj: (proj * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            eye: self.position().extend(1.0).to_array(),
            viewport: [width as f32, height as f32, point_scale, 0.0],
            time: [elapsed, delta, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_configured_position() {
        let camera = OrbitCamera::new(&CameraConfig::default());
        assert!((camera.position() - Vec3::new(0.0, 4.0, 20.0)).length() < 1e-4);
    }

    #[test]
    fn test_distance_limits() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        camera.zoom(100.0);
        assert_eq!(camera.distance, 10.0);
        camera.zoom(-100.0);
        assert_eq!(camera.distance, 40.0);
    }

    #[test]
    fn test_never_below_the_floor() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        camera.drag(Vec2::new(0.0, -5000.0), 800.0);
        for _ in 0..600 {
            camera.update(1.0 / 60.0, 0.0);
        }
        assert!(camera.polar <= std::f32::consts::FRAC_PI_2 + 1e-6);
        assert!(camera.position().y >= -1e-4);
    }

    #[test]
    fn test_auto_rotate_rate() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        let start = camera.azimuth;
        for _ in 0..60 {
            camera.update(1.0 / 60.0, 0.5);
        }
        assert!((camera.azimuth - start - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_drag_is_damped() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        let start = camera.azimuth;
        camera.drag(Vec2::new(-100.0, 0.0), 800.0);
        camera.update(1.0 / 60.0, 0.0);
        let after_one = camera.azimuth - start;
        let total = TAU * 100.0 / 800.0;
        assert!((after_one - total * DAMPING).abs() < 1e-4);
        for _ in 0..600 {
            camera.update(1.0 / 60.0, 0.0);
        }
        assert!((camera.azimuth - start - total).abs() < 1e-3);
    }

    #[test]
    fn test_uniform_stride() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 176);
    }
}
