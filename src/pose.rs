//! Per-instance transforms for the CPU-driven subsystems.
//!
//! Ornaments, ribbons, photos and the star carry their current transform
//! from one frame to the next. A [`Pose`] caches the decomposed form, so a
//! frame never has to pull position and rotation back out of a matrix.

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

/// Position, orientation and scale of one instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Move a fraction `t` of the way toward `target`.
    ///
    /// `t` is clamped to `[0, 1]` so a long frame cannot overshoot.
    pub fn approach(&mut self, target: Vec3, t: f32) {
        self.position = self.position.lerp(target, t.clamp(0.0, 1.0));
    }

    /// Rotate a fraction `t` of the way toward `target` along the short arc.
    pub fn turn_toward(&mut self, target: Quat, t: f32) {
        self.rotation = self.rotation.slerp(target, t.clamp(0.0, 1.0)).normalize();
    }

    /// Current rotation as XYZ Euler angles.
    pub fn euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    pub fn set_euler(&mut self, euler: Vec3) {
        self.rotation = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z);
    }

    /// Add to the XYZ Euler angles. Cheap spin for the chaos state, where
    /// gimbal artifacts do not matter.
    pub fn spin(&mut self, delta: Vec3) {
        let euler = self.euler();
        self.set_euler(euler + delta);
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Rotation that points local +Z from `eye` toward `target`.
///
/// Falls back to a nudged forward vector when the direction is parallel to
/// `up`, and to identity when `eye == target`.
pub fn look_rotation(eye: Vec3, target: Vec3, up: Vec3) -> Quat {
    let forward = target - eye;
    if forward.length_squared() < 1e-12 {
        return Quat::IDENTITY;
    }
    let z = forward.normalize();

    let mut x = up.cross(z);
    if x.length_squared() < 1e-12 {
        // Looking straight along up: tip forward slightly off-axis.
        let nudged = if up.z.abs() > 0.99 {
            (z + Vec3::X * 1e-4).normalize()
        } else {
            (z + Vec3::Z * 1e-4).normalize()
        };
        x = up.cross(nudged);
    }
    let x = x.normalize();
    let y = z.cross(x);

    Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize()
}
