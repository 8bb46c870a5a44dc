//! The scene's particle subsystems.
//!
//! Every subsystem owns static per-instance data generated once from a
//! forked [`SceneRng`](crate::sampling::SceneRng) and a per-frame update
//! rule. They never observe each other; each frame they see only the macro
//! state and the frame clock.
//!
//! | Subsystem | Driven by | Instances |
//! |-----------|-----------|-----------|
//! | [`Foliage`] | vertex program + eased progress | points |
//! | [`Lights`] | vertex program + eased progress | additive points |
//! | [`Snow`], [`Sky`] | vertex program + time | points |
//! | [`Ornaments`], [`RibbonStrand`], [`Photos`], [`TopStar`] | CPU lerp | meshes |
//! | [`FallingGifts`] | CPU state machine | meshes |

mod foliage;
mod gifts;
mod lights;
mod ornaments;
mod photos;
mod ribbons;
mod sky;
mod snow;
mod star;

pub use foliage::{Foliage, FoliageParticle};
pub use gifts::{FallingGifts, Gift, GiftPhase, GIFT_PALETTE};
pub use lights::{LightParticle, Lights};
pub use ornaments::{Ornament, Ornaments, ORNAMENT_PALETTE};
pub use photos::{Photos, Polaroid, FRAME_SIZE, PLACEHOLDER_COLOR};
pub use ribbons::{spiral_point, RibbonSegment, RibbonStrand, StrandParams, SEGMENT_SIZE};
pub use sky::{sky_point_size, sky_sprite_alpha, Sky, SkyStar};
pub use snow::{Snow, Snowflake};
pub use star::{star_outline, PointLight, TopStar, STAR_CHAOS_POSITION, STAR_FORMED_POSITION};

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::state::TreeState;
use crate::time::FrameTime;

/// Common surface of all subsystems.
pub trait Subsystem {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Number of instances. Fixed for the subsystem's lifetime.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance one frame. Subsystems read the macro state, never write it.
    fn update(&mut self, frame: FrameTime, state: TreeState);
}

/// Surface parameters for the lit mesh pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub roughness: f32,
    pub metalness: f32,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub env_intensity: f32,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            roughness: 1.0,
            metalness: 0.0,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            env_intensity: 1.0,
            double_sided: false,
        }
    }
}

/// One instance in the lit mesh pass.
///
/// The normal matrix travels with the instance because gifts carry
/// non-uniform scale and WGSL has no matrix inverse.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshInstance {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    /// Linear RGB base color, alpha unused.
    pub color: [f32; 4],
    /// Linear RGB emissive color premultiplied by intensity.
    pub emissive: [f32; 4],
    /// roughness, metalness, env intensity, double-sided flag.
    pub material: [f32; 4],
}

impl MeshInstance {
    pub fn new(model: Mat4, color: Vec3, material: &Material) -> Self {
        let normal = normal_matrix(model);
        let emissive = material.emissive * material.emissive_intensity;
        Self {
            model: model.to_cols_array_2d(),
            normal: [
                normal.x_axis.extend(0.0).to_array(),
                normal.y_axis.extend(0.0).to_array(),
                normal.z_axis.extend(0.0).to_array(),
            ],
            color: color.extend(1.0).to_array(),
            emissive: emissive.extend(0.0).to_array(),
            material: Vec4::new(
                material.roughness,
                material.metalness,
                material.env_intensity,
                if material.double_sided { 1.0 } else { 0.0 },
            )
            .to_array(),
        }
    }

    /// World-space translation of the instance.
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.model[3][0], self.model[3][1], self.model[3][2])
    }
}

/// Inverse-transpose of the upper 3x3; identity for degenerate matrices.
fn normal_matrix(model: Mat4) -> Mat3 {
    let m = Mat3::from_mat4(model);
    if m.determinant().abs() < 1e-12 {
        return Mat3::IDENTITY;
    }
    m.inverse().transpose()
}

/// Convert an sRGB hex color (`0xRRGGBB`) to linear RGB.
pub fn srgb_hex(hex: u32) -> Vec3 {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    Vec3::new(channel(16), channel(8), channel(0))
}

pub(crate) fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}

/// Push a point on the cone surface `amount` further from the trunk.
pub(crate) fn outset(point: Vec3, amount: f32) -> Vec3 {
    let rho = (point.x * point.x + point.z * point.z).sqrt();
    if rho < 1e-6 {
        return point;
    }
    let k = (rho + amount) / rho;
    Vec3::new(point.x * k, point.y, point.z * k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_srgb_hex() {
        assert_eq!(srgb_hex(0x000000), Vec3::ZERO);
        assert!((srgb_hex(0xffffff) - Vec3::ONE).length() < 1e-5);
        let gold = srgb_hex(0xD4AF37);
        assert!(gold.x > gold.y && gold.y > gold.z);
    }

    #[test]
    fn test_outset() {
        let p = outset(Vec3::new(3.0, 2.0, 4.0), 0.5);
        assert!(((p.x * p.x + p.z * p.z).sqrt() - 5.5).abs() < 1e-5);
        assert_eq!(p.y, 2.0);
        assert_eq!(outset(Vec3::new(0.0, 12.0, 0.0), 0.2), Vec3::new(0.0, 12.0, 0.0));
    }

    #[test]
    fn test_instance_normal_matrix_non_uniform_scale() {
        let model = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 1.0, 1.0),
            Quat::IDENTITY,
            Vec3::ZERO,
        );
        let inst = MeshInstance::new(model, Vec3::ONE, &Material::default());
        assert!((inst.normal[0][0] - 0.5).abs() < 1e-6);
        assert!((inst.normal[1][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_instance_stride() {
        assert_eq!(std::mem::size_of::<MeshInstance>(), 160);
    }
}
