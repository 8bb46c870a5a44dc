//! Seeded randomness and geometric samplers.
//!
//! Every subsystem draws its static per-instance data from a [`SceneRng`]
//! forked off the scene seed, so two scenes built from the same seed hold
//! identical arrays, and changing one subsystem's count does not reshuffle
//! the others.
//!
//! ```ignore
//! let mut rng = SceneRng::new(1).fork(streams::FOLIAGE);
//! let chaos = rng.sample_sphere_volume(15.0) + Vec3::Y * 5.0;
//! let target = rng.sample_cone_volume(12.0, 5.0);
//! ```

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

use crate::config::Range;

/// Stream identifiers for [`SceneRng::fork`], one per subsystem.
pub mod streams {
    pub const FOLIAGE: u64 = 1;
    pub const ORNAMENTS: u64 = 2;
    pub const LIGHTS: u64 = 3;
    pub const RIBBON_RED: u64 = 4;
    pub const RIBBON_GOLD: u64 = 5;
    pub const PHOTOS: u64 = 6;
    pub const STAR: u64 = 7;
    pub const GIFTS: u64 = 8;
    pub const SNOW: u64 = 9;
    pub const SKY: u64 = 10;
}

/// Deterministic RNG for static scene data.
#[derive(Debug, Clone)]
pub struct SceneRng {
    seed: u64,
    rng: SmallRng,
}

impl SceneRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Independent generator for one named stream of this seed.
    pub fn fork(&self, stream: u64) -> Self {
        Self::new(splitmix64(self.seed ^ splitmix64(stream)))
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    // ========== Random primitives ==========

    /// Uniform f32 in `[0, 1)`.
    #[inline]
    pub fn unit(&mut self) -> f32 {
        self.rng.gen()
    }

    #[inline]
    fn unit_f64(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Uniform f32 in `[min, max)`; returns `min` for an empty range.
    #[inline]
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.unit()
    }

    #[inline]
    pub fn in_range(&mut self, range: Range) -> f32 {
        range.lerp(self.unit())
    }

    /// Uniform angle in `[0, 2π)`.
    #[inline]
    pub fn angle(&mut self) -> f32 {
        (self.unit_f64() * TAU) as f32
    }

    /// Pick one element uniformly. Panics on an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.rng.gen_range(0..items.len())]
    }

    // ========== Geometry samplers ==========

    /// Uniform point inside a ball of radius `r_max` centered at the origin.
    ///
    /// `r = r_max·∛u`, `θ = 2πu'`, `φ = acos(2u''−1)`; z is the polar axis.
    pub fn sample_sphere_volume(&mut self, r_max: f32) -> Vec3 {
        let r = r_max as f64 * self.unit_f64().cbrt();
        let theta = self.unit_f64() * TAU;
        let phi = (2.0 * self.unit_f64() - 1.0).acos();
        Vec3::new(
            (r * phi.sin() * theta.cos()) as f32,
            (r * phi.sin() * theta.sin()) as f32,
            (r * phi.cos()) as f32,
        )
    }

    /// Uniform point on a sphere of the given radius.
    pub fn sample_sphere_surface(&mut self, radius: f32) -> Vec3 {
        let theta = self.unit_f64() * TAU;
        let cos_phi = 2.0 * self.unit_f64() - 1.0;
        let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
        let r = radius as f64;
        Vec3::new(
            (r * sin_phi * theta.cos()) as f32,
            (r * sin_phi * theta.sin()) as f32,
            (r * cos_phi) as f32,
        )
    }

    /// Point on the lateral surface of an apex-up cone with base at y = 0.
    ///
    /// Height is uniform on `[0, height]`; the radius is exactly
    /// `radius·(1 − y/height)`.
    pub fn sample_cone_surface(&mut self, height: f32, radius: f32) -> Vec3 {
        let y = self.unit_f64() * height as f64;
        let r = cone_radius_at(height as f64, radius as f64, y);
        let angle = self.unit_f64() * TAU;
        Vec3::new((r * angle.cos()) as f32, y as f32, (r * angle.sin()) as f32)
    }

    /// Point inside the cone, uniform on each horizontal disk.
    pub fn sample_cone_volume(&mut self, height: f32, radius: f32) -> Vec3 {
        let y = self.unit_f64() * height as f64;
        let r = cone_radius_at(height as f64, radius as f64, y) * self.unit_f64().sqrt();
        let angle = self.unit_f64() * TAU;
        Vec3::new((r * angle.cos()) as f32, y as f32, (r * angle.sin()) as f32)
    }

    /// Uniform point in an axis-aligned box centered at the origin.
    pub fn sample_box(&mut self, half_extents: Vec3) -> Vec3 {
        Vec3::new(
            self.range(-half_extents.x, half_extents.x),
            self.range(-half_extents.y, half_extents.y),
            self.range(-half_extents.z, half_extents.z),
        )
    }
}

/// Cone radius at height `y` for an apex-up cone.
#[inline]
fn cone_radius_at(height: f64, radius: f64, y: f64) -> f64 {
    radius * (1.0 - y / height)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: usize = 1_000_000;
    const BINS: usize = 10;

    /// Assert every bin holds an equal share of the values within 2%.
    fn assert_uniform_bins(values: impl Iterator<Item = f64>) {
        let mut bins = [0usize; BINS];
        let mut total = 0usize;
        for v in values {
            let idx = ((v * BINS as f64) as usize).min(BINS - 1);
            bins[idx] += 1;
            total += 1;
        }
        let expected = total as f64 / BINS as f64;
        for (i, &count) in bins.iter().enumerate() {
            let err = (count as f64 - expected).abs() / expected;
            assert!(err < 0.02, "bin {} has {} samples ({:.2}% off)", i, count, err * 100.0);
        }
    }

    #[test]
    fn test_sphere_volume_bounds() {
        let mut rng = SceneRng::new(3);
        for _ in 0..10_000 {
            assert!(rng.sample_sphere_volume(15.0).length() <= 15.0 + 1e-4);
        }
    }

    #[test]
    fn test_sphere_volume_uniform_in_radius() {
        let mut rng = SceneRng::new(11);
        let r_max = 20.0f64;
        // For a uniform ball, (r / r_max)^3 is uniform on [0, 1].
        assert_uniform_bins((0..SAMPLES).map(|_| {
            let p = rng.sample_sphere_volume(r_max as f32).as_dvec3();
            (p.length() / r_max).powi(3)
        }));
    }

    #[test]
    fn test_sphere_volume_uniform_in_direction() {
        let mut rng = SceneRng::new(12);
        // z / r is uniform on [-1, 1] for an isotropic distribution.
        assert_uniform_bins((0..SAMPLES).map(|_| {
            let p = rng.sample_sphere_volume(1.0).as_dvec3();
            (p.z / p.length() + 1.0) * 0.5
        }));
    }

    #[test]
    fn test_cone_surface_exact_radius() {
        let mut rng = SceneRng::new(5);
        let (h, r) = (12.0f32, 5.0f32);
        for _ in 0..SAMPLES {
            let p = rng.sample_cone_surface(h, r);
            let expected = r as f64 * (1.0 - p.y as f64 / h as f64);
            let actual = ((p.x as f64).powi(2) + (p.z as f64).powi(2)).sqrt();
            assert!((actual - expected).abs() < 1e-6, "{:?}", p);
            assert!((0.0..=h).contains(&p.y));
        }
    }

    #[test]
    fn test_cone_surface_uniform_height_and_angle() {
        let mut rng = SceneRng::new(6);
        let points: Vec<Vec3> = (0..SAMPLES).map(|_| rng.sample_cone_surface(12.0, 5.0)).collect();
        assert_uniform_bins(points.iter().map(|p| p.y as f64 / 12.0));
        assert_uniform_bins(points.iter().map(|p| {
            let a = (p.z as f64).atan2(p.x as f64);
            (a + std::f64::consts::PI) / TAU
        }));
    }

    #[test]
    fn test_cone_volume_inside_cone() {
        let mut rng = SceneRng::new(7);
        for _ in 0..100_000 {
            let p = rng.sample_cone_volume(12.0, 5.0);
            assert!((0.0..=12.0).contains(&p.y));
            let rho = (p.x * p.x + p.z * p.z).sqrt();
            assert!(rho <= 5.0 * (1.0 - p.y / 12.0) + 1e-5);
        }
    }

    #[test]
    fn test_cone_volume_uniform_on_disks() {
        let mut rng = SceneRng::new(8);
        // On a uniform disk, (rho / R)^2 is uniform on [0, 1].
        assert_uniform_bins((0..SAMPLES).filter_map(|_| {
            let p = rng.sample_cone_volume(12.0, 5.0).as_dvec3();
            let disk = 5.0 * (1.0 - p.y / 12.0);
            (disk > 1e-3).then(|| (p.x * p.x + p.z * p.z) / (disk * disk))
        }));
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SceneRng::new(42).fork(streams::LIGHTS);
        let mut b = SceneRng::new(42).fork(streams::LIGHTS);
        for _ in 0..100 {
            assert_eq!(a.sample_sphere_volume(25.0), b.sample_sphere_volume(25.0));
        }
    }

    #[test]
    fn test_streams_differ() {
        let mut a = SceneRng::new(42).fork(streams::LIGHTS);
        let mut b = SceneRng::new(42).fork(streams::ORNAMENTS);
        assert_ne!(a.unit(), b.unit());
    }
}
