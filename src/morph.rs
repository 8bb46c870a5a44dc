//! Morph math shared by the CPU and the vertex programs.
//!
//! The GPU-driven subsystems (foliage, lights, snow, sky) keep no per-instance
//! CPU state: each vertex is a pure function of its static attributes, the
//! elapsed time and one eased progress scalar. The functions here are the CPU
//! mirrors of those vertex programs. They are what the tests check, and they
//! must stay in step with the WGSL in `gpu::shaders`.

use glam::Vec3;

/// Foliage's `uProgress` chase rate, per second.
pub const FOLIAGE_PROGRESS_RATE: f32 = 2.0;
/// Lights chase slower, so they trail the foliage.
pub const LIGHTS_PROGRESS_RATE: f32 = 1.5;

pub const FOLIAGE_DEEP: Vec3 = Vec3::new(0.0, 0.26, 0.15);
pub const FOLIAGE_LEAF: Vec3 = Vec3::new(0.1, 0.4, 0.1);
pub const SPARKLE_GOLD: Vec3 = Vec3::new(1.0, 0.84, 0.0);
/// Warm white, #fff8e7.
pub const LIGHT_COLOR: Vec3 = Vec3::new(1.0, 0.97, 0.9);

/// GLSL `smoothstep`.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn ease_out_cubic(x: f32) -> f32 {
    1.0 - (1.0 - x).powi(3)
}

/// Floor-based modulo, the GLSL `mod`. Result has the sign of `y`.
#[inline]
pub fn glsl_mod(x: f32, y: f32) -> f32 {
    x - y * (x / y).floor()
}

/// Eased global progress toward the current macro state.
///
/// Each tick moves `value` a fraction `clamp(delta·rate, 0, 1)` of the way
/// to the target, so it approaches monotonically and never overshoots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphProgress {
    value: f32,
    rate: f32,
}

impl MorphProgress {
    pub fn new(rate: f32) -> Self {
        Self { value: 0.0, rate }
    }

    /// Start already settled at `value`.
    pub fn with_value(rate: f32, value: f32) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            rate,
        }
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Advance one frame toward `target`.
    pub fn step(&mut self, target: f32, delta: f32) -> f32 {
        let alpha = (delta * self.rate).clamp(0.0, 1.0);
        self.value += (target - self.value) * alpha;
        self.value
    }

    /// Overwrite the value, e.g. when replaying a captured frame.
    pub fn set(&mut self, value: f32) {
        self.value = value.clamp(0.0, 1.0);
    }
}

/// Output of a point vertex program before projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointVertex {
    /// Position in the subsystem's local space.
    pub position: Vec3,
    /// Size numerator; the rasterized size is this over the view depth.
    pub size: f32,
    pub color: Vec3,
    pub alpha: f32,
}

/// Foliage morph without the wind term: `(position, activation)`.
pub fn foliage_morph(chaos: Vec3, target: Vec3, random: f32, progress: f32) -> (Vec3, f32) {
    let delay = random * 0.5;
    let activation = smoothstep(delay, 1.0, progress * (1.0 + delay));
    let eased = ease_out_cubic(activation);
    (chaos.lerp(target, eased), activation)
}

/// Full foliage vertex program.
pub fn foliage_vertex(chaos: Vec3, target: Vec3, random: f32, progress: f32, time: f32) -> PointVertex {
    let (mut position, activation) = foliage_morph(chaos, target, random, progress);

    let wind = (time * 2.0 + position.y * 0.5 + random * 10.0).sin() * 0.05 * activation;
    position.x += wind;
    position.z += wind;

    let base = FOLIAGE_DEEP.lerp(FOLIAGE_LEAF, random);
    let sparkle = (time * 5.0 + random * 100.0).sin();
    let color = if sparkle > 0.98 { base.lerp(SPARKLE_GOLD, 0.8) } else { base };

    PointVertex {
        position,
        size: 15.0 * random + 5.0,
        color,
        alpha: 1.0,
    }
}

/// Lights morph: a height-based sweep, so the bottom of the strand lands first.
pub fn lights_morph(chaos: Vec3, target: Vec3, progress: f32) -> Vec3 {
    let delay = target.y * 0.05;
    let activation = smoothstep(0.0, 1.0, progress * 1.5 - delay);
    chaos.lerp(target, ease_out_cubic(activation.clamp(0.0, 1.0)))
}

/// Full lights vertex program.
pub fn lights_vertex(
    chaos: Vec3,
    target: Vec3,
    blink_offset: f32,
    blink_speed: f32,
    progress: f32,
    time: f32,
) -> PointVertex {
    let mut position = lights_morph(chaos, target, progress);
    if progress > 0.8 {
        position.x += (time + position.y).sin() * 0.02;
        position.z += (time + position.y).cos() * 0.02;
    }

    PointVertex {
        position,
        size: 25.0,
        color: LIGHT_COLOR,
        alpha: 0.6 + 0.4 * (time * blink_speed + blink_offset).sin(),
    }
}

/// Lights sprite falloff at distance `dist` from the sprite center.
pub fn light_sprite_alpha(dist: f32) -> f32 {
    if dist > 0.5 {
        return 0.0;
    }
    let core = 1.0 - smoothstep(0.0, 0.1, dist);
    let glow = 1.0 - smoothstep(0.0, 0.5, dist);
    core * 0.8 + glow * 0.4
}

/// Foliage sprite falloff: hard disk with a feathered rim.
pub fn foliage_sprite_alpha(dist: f32) -> f32 {
    if dist > 0.5 {
        return 0.0;
    }
    1.0 - smoothstep(0.3, 0.5, dist)
}

/// Snow height after wrapping, in `[-height/2, height/2]`.
pub fn snow_wrap_y(base_y: f32, time: f32, speed: f32, height: f32) -> f32 {
    let y = base_y - time * speed;
    // Rounding in the division can land a hair outside [0, height).
    glsl_mod(y + 1000.0 * height, height).clamp(0.0, height) - height * 0.5
}

/// Full snow vertex program.
pub fn snow_vertex(base: Vec3, speed: f32, random: f32, time: f32, height: f32) -> PointVertex {
    let position = Vec3::new(
        base.x + (time * 0.5 + random * 10.0).sin() * 0.5,
        snow_wrap_y(base.y, time, speed, height),
        base.z + (time * 0.3 + random * 20.0).cos() * 0.3,
    );
    PointVertex {
        position,
        size: 12.0 * random + 4.0,
        color: Vec3::ONE,
        alpha: 0.7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_glsl_mod_negative() {
        assert!((glsl_mod(-1.0, 50.0) - 49.0).abs() < 1e-4);
        assert!((glsl_mod(51.0, 50.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_progress_monotone_and_converges() {
        let mut p = MorphProgress::new(FOLIAGE_PROGRESS_RATE);
        let mut last = p.value();
        for _ in 0..300 {
            let v = p.step(1.0, 1.0 / 60.0);
            assert!(v >= last);
            assert!(v <= 1.0);
            last = v;
        }
        assert!(1.0 - p.value() < 1e-3);
    }

    #[test]
    fn test_progress_large_delta_does_not_overshoot() {
        let mut p = MorphProgress::new(LIGHTS_PROGRESS_RATE);
        p.step(1.0, 10.0);
        assert_eq!(p.value(), 1.0);
        p.step(0.0, -1.0);
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn test_lights_lag_foliage() {
        let mut foliage = MorphProgress::new(FOLIAGE_PROGRESS_RATE);
        let mut lights = MorphProgress::new(LIGHTS_PROGRESS_RATE);
        for _ in 0..30 {
            foliage.step(1.0, 1.0 / 60.0);
            lights.step(1.0, 1.0 / 60.0);
        }
        assert!(lights.value() < foliage.value());
    }

    #[test]
    fn test_foliage_endpoints() {
        let chaos = Vec3::new(3.0, 14.0, -7.0);
        let target = Vec3::new(1.0, 6.0, 0.5);
        for random in [0.0, 0.25, 0.5, 0.99] {
            let (at_zero, act0) = foliage_morph(chaos, target, random, 0.0);
            assert!((at_zero - chaos).length() < 1e-3);
            assert_eq!(act0, 0.0);

            let (at_one, act1) = foliage_morph(chaos, target, random, 1.0);
            assert!((at_one - target).length() < 1e-3);
            assert_eq!(act1, 1.0);
        }
    }

    #[test]
    fn test_foliage_no_wind_at_rest() {
        let chaos = Vec3::new(-2.0, 8.0, 4.0);
        let v = foliage_vertex(chaos, Vec3::ZERO, 0.3, 0.0, 12.34);
        assert_eq!(v.position, chaos);
    }

    #[test]
    fn test_foliage_size_and_color_range() {
        let v = foliage_vertex(Vec3::ZERO, Vec3::ONE, 1.0, 0.5, 0.0);
        assert!((v.size - 20.0).abs() < 1e-5);
        let v = foliage_vertex(Vec3::ZERO, Vec3::ONE, 0.0, 0.5, 0.0);
        assert!((v.size - 5.0).abs() < 1e-5);
        assert_eq!(v.color, FOLIAGE_DEEP);
    }

    #[test]
    fn test_lights_endpoints() {
        let chaos = Vec3::new(10.0, 20.0, -5.0);
        let target = Vec3::new(2.0, 4.0, 1.0);
        assert!((lights_morph(chaos, target, 0.0) - chaos).length() < 1e-5);
        assert!((lights_morph(chaos, target, 1.0) - target).length() < 1e-3);
    }

    #[test]
    fn test_lights_brightness_range() {
        for i in 0..100 {
            let t = i as f32 * 0.37;
            let v = lights_vertex(Vec3::ZERO, Vec3::Y, 42.0, 3.5, 1.0, t);
            assert!((0.2..=1.0).contains(&v.alpha));
        }
    }

    #[test]
    fn test_sprite_alpha_outside_disk() {
        assert_eq!(light_sprite_alpha(0.6), 0.0);
        assert_eq!(foliage_sprite_alpha(0.51), 0.0);
        assert!((light_sprite_alpha(0.0) - 1.2).abs() < 1e-6);
        assert_eq!(foliage_sprite_alpha(0.2), 1.0);
    }

    #[test]
    fn test_snow_wrap_range() {
        let height = 50.0;
        for i in 0..1000 {
            let t = i as f32 * 0.731;
            let y = snow_wrap_y(12.0, t, 4.2, height);
            assert!((-height / 2.0..=height / 2.0).contains(&y), "y = {}", y);
        }
    }
}
