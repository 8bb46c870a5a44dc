//! Gifts that rain down around the trunk, pile up, and fall again.
//!
//! Each gift runs a two-phase loop that ignores the macro state entirely:
//! it drops at a constant speed until it reaches its landing height, rests
//! for its dwell time, shrinks away during the final second, then reappears
//! high above the same spot.

use std::f32::consts::PI;

use glam::{EulerRot, Mat4, Quat, Vec3};

use super::{srgb_hex, Material, MeshInstance, Subsystem};
use crate::config::{GiftTuning, Range};
use crate::sampling::SceneRng;
use crate::state::TreeState;
use crate::time::FrameTime;

/// Gold, dark red, dark slate gray, silver, bright gold, white.
pub const GIFT_PALETTE: [u32; 6] = [0xD4AF37, 0x8B0000, 0x2F4F4F, 0xC0C0C0, 0xFFD700, 0xFFFFFF];

/// Length of the shrink-out at the end of a dwell, in seconds.
const SHRINK_WINDOW: f32 = 1.0;
const MIN_SHRINK: f32 = 0.01;

const GIFT_MATERIAL: Material = Material {
    roughness: 0.2,
    metalness: 0.5,
    emissive: Vec3::ZERO,
    emissive_intensity: 1.0,
    env_intensity: 1.0,
    double_sided: false,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GiftPhase {
    Falling,
    /// Resting on the pile for `dwell` seconds so far.
    Landed { dwell: f32 },
}

impl GiftPhase {
    pub fn is_landed(&self) -> bool {
        matches!(self, GiftPhase::Landed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gift {
    /// Landing spot; `x` and `z` never change.
    pub land: Vec3,
    pub position: Vec3,
    pub euler: Vec3,
    /// Angular velocity per axis, rad/s.
    pub spin: Vec3,
    pub velocity: f32,
    pub scale: Vec3,
    pub max_dwell: f32,
    /// Linear RGB.
    pub color: Vec3,
    pub phase: GiftPhase,
    /// Completed landings since construction.
    pub landings: u32,
    /// Completed recycles since construction.
    pub recycles: u32,
}

impl Gift {
    /// Scale used for drawing, including the shrink-out.
    pub fn render_scale(&self) -> Vec3 {
        match self.phase {
            GiftPhase::Landed { dwell } if self.max_dwell - dwell < SHRINK_WINDOW => {
                self.scale * (self.max_dwell - dwell).max(MIN_SHRINK)
            }
            _ => self.scale,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.euler.x, self.euler.y, self.euler.z);
        Mat4::from_scale_rotation_translation(self.render_scale(), rotation, self.position)
    }

    fn step(&mut self, delta: f32, respawn: impl FnOnce() -> f32) {
        match self.phase {
            GiftPhase::Falling => {
                self.position.y -= self.velocity * delta;
                self.euler += self.spin * delta;
                if self.position.y <= self.land.y {
                    self.position.y = self.land.y;
                    self.phase = GiftPhase::Landed { dwell: 0.0 };
                    self.landings += 1;
                }
            }
            GiftPhase::Landed { dwell } => {
                let dwell = dwell + delta;
                if dwell > self.max_dwell {
                    self.position.y = respawn();
                    self.phase = GiftPhase::Falling;
                    self.recycles += 1;
                } else {
                    self.phase = GiftPhase::Landed { dwell };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallingGifts {
    items: Vec<Gift>,
    respawn_height: Range,
    rng: SceneRng,
}

impl FallingGifts {
    /// Build `count` gifts. The rng is kept for drawing respawn heights.
    pub fn new(count: usize, tuning: &GiftTuning, mut rng: SceneRng) -> Self {
        let items = (0..count)
            .map(|_| {
                let angle = rng.angle();
                let radius = rng.in_range(tuning.ring_radius);
                let land = Vec3::new(
                    angle.cos() * radius,
                    rng.in_range(tuning.pile_height),
                    angle.sin() * radius,
                );
                let spawn_y = rng.in_range(tuning.spawn_height);
                let euler = Vec3::new(rng.unit() * PI, rng.unit() * PI, rng.unit() * PI);
                let spin = Vec3::new(
                    rng.in_range(tuning.spin),
                    rng.in_range(tuning.spin),
                    rng.in_range(tuning.spin),
                );
                let scale = Vec3::new(
                    rng.in_range(tuning.scale),
                    rng.in_range(tuning.scale),
                    rng.in_range(tuning.scale),
                );

                Gift {
                    land,
                    position: Vec3::new(land.x, spawn_y.max(land.y), land.z),
                    euler,
                    spin,
                    velocity: rng.in_range(tuning.velocity),
                    scale,
                    max_dwell: rng.in_range(tuning.dwell),
                    color: srgb_hex(*rng.pick(&GIFT_PALETTE)),
                    phase: GiftPhase::Falling,
                    landings: 0,
                    recycles: 0,
                }
            })
            .collect();

        Self {
            items,
            respawn_height: tuning.respawn_height,
            rng,
        }
    }

    pub fn items(&self) -> &[Gift] {
        &self.items
    }

    pub fn landed_count(&self) -> usize {
        self.items.iter().filter(|g| g.phase.is_landed()).count()
    }

    pub fn write_instances(&self, out: &mut Vec<MeshInstance>) {
        out.extend(
            self.items
                .iter()
                .map(|g| MeshInstance::new(g.matrix(), g.color, &GIFT_MATERIAL)),
        );
    }
}

impl Subsystem for FallingGifts {
    fn name(&self) -> &'static str {
        "gifts"
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn update(&mut self, frame: FrameTime, _state: TreeState) {
        let rng = &mut self.rng;
        let respawn = self.respawn_height;
        for gift in &mut self.items {
            gift.step(frame.delta, || rng.in_range(respawn));
        }
    }
}
