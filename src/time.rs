//! Frame clock.
//!
//! One clock drives the whole scene: every subsystem sees the same
//! `elapsed` and `delta` for a given frame.
//!
//! ```ignore
//! let mut clock = FrameClock::new();
//!
//! // once per redraw:
//! let frame = clock.tick();
//! scene.update(frame);
//! ```
//!
//! Tests and offline replays drive the clock with [`FrameClock::advance`]
//! instead, which never touches the wall clock.

use std::time::{Duration, Instant};

/// Largest delta handed to the scene; long stalls are clamped to this.
const MAX_DELTA: f32 = 0.1;

/// Timing values for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Seconds since the clock started, excluding paused time.
    pub elapsed: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
    /// Frames produced so far, including this one.
    pub frame: u64,
}

/// Wall-clock driven frame timer.
#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    elapsed: f64,
    delta: f32,
    frame: u64,
    paused: bool,
    fps: f32,
    fps_frames: u64,
    fps_window_start: Instant,
    fps_interval: Duration,
}

impl FrameClock {
    /// Create a clock starting now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_tick: now,
            elapsed: 0.0,
            delta: 0.0,
            frame: 0,
            paused: false,
            fps: 0.0,
            fps_frames: 0,
            fps_window_start: now,
            fps_interval: Duration::from_millis(500),
        }
    }

    /// Sample the wall clock and produce the next frame's timing.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let raw = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        let window = now.duration_since(self.fps_window_start);
        if window >= self.fps_interval {
            self.fps = self.fps_frames as f32 / window.as_secs_f32();
            self.fps_frames = 0;
            self.fps_window_start = now;
        }
        self.fps_frames += 1;

        if self.paused {
            self.delta = 0.0;
            return self.snapshot();
        }

        self.advance(raw)
    }

    /// Advance by an explicit delta without consulting the wall clock.
    ///
    /// Negative or non-finite deltas are treated as zero.
    pub fn advance(&mut self, delta: f32) -> FrameTime {
        let delta = if delta.is_finite() { delta.clamp(0.0, MAX_DELTA) } else { 0.0 };
        self.delta = delta;
        self.elapsed += delta as f64;
        self.frame += 1;
        self.snapshot()
    }

    /// Timing of the most recent frame.
    fn snapshot(&self) -> FrameTime {
        FrameTime {
            elapsed: self.elapsed as f32,
            delta: self.delta,
            frame: self.frame,
        }
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Frames per second, refreshed twice a second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Freeze time; `tick` keeps counting frames but reports a zero delta.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.snapshot().elapsed, 0.0);
    }

    #[test]
    fn test_tick_measures_wall_time() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let frame = clock.tick();
        assert!(frame.delta > 0.0);
        assert!(frame.elapsed > 0.0);
        assert_eq!(frame.frame, 1);
    }

    #[test]
    fn test_advance_accumulates() {
        let mut clock = FrameClock::new();
        for _ in 0..120 {
            clock.advance(1.0 / 60.0);
        }
        assert!((clock.snapshot().elapsed - 2.0).abs() < 1e-4);
        assert_eq!(clock.frame(), 120);
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(5.0).delta, 0.1);
        assert_eq!(clock.advance(-1.0).delta, 0.0);
        assert_eq!(clock.advance(f32::NAN).delta, 0.0);
    }

    #[test]
    fn test_paused_tick_has_zero_delta() {
        let mut clock = FrameClock::new();
        clock.tick();
        clock.set_paused(true);
        let before = clock.snapshot().elapsed;
        thread::sleep(Duration::from_millis(10));
        let frame = clock.tick();
        assert_eq!(frame.delta, 0.0);
        assert_eq!(frame.elapsed, before);
    }
}
