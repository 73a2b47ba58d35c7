//! `GameClock`: fixed frame-time target with a busy-wait tail.
//!
//! Sleep granularity on common desktop schedulers is coarse enough to overshoot a
//! sub-millisecond frame budget, so `end_frame` spins on `Instant::now()` for the last
//! stretch rather than trusting `thread::sleep` to wake precisely. `step_mode` lets a
//! debugger drive the loop one frame at a time without the wait.

use std::time::{Duration, Instant};

use tracing::trace;

/// Target frame rates the settings UI exposes.
pub const SUPPORTED_FPS: [u32; 8] = [60, 75, 120, 144, 165, 180, 240, 360];

pub const DEFAULT_TARGET_FPS: u32 = 60;

pub struct GameClock {
    target_fps: u32,
    target_frame_time: Duration,
    frame_start: Instant,
    frame_count: u64,
    /// Rolling 1-second FPS sampling window: a true counter reset every time accumulated
    /// time exceeds 1.0s, not an exponential moving average.
    fps_window_elapsed: Duration,
    fps_window_frames: u32,
    current_fps: f32,
    step_mode: bool,
}

impl GameClock {
    pub fn new() -> Self {
        Self::with_target_fps(DEFAULT_TARGET_FPS)
    }

    pub fn with_target_fps(fps: u32) -> Self {
        let fps = if SUPPORTED_FPS.contains(&fps) { fps } else { DEFAULT_TARGET_FPS };
        Self {
            target_fps: fps,
            target_frame_time: Duration::from_secs_f64(1.0 / fps as f64),
            frame_start: Instant::now(),
            frame_count: 0,
            fps_window_elapsed: Duration::ZERO,
            fps_window_frames: 0,
            current_fps: 0.0,
            step_mode: false,
        }
    }

    pub fn set_target_fps(&mut self, fps: u32) {
        if SUPPORTED_FPS.contains(&fps) {
            self.target_fps = fps;
            self.target_frame_time = Duration::from_secs_f64(1.0 / fps as f64);
        }
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    /// Debug stepping: when enabled, `end_frame` returns immediately instead of
    /// busy-waiting the tail, so a caller can single-step frames under a debugger.
    pub fn set_step_mode(&mut self, enabled: bool) {
        self.step_mode = enabled;
    }

    pub fn step_mode(&self) -> bool {
        self.step_mode
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn current_fps(&self) -> f32 {
        self.current_fps
    }

    /// Records the start timestamp of a new frame.
    pub fn begin_frame(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Increments the frame counter, updates the rolling FPS sample, and — unless in
    /// step mode — busy-waits until `target_frame_time` has elapsed since `begin_frame`.
    /// Returns the elapsed wall-clock duration of the frame (post-wait).
    pub fn end_frame(&mut self) -> Duration {
        self.frame_count += 1;

        let mut elapsed = self.frame_start.elapsed();
        if !self.step_mode {
            while elapsed < self.target_frame_time {
                elapsed = self.frame_start.elapsed();
            }
        }

        self.fps_window_elapsed += elapsed;
        self.fps_window_frames += 1;
        if self.fps_window_elapsed >= Duration::from_secs(1) {
            self.current_fps = self.fps_window_frames as f32 / self.fps_window_elapsed.as_secs_f32();
            self.fps_window_elapsed = Duration::ZERO;
            self.fps_window_frames = 0;
        }

        trace!(frame = self.frame_count, fps = self.current_fps, "frame end");
        elapsed
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}
