//! Frame timing: animation timer, frame counters and rolling FPS.

use std::time::{Duration, Instant};

/// Source of "now" for frame measurement.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Timing state for the frame loop.
///
/// `advance` runs before rendering and moves the animation timer by the
/// previous frame's duration; `end_frame` runs after presentation and does
/// the counting. Pausing freezes `advance` only, counting continues.
#[derive(Debug)]
pub struct FrameTiming {
    /// Duration of the last rendered frame, in seconds
    frame_timer: f32,
    /// Animation timer in `[0, 1)`
    timer: f32,
    timer_speed: f32,
    paused: bool,
    /// Frames since the last FPS update
    frame_counter: u32,
    total_frames: u64,
    fps_accumulator: Duration,
    last_fps: u32,
}

impl FrameTiming {
    pub fn new(timer_speed: f32) -> Self {
        Self {
            frame_timer: 0.0,
            timer: 0.0,
            timer_speed,
            paused: false,
            frame_counter: 0,
            total_frames: 0,
            fps_accumulator: Duration::ZERO,
            last_fps: 0,
        }
    }

    /// Advance the animation timer by the previous frame's duration.
    ///
    /// Returns the delta fed to movement integration, or `None` while paused.
    pub fn advance(&mut self) -> Option<f32> {
        if self.paused {
            return None;
        }
        self.timer += self.timer_speed * self.frame_timer;
        if self.timer > 1.0 {
            self.timer -= 1.0;
        }
        Some(self.frame_timer)
    }

    /// Record a completed frame that took `elapsed`.
    ///
    /// Returns the new FPS value when a full second has accumulated.
    pub fn end_frame(&mut self, elapsed: Duration) -> Option<u32> {
        self.frame_timer = elapsed.as_secs_f32();
        self.frame_counter += 1;
        self.total_frames += 1;
        self.fps_accumulator += elapsed;

        if self.fps_accumulator < Duration::from_secs(1) {
            return None;
        }

        let seconds = self.fps_accumulator.as_secs_f32();
        self.last_fps = (self.frame_counter as f32 / seconds).round() as u32;
        self.frame_counter = 0;
        self.fps_accumulator = Duration::ZERO;
        Some(self.last_fps)
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frame_timer(&self) -> f32 {
        self.frame_timer
    }

    pub fn timer(&self) -> f32 {
        self.timer
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn last_fps(&self) -> u32 {
        self.last_fps
    }

    pub fn fps_accumulator(&self) -> Duration {
        self.fps_accumulator
    }
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(0.25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const QUARTER: Duration = Duration::from_millis(250);

    #[test]
    fn fps_resets_after_one_second() {
        let mut timing = FrameTiming::new(0.25);
        assert_eq!(timing.end_frame(QUARTER), None);
        assert_eq!(timing.end_frame(QUARTER), None);
        assert_eq!(timing.end_frame(QUARTER), None);
        assert_eq!(timing.end_frame(QUARTER), Some(4));
        assert_eq!(timing.frame_counter(), 0);
        assert_eq!(timing.fps_accumulator(), Duration::ZERO);

        assert_eq!(timing.end_frame(QUARTER), None);
        assert_eq!(timing.frame_counter(), 1);
        assert_eq!(timing.total_frames(), 5);
        assert_eq!(timing.last_fps(), 4);
    }

    #[test]
    fn advance_uses_previous_frame_duration() {
        let mut timing = FrameTiming::new(0.5);
        assert_eq!(timing.advance(), Some(0.0));
        timing.end_frame(Duration::from_millis(500));
        let delta = timing.advance().unwrap();
        assert_relative_eq!(delta, 0.5);
        assert_relative_eq!(timing.timer(), 0.25);
    }

    #[test]
    fn timer_wraps_past_one() {
        let mut timing = FrameTiming::new(1.0);
        timing.end_frame(Duration::from_millis(600));
        timing.advance();
        timing.advance();
        assert_relative_eq!(timing.timer(), 0.2, epsilon = 1e-5);
    }

    #[test]
    fn paused_freezes_timer_but_counts_frames() {
        let mut timing = FrameTiming::new(1.0);
        timing.end_frame(QUARTER);
        assert!(timing.toggle_pause());
        assert_eq!(timing.advance(), None);
        assert_relative_eq!(timing.timer(), 0.0);

        timing.end_frame(QUARTER);
        assert_eq!(timing.total_frames(), 2);

        assert!(!timing.toggle_pause());
        assert!(timing.advance().is_some());
        assert_relative_eq!(timing.timer(), 0.25);
    }
}
