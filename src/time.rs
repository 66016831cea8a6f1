//! Frame clock driving the simulation.
//!
//! Produces the `dt` handed to the particle system each tick and the raw
//! frame time handed to the performance monitor. The simulated delta is
//! clamped so a stalled frame (window drag, debugger break) cannot launch
//! particles across the screen.
//!
//! ```ignore
//! let mut clock = FrameClock::new();
//! // once per animation callback
//! let frame = clock.tick();
//! system.update(frame.delta, frame.elapsed, &noise, &interaction);
//! monitor.record_frame(frame.frame_time_ms);
//! ```

use std::time::{Duration, Instant};

/// Largest simulated step in seconds.
pub const MAX_DELTA: f32 = 0.1;

/// Timing values for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Simulated seconds since the previous tick (scaled, clamped, 0 when paused).
    pub delta: f32,
    /// Simulated seconds since start.
    pub elapsed: f32,
    /// Wall-clock milliseconds since the previous tick, unscaled.
    pub frame_time_ms: f32,
    /// Ticks since start.
    pub frame: u64,
}

/// Wall-clock frame timer with pause, time scale and fixed-step support.
#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    elapsed: f32,
    frame: u64,
    paused: bool,
    fixed_delta: Option<f32>,
    time_scale: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Clock whose first tick measures from `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            last_tick: start,
            elapsed: 0.0,
            frame: 0,
            paused: false,
            fixed_delta: None,
            time_scale: 1.0,
        }
    }

    /// Advance using the current wall-clock time.
    pub fn tick(&mut self) -> FrameTiming {
        self.tick_at(Instant::now())
    }

    /// Advance to `now`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTiming {
        let raw = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        let frame_time_ms = raw.as_secs_f32() * 1000.0;

        let delta = if self.paused {
            0.0
        } else {
            let step = self.fixed_delta.unwrap_or(raw.as_secs_f32());
            (step * self.time_scale).min(MAX_DELTA)
        };
        self.advance_by(delta, frame_time_ms)
    }

    /// Advance by exactly `delta` simulated seconds, ignoring wall time.
    ///
    /// Used for headless stepping where there is no real frame.
    pub fn advance(&mut self, delta: f32) -> FrameTiming {
        let delta = if self.paused { 0.0 } else { delta.max(0.0) };
        self.advance_by(delta, delta * 1000.0)
    }

    fn advance_by(&mut self, delta: f32, frame_time_ms: f32) -> FrameTiming {
        self.elapsed += delta;
        self.frame += 1;
        FrameTiming {
            delta,
            elapsed: self.elapsed,
            frame_time_ms,
            frame: self.frame,
        }
    }

    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// While paused, ticks report a zero delta and elapsed stops.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Use a constant step instead of measured frame time. `None` restores
    /// measured timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta.map(|d| d.max(0.0));
    }

    /// `1.0` is real time; negative values clamp to `0.0`.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn reset(&mut self) {
        self.last_tick = Instant::now();
        self.elapsed = 0.0;
        self.frame = 0;
        self.paused = false;
    }

    /// Wall time since the last tick.
    pub fn since_last_tick(&self) -> Duration {
        self.last_tick.elapsed()
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

    #[test]
    fn test_tick_measures_wall_time() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let frame = clock.tick_at(start + Duration::from_millis(16));
        assert!((frame.delta - 0.016).abs() < 1e-4);
        assert!((frame.frame_time_ms - 16.0).abs() < 1e-2);
        assert_eq!(frame.frame, 1);
    }

    #[test]
    fn test_delta_is_clamped() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let frame = clock.tick_at(start + Duration::from_secs(2));
        assert_eq!(frame.delta, MAX_DELTA);
        assert!((frame.frame_time_ms - 2000.0).abs() < 1e-1);
    }

    #[test]
    fn test_pause_freezes_elapsed() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        clock.tick_at(start + Duration::from_millis(10));
        let before = clock.elapsed();
        clock.set_paused(true);
        let frame = clock.tick_at(start + Duration::from_millis(30));
        assert_eq!(frame.delta, 0.0);
        assert_eq!(clock.elapsed(), before);
        assert!(clock.is_paused());
    }

    #[test]
    fn test_fixed_delta_and_scale() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        clock.set_fixed_delta(Some(1.0 / 60.0));
        clock.set_time_scale(2.0);
        let frame = clock.tick_at(start + Duration::from_millis(100));
        assert!((frame.delta - 2.0 / 60.0).abs() < 1e-6);

        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
    }

    #[test]
    fn test_advance_is_exact() {
        let mut clock = FrameClock::new();
        for _ in 0..60 {
            clock.advance(1.0 / 60.0);
        }
        assert!((clock.elapsed() - 1.0).abs() < 1e-4);
        assert_eq!(clock.frame(), 60);
    }
}
