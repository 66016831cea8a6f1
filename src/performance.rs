//! Frame timing, rolling statistics and adaptive quality signals.
//!
//! The monitor records one sample per frame and keeps a bounded rolling
//! window. [`PerformanceMonitor::evaluate`] turns the window into at most one
//! [`QualityAdjustment`] per call, throttled by per-direction cooldowns so
//! quality cannot oscillate frame to frame.
//!
//! ```ignore
//! monitor.record_frame(frame_ms);
//! if let Some(adjustment) = monitor.evaluate(Instant::now()) {
//!     // step the quality level
//! }
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::PerformanceConfig;

/// Upper bound on the rolling window.
pub const MAX_SAMPLES: usize = 60;

/// Minimum time between two "decrease" signals.
pub const DECREASE_COOLDOWN: Duration = Duration::from_secs(3);

/// Minimum time between two "increase" signals.
pub const INCREASE_COOLDOWN: Duration = Duration::from_secs(5);

/// Samples required before the adaptive loop says anything.
pub const MIN_SAMPLES_FOR_ADJUSTMENT: usize = 10;

/// Heap size above which memory is reported as the bottleneck.
pub const MEMORY_BOTTLENECK_BYTES: u64 = 100 * 1024 * 1024;

/// Frame time above which the CPU is reported as the bottleneck.
pub const CPU_BOTTLENECK_MS: f32 = 20.0;

/// Snapshot of the monitor's view of recent frames.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceMetrics {
    /// Instantaneous FPS of the latest frame.
    pub fps: f32,
    /// Latest frame time in milliseconds.
    pub frame_time: f32,
    pub average_fps: f32,
    pub min_fps: f32,
    pub max_fps: f32,
    pub particle_count: u32,
    pub draw_calls: u32,
    /// Bytes held by the engine (particle pool plus GPU resources).
    pub memory_usage: u64,
}

/// Direction the adaptive loop wants quality to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityAdjustment {
    Decrease,
    Increase,
}

/// Dominant cost, reported for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bottleneck {
    Memory,
    Cpu,
    Gpu,
}

/// Result of [`PerformanceMonitor::analyze_performance`].
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub bottleneck: Bottleneck,
    pub metrics: PerformanceMetrics,
    pub recommendations: Vec<&'static str>,
}

/// Frame-time tracker and adaptive quality controller.
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: PerformanceConfig,
    frame_times: VecDeque<f32>,
    metrics: PerformanceMetrics,
    last_decrease: Option<Instant>,
    last_increase: Option<Instant>,
}

impl PerformanceMonitor {
    pub fn new(config: PerformanceConfig) -> Self {
        Self {
            config,
            frame_times: VecDeque::with_capacity(MAX_SAMPLES),
            metrics: PerformanceMetrics::default(),
            last_decrease: None,
            last_increase: None,
        }
    }

    pub fn set_config(&mut self, config: PerformanceConfig) {
        self.config = config;
        let window = self.window_len();
        while self.frame_times.len() > window {
            self.frame_times.pop_front();
        }
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    fn window_len(&self) -> usize {
        (self.config.sample_window as usize).clamp(1, MAX_SAMPLES)
    }

    /// Record one frame that took `frame_time_ms` milliseconds.
    ///
    /// Non-positive or non-finite frame times are ignored.
    pub fn record_frame(&mut self, frame_time_ms: f32) {
        if !frame_time_ms.is_finite() || frame_time_ms <= 0.0 {
            return;
        }

        if self.frame_times.len() >= self.window_len() {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time_ms);

        self.metrics.frame_time = frame_time_ms;
        self.metrics.fps = 1000.0 / frame_time_ms;

        let mut sum = 0.0;
        let mut min_fps = f32::INFINITY;
        let mut max_fps = 0.0f32;
        for &ms in &self.frame_times {
            let fps = 1000.0 / ms;
            sum += fps;
            min_fps = min_fps.min(fps);
            max_fps = max_fps.max(fps);
        }
        self.metrics.average_fps = sum / self.frame_times.len() as f32;
        self.metrics.min_fps = min_fps;
        self.metrics.max_fps = max_fps;
    }

    /// Update the counters reported alongside timing.
    pub fn set_frame_stats(&mut self, particle_count: u32, draw_calls: u32, memory_usage: u64) {
        self.metrics.particle_count = particle_count;
        self.metrics.draw_calls = draw_calls;
        self.metrics.memory_usage = memory_usage;
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.metrics
    }

    pub fn sample_count(&self) -> usize {
        self.frame_times.len()
    }

    /// Decide whether quality should change at time `now`.
    ///
    /// Returns `Decrease` when the average falls below the floor or the worst
    /// frame falls below 80% of it, `Increase` when the average exceeds 120%
    /// of target and even the worst frame beats target. Each direction has
    /// its own cooldown measured from the last signal in that direction.
    pub fn evaluate(&mut self, now: Instant) -> Option<QualityAdjustment> {
        if !self.config.adaptive_quality || self.frame_times.len() < MIN_SAMPLES_FOR_ADJUSTMENT {
            return None;
        }

        let floor = self.config.min_fps;
        let target = self.config.target_fps;
        let m = self.metrics;

        if m.average_fps < floor || m.min_fps < floor * 0.8 {
            if cooled_down(self.last_decrease, now, DECREASE_COOLDOWN) {
                self.last_decrease = Some(now);
                log::info!(
                    "Performance below floor (avg {:.1}, min {:.1}), requesting lower quality",
                    m.average_fps,
                    m.min_fps
                );
                return Some(QualityAdjustment::Decrease);
            }
            return None;
        }

        if m.average_fps > target * 1.2 && m.min_fps > target {
            if cooled_down(self.last_increase, now, INCREASE_COOLDOWN) {
                self.last_increase = Some(now);
                log::info!(
                    "Performance headroom (avg {:.1}, min {:.1}), requesting higher quality",
                    m.average_fps,
                    m.min_fps
                );
                return Some(QualityAdjustment::Increase);
            }
        }

        None
    }

    /// Classify the dominant cost: memory over CPU over GPU.
    pub fn analyze_performance(&self) -> PerformanceReport {
        let m = self.metrics;
        let bottleneck = if m.memory_usage > MEMORY_BOTTLENECK_BYTES {
            Bottleneck::Memory
        } else if m.frame_time > CPU_BOTTLENECK_MS {
            Bottleneck::Cpu
        } else {
            Bottleneck::Gpu
        };

        let recommendations = match bottleneck {
            Bottleneck::Memory => vec![
                "Reduce particle count",
                "Lower bloom mip levels",
            ],
            Bottleneck::Cpu => vec![
                "Reduce particle count",
                "Reduce turbulence strength",
            ],
            Bottleneck::Gpu => vec![
                "Disable blur passes",
                "Reduce bloom strength or disable bloom",
                "Lower global particle scale",
            ],
        };

        PerformanceReport {
            bottleneck,
            metrics: m,
            recommendations,
        }
    }

    /// Drop all samples and cooldown history.
    pub fn reset(&mut self) {
        self.frame_times.clear();
        self.metrics = PerformanceMetrics::default();
        self.last_decrease = None;
        self.last_increase = None;
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(PerformanceConfig::default())
    }
}

fn cooled_down(last: Option<Instant>, now: Instant, cooldown: Duration) -> bool {
    match last {
        Some(last) => now.saturating_duration_since(last) >= cooldown,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(monitor: &mut PerformanceMonitor, frame_ms: f32, frames: usize) {
        for _ in 0..frames {
            monitor.record_frame(frame_ms);
        }
    }

    #[test]
    fn test_rolling_window_is_bounded() {
        let mut monitor = PerformanceMonitor::default();
        fill(&mut monitor, 16.0, 200);
        assert_eq!(monitor.sample_count(), MAX_SAMPLES);
    }

    #[test]
    fn test_fps_from_frame_time() {
        let mut monitor = PerformanceMonitor::default();
        monitor.record_frame(20.0);
        let m = monitor.metrics();
        assert!((m.fps - 50.0).abs() < 1e-4);
        assert_eq!(m.frame_time, 20.0);
    }

    #[test]
    fn test_min_max_average() {
        let mut monitor = PerformanceMonitor::default();
        monitor.record_frame(10.0); // 100 fps
        monitor.record_frame(20.0); // 50 fps
        monitor.record_frame(40.0); // 25 fps
        let m = monitor.metrics();
        assert!((m.max_fps - 100.0).abs() < 1e-3);
        assert!((m.min_fps - 25.0).abs() < 1e-3);
        assert!((m.average_fps - 175.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_ignores_invalid_samples() {
        let mut monitor = PerformanceMonitor::default();
        monitor.record_frame(0.0);
        monitor.record_frame(-3.0);
        monitor.record_frame(f32::NAN);
        assert_eq!(monitor.sample_count(), 0);
    }

    #[test]
    fn test_decrease_cooldown() {
        let mut monitor = PerformanceMonitor::default();
        fill(&mut monitor, 50.0, 30); // 20 fps, below 30 floor
        let start = Instant::now();

        assert_eq!(monitor.evaluate(start), Some(QualityAdjustment::Decrease));

        // Conditions persist every frame for just under 3s.
        for ms in (16..3000).step_by(16) {
            let now = start + Duration::from_millis(ms);
            monitor.record_frame(50.0);
            assert_eq!(monitor.evaluate(now), None);
        }

        let later = start + DECREASE_COOLDOWN;
        assert_eq!(monitor.evaluate(later), Some(QualityAdjustment::Decrease));
    }

    #[test]
    fn test_decrease_on_min_fps_spike() {
        let mut monitor = PerformanceMonitor::default();
        fill(&mut monitor, 16.0, 30);
        monitor.record_frame(50.0); // 20 fps < 0.8 * 30
        assert_eq!(monitor.evaluate(Instant::now()), Some(QualityAdjustment::Decrease));
    }

    #[test]
    fn test_increase_with_headroom_and_cooldown() {
        let mut monitor = PerformanceMonitor::default();
        fill(&mut monitor, 8.0, 60); // 125 fps
        let start = Instant::now();
        assert_eq!(monitor.evaluate(start), Some(QualityAdjustment::Increase));
        assert_eq!(monitor.evaluate(start + Duration::from_secs(4)), None);
        assert_eq!(
            monitor.evaluate(start + INCREASE_COOLDOWN),
            Some(QualityAdjustment::Increase)
        );
    }

    #[test]
    fn test_steady_target_emits_nothing() {
        let mut monitor = PerformanceMonitor::default();
        fill(&mut monitor, 1000.0 / 60.0, 60);
        assert_eq!(monitor.evaluate(Instant::now()), None);
    }

    #[test]
    fn test_disabled_adaptive_quality() {
        let mut monitor = PerformanceMonitor::new(PerformanceConfig {
            adaptive_quality: false,
            ..Default::default()
        });
        fill(&mut monitor, 100.0, 60);
        assert_eq!(monitor.evaluate(Instant::now()), None);
    }

    #[test]
    fn test_needs_enough_samples() {
        let mut monitor = PerformanceMonitor::default();
        fill(&mut monitor, 100.0, MIN_SAMPLES_FOR_ADJUSTMENT - 1);
        assert_eq!(monitor.evaluate(Instant::now()), None);
    }

    #[test]
    fn test_bottleneck_priority() {
        let mut monitor = PerformanceMonitor::default();
        monitor.record_frame(30.0);
        monitor.set_frame_stats(1000, 7, 200 * 1024 * 1024);
        assert_eq!(monitor.analyze_performance().bottleneck, Bottleneck::Memory);

        monitor.set_frame_stats(1000, 7, 1024);
        assert_eq!(monitor.analyze_performance().bottleneck, Bottleneck::Cpu);

        monitor.record_frame(10.0);
        let report = monitor.analyze_performance();
        assert_eq!(report.bottleneck, Bottleneck::Gpu);
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_shrinking_window_trims_samples() {
        let mut monitor = PerformanceMonitor::default();
        fill(&mut monitor, 16.0, 60);
        monitor.set_config(PerformanceConfig {
            sample_window: 10,
            ..Default::default()
        });
        assert_eq!(monitor.sample_count(), 10);
    }
}
