//! Frame orchestration.
//!
//! [`ParticleFieldEngine`] owns one of every subsystem and runs them in a
//! fixed order each tick:
//!
//! 1. apply any configuration change made since the last tick
//! 2. sample interaction state
//! 3. integrate particles
//! 4. pack and upload instances, draw, run the post chain
//! 5. record frame metrics and let adaptive quality react
//!
//! A quality change requested in step 5 goes through the [`ConfigManager`]
//! and reaches the particle system and renderer in step 1 of the next tick.
//!
//! The engine also runs without a GPU ([`ParticleFieldEngine::headless`]):
//! everything but drawing still happens, which is what the integration
//! tests drive.

use std::sync::Arc;
use std::time::Instant;

use winit::event::WindowEvent;
use winit::window::Window;

use crate::config::{ConfigManager, ConfigPatch, ParticleFieldConfig, QualityLevel};
use crate::device::DeviceCapabilities;
use crate::error::{ConfigError, EngineError};
use crate::gpu::Renderer;
use crate::interaction::{InteractionController, InteractionState};
use crate::noise::NoiseField;
use crate::particles::{GpuParticle, Particle, ParticleStats, ParticleSystem};
use crate::performance::{PerformanceMetrics, PerformanceMonitor, PerformanceReport, QualityAdjustment};
use crate::time::{FrameClock, FrameTiming};

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 0x5EED_F1E1D;

/// Snapshot of what the engine is doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStats {
    pub frame: u64,
    pub elapsed: f32,
    pub particles: ParticleStats,
    pub draw_calls: u32,
    pub quality: QualityLevel,
    pub degraded: bool,
    pub paused: bool,
}

pub struct ParticleFieldEngine {
    config: ConfigManager,
    applied_revision: u64,
    noise: NoiseField,
    particles: ParticleSystem,
    interaction: InteractionController,
    monitor: PerformanceMonitor,
    clock: FrameClock,
    renderer: Option<Renderer>,
    capabilities: Option<DeviceCapabilities>,
    instances: Vec<GpuParticle>,
    size: (u32, u32),
    draw_calls: u32,
    disposed: bool,
}

impl ParticleFieldEngine {
    /// Mount the engine on `window`.
    ///
    /// Requires a working GPU. When adaptive quality is on, the starting
    /// quality level comes from classifying the device.
    pub fn new(window: Arc<Window>, mut config: ConfigManager, seed: u64) -> Result<Self, EngineError> {
        let size = window.inner_size();
        let mut renderer = pollster::block_on(Renderer::new(window, config.current()))?;
        let capabilities = renderer.capabilities().clone();

        if config.current().performance.adaptive_quality {
            let level = capabilities.classify(None);
            log::info!("Device classified as {:?}", level);
            if level != config.current().particle.performance_level {
                config.apply_quality_level(level);
                renderer.apply_config(config.current());
            }
        }

        let mut engine = Self::assemble(config, size.width, size.height, seed);
        engine.renderer = Some(renderer);
        engine.capabilities = Some(capabilities);
        Ok(engine)
    }

    /// Engine without a renderer. Simulation, interaction, metrics and
    /// configuration behave exactly as with a window.
    pub fn headless(config: ConfigManager, width: u32, height: u32, seed: u64) -> Self {
        Self::assemble(config, width, height, seed)
    }

    fn assemble(config: ConfigManager, width: u32, height: u32, seed: u64) -> Self {
        let current = config.current().clone();
        let mut interaction = InteractionController::new(current.interaction);
        interaction.set_viewport(width as f32, height as f32);

        log::info!(
            "Particle field engine started with {} particles at {}x{}",
            current.particle.particle_count,
            width,
            height
        );

        Self {
            applied_revision: config.revision(),
            config,
            noise: NoiseField::new(seed),
            particles: ParticleSystem::new(current.particle, width as f32, height as f32, seed),
            interaction,
            monitor: PerformanceMonitor::new(current.performance),
            clock: FrameClock::new(),
            renderer: None,
            capabilities: None,
            instances: Vec::new(),
            size: (width, height),
            draw_calls: 0,
            disposed: false,
        }
    }

    // ========== Frame loop ==========

    /// Run one frame timed by the wall clock.
    pub fn tick(&mut self) -> FrameTiming {
        let timing = self.clock.tick();
        self.run_frame(timing, Instant::now());
        timing
    }

    /// Run one frame that simulates exactly `dt` seconds.
    ///
    /// The frame time reported to the performance monitor is `dt` as well.
    pub fn advance(&mut self, dt: f32) -> FrameTiming {
        self.advance_at(dt, Instant::now())
    }

    /// [`advance`](Self::advance) with an explicit timestamp for cooldowns
    /// and interaction history.
    pub fn advance_at(&mut self, dt: f32, now: Instant) -> FrameTiming {
        let timing = self.clock.advance(dt);
        self.run_frame(timing, now);
        timing
    }

    fn run_frame(&mut self, timing: FrameTiming, now: Instant) {
        if self.disposed {
            return;
        }
        self.sync_config();

        let state = self.interaction.update_at(now);
        self.particles.update(timing.delta, timing.elapsed, &self.noise, state);

        if let Some(renderer) = &mut self.renderer {
            self.particles.pack_into(&mut self.instances);
            let stats = renderer.render(&self.instances, timing.elapsed, self.config.current());
            self.draw_calls = stats.draw_calls;
        }

        self.monitor.record_frame(timing.frame_time_ms);
        self.monitor.set_frame_stats(
            self.particles.alive_count() as u32,
            self.draw_calls,
            self.memory_usage(),
        );

        if let Some(adjustment) = self.monitor.evaluate(now) {
            self.adjust_quality(adjustment);
        }
    }

    fn adjust_quality(&mut self, adjustment: QualityAdjustment) {
        let current = self.quality_level();
        let next = match adjustment {
            QualityAdjustment::Decrease => current.lower(),
            QualityAdjustment::Increase => current.higher(),
        };
        match next {
            Some(level) => {
                log::info!("Adaptive quality: {:?} -> {:?}", current, level);
                self.config.apply_quality_level(level);
            }
            None => log::debug!("Adaptive quality already at {:?}", current),
        }
    }

    /// Push the manager's configuration into every subsystem if it changed.
    fn sync_config(&mut self) {
        let revision = self.config.revision();
        if revision == self.applied_revision {
            return;
        }
        self.applied_revision = revision;

        let config = self.config.current();
        self.particles.set_config(config.particle.clone());
        self.interaction.set_config(config.interaction);
        self.monitor.set_config(config.performance);
        if let Some(renderer) = &mut self.renderer {
            renderer.apply_config(config);
        }
        log::debug!("Applied configuration revision {}", revision);
    }

    // ========== Surface and input ==========

    /// Resize the viewport. A zero-sized viewport pauses drawing until the
    /// next non-zero resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.disposed || (width, height) == self.size {
            return;
        }
        self.size = (width, height);
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(width, height, self.config.current());
        }
        if width == 0 || height == 0 {
            return;
        }
        self.particles.set_bounds(width as f32, height as f32);
        self.interaction.set_viewport(width as f32, height as f32);
        log::debug!("Viewport resized to {}x{}", width, height);
    }

    /// Route a window event. Returns `true` if the engine consumed it.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        if self.disposed {
            return false;
        }
        match event {
            WindowEvent::Resized(size) => {
                self.resize(size.width, size.height);
                true
            }
            other => self.interaction.handle_window_event(other),
        }
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut InteractionController {
        &mut self.interaction
    }

    pub fn interaction_state(&self) -> &InteractionState {
        self.interaction.state()
    }

    // ========== Configuration ==========

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    /// Mutable access to the manager. Changes are applied on the next tick.
    pub fn config_mut(&mut self) -> &mut ConfigManager {
        &mut self.config
    }

    pub fn current_config(&self) -> &ParticleFieldConfig {
        self.config.current()
    }

    /// Merge `patch` and apply it immediately.
    pub fn update_config(&mut self, patch: &ConfigPatch) {
        self.config.update_config(patch);
        self.sync_config();
    }

    /// Replace the active configuration with a preset and apply it.
    pub fn apply_preset(&mut self, id: &str) -> Result<(), ConfigError> {
        self.config.apply_preset(id)?;
        self.sync_config();
        Ok(())
    }

    pub fn quality_level(&self) -> QualityLevel {
        self.config.current().particle.performance_level
    }

    // ========== Control and inspection ==========

    pub fn set_paused(&mut self, paused: bool) {
        self.clock.set_paused(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    /// Respawn the whole population.
    pub fn reset_particles(&mut self) {
        self.particles.reset();
    }

    pub fn particle_system(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.particles.particles()
    }

    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.monitor.metrics()
    }

    pub fn analyze_performance(&self) -> PerformanceReport {
        self.monitor.analyze_performance()
    }

    /// Probed capabilities, `None` when headless.
    pub fn device_capabilities(&self) -> Option<&DeviceCapabilities> {
        self.capabilities.as_ref()
    }

    /// True while post-processing is bypassed after a framebuffer failure.
    pub fn is_degraded(&self) -> bool {
        self.renderer.as_ref().is_some_and(Renderer::is_degraded)
    }

    pub fn is_headless(&self) -> bool {
        self.renderer.is_none()
    }

    /// Bytes held by the particle pool and GPU resources.
    pub fn memory_usage(&self) -> u64 {
        let pool = (self.particles.capacity() * std::mem::size_of::<Particle>()) as u64;
        let staging = (self.instances.capacity() * std::mem::size_of::<GpuParticle>()) as u64;
        let gpu = self.renderer.as_ref().map_or(0, Renderer::memory_usage);
        pool + staging + gpu
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            frame: self.clock.frame(),
            elapsed: self.clock.elapsed(),
            particles: self.particles.stats(),
            draw_calls: self.draw_calls,
            quality: self.quality_level(),
            degraded: self.is_degraded(),
            paused: self.clock.is_paused(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    // ========== Teardown ==========

    /// Release GPU resources and clear every history buffer.
    ///
    /// Safe to call more than once. Ticks after dispose do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
        }
        self.instances = Vec::new();
        self.monitor.reset();
        self.interaction.clear();
        self.draw_calls = 0;
        self.disposed = true;
        log::info!("Particle field engine disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for ParticleFieldEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParticleConfigPatch, PhysicsPatch};

    fn engine(count: u32) -> ParticleFieldEngine {
        let mut config = ConfigManager::in_memory();
        config.update_particle_config(ParticleConfigPatch {
            particle_count: Some(count),
            ..Default::default()
        });
        ParticleFieldEngine::headless(config, 800, 600, 7)
    }

    #[test]
    fn test_headless_ticks_keep_population() {
        let mut engine = engine(100);
        for _ in 0..30 {
            engine.advance(1.0 / 60.0);
        }
        let stats = engine.stats();
        assert_eq!(stats.frame, 30);
        assert_eq!(stats.particles.alive, 100);
        assert_eq!(stats.draw_calls, 0);
        assert!(!stats.degraded);
        assert_eq!(engine.metrics().particle_count, 100);
    }

    #[test]
    fn test_config_update_reaches_particles() {
        let mut engine = engine(100);
        engine.update_config(&ConfigPatch {
            particle: Some(ParticleConfigPatch::physics(PhysicsPatch {
                gravity: Some(5.0),
                ..Default::default()
            })),
            ..Default::default()
        });
        assert_eq!(engine.particle_system().config().physics.gravity, 5.0);
        assert_eq!(engine.particle_system().config().particle_count, 100);
    }

    #[test]
    fn test_manager_changes_apply_on_next_tick() {
        let mut engine = engine(100);
        engine.config_mut().update_particle_config(ParticleConfigPatch {
            particle_count: Some(50),
            ..Default::default()
        });
        assert_eq!(engine.particle_system().target_count(), 100);
        engine.advance(1.0 / 60.0);
        assert_eq!(engine.particle_system().target_count(), 50);
        assert_eq!(engine.particle_system().alive_count(), 50);
    }

    #[test]
    fn test_paused_engine_does_not_move_particles() {
        let mut engine = engine(20);
        engine.set_paused(true);
        let before: Vec<_> = engine.particles().map(|p| p.position).collect();
        engine.advance(1.0 / 60.0);
        let after: Vec<_> = engine.particles().map(|p| p.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_slow_frames_lower_quality() {
        let mut engine = engine(100);
        assert_eq!(engine.quality_level(), QualityLevel::High);
        let now = Instant::now();
        // 10 FPS, well under the floor.
        for _ in 0..12 {
            engine.advance_at(0.1, now);
        }
        assert_eq!(engine.quality_level(), QualityLevel::Medium);
        engine.advance_at(0.1, now);
        assert_eq!(
            engine.particle_system().target_count() as u32,
            engine.current_config().particle.particle_count
        );
    }

    #[test]
    fn test_zero_size_resize_keeps_bounds() {
        let mut engine = engine(10);
        engine.resize(0, 0);
        assert_eq!(engine.size(), (0, 0));
        assert_eq!(engine.particle_system().bounds().x, 800.0);
        engine.resize(1024, 768);
        assert_eq!(engine.particle_system().bounds().x, 1024.0);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut engine = engine(10);
        engine.advance(1.0 / 60.0);
        engine.dispose();
        engine.dispose();
        assert!(engine.is_disposed());
        let frame = engine.stats().frame;
        engine.advance(1.0 / 60.0);
        assert_eq!(engine.metrics(), PerformanceMetrics::default());
        assert_eq!(engine.stats().frame, frame + 1);
    }

    #[test]
    fn test_dispose_clears_input_but_keeps_settings() {
        let mut engine = engine(10);
        engine.interaction_mut().pointer_move(10.0, 10.0);
        engine.interaction_mut().pointer_down();
        engine.advance(1.0 / 60.0);
        assert!(engine.interaction_state().interaction_strength > 0.0);

        engine.dispose();
        let state = engine.interaction_state();
        assert!(!state.is_mouse_down && !state.has_pointer);
        assert_eq!(state.interaction_strength, 0.0);
        assert_eq!(engine.interaction().history_len(), 0);
        assert_eq!(
            engine.interaction().is_enabled(),
            engine.current_config().interaction.enabled
        );
    }
}
