//! # Particle Field
//!
//! A real-time 2D particle field: a noise-driven physics simulation feeding
//! a wgpu render pipeline with multi-pass post-processing, pointer/touch
//! interaction and closed-loop adaptive quality.
//!
//! ## Quick Start
//!
//! ```ignore
//! use particle_field::app::{self, AppOptions};
//!
//! fn main() -> Result<(), particle_field::EngineError> {
//!     app::run(AppOptions {
//!         preset: Some("cosmic".into()),
//!         ..Default::default()
//!     })
//! }
//! ```
//!
//! ## Embedding
//!
//! [`ParticleFieldEngine`] can be mounted on any winit window you own:
//!
//! ```ignore
//! let engine = ParticleFieldEngine::new(window, ConfigManager::in_memory(), DEFAULT_SEED)?;
//! // per redraw
//! engine.tick();
//! // per window event
//! engine.handle_window_event(&event);
//! ```
//!
//! Without a window, [`ParticleFieldEngine::headless`] runs everything but
//! drawing.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`noise`] | Seeded Perlin noise, fractal sums and turbulence |
//! | [`particles`] | Particle pool and physics integration |
//! | [`interaction`] | Pointer, touch and keyboard state |
//! | [`gpu`] | Renderer, shader programs, resource registries, post chain |
//! | [`performance`] | Frame statistics and adaptive quality signals |
//! | [`device`] | Device capability probe and quality classification |
//! | [`config`] | Configuration, presets and persistence |
//! | [`engine`] | Per-frame orchestration |
//!
//! ## Configuration
//!
//! All state that callers tune lives in [`ParticleFieldConfig`], owned by a
//! [`ConfigManager`]. Partial updates go through patch types, so a change
//! to one field never resets its neighbours:
//!
//! ```ignore
//! engine.update_config(&ConfigPatch {
//!     particle: Some(ParticleConfigPatch::physics(PhysicsPatch {
//!         gravity: Some(5.0),
//!         ..Default::default()
//!     })),
//!     ..Default::default()
//! });
//! ```

pub mod app;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod interaction;
pub mod noise;
pub mod particles;
pub mod performance;
pub mod shaders;
pub mod time;

pub use bytemuck;
pub use glam::Vec2;

pub use config::{ColorScheme, ConfigManager, ConfigPatch, ConfigPreset, ParticleFieldConfig, QualityLevel};
pub use device::DeviceCapabilities;
pub use engine::{EngineStats, ParticleFieldEngine, DEFAULT_SEED};
pub use error::{ConfigError, EngineError, FramebufferError, GpuError, PassError, ShaderError};
pub use interaction::{InteractionController, InteractionState};
pub use noise::NoiseField;
pub use particles::{Particle, ParticleSystem};
pub use performance::{PerformanceMetrics, PerformanceMonitor, QualityAdjustment};
pub use time::FrameClock;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use particle_field::prelude::*;
/// ```
pub mod prelude {
    pub use crate::app::{run, AppOptions};
    pub use crate::config::{
        ColorScheme, ConfigManager, ConfigPatch, InteractionPatch, ParticleConfigPatch, ParticleFieldConfig,
        PhysicsPatch, PostProcessPatch, QualityLevel,
    };
    pub use crate::engine::{ParticleFieldEngine, DEFAULT_SEED};
    pub use crate::error::EngineError;
    pub use crate::interaction::KeyCode;
    pub use crate::noise::NoiseField;
    pub use crate::particles::{ParticleSystem, ParticleStats};
    pub use crate::performance::PerformanceMetrics;
    pub use crate::time::FrameClock;
    pub use crate::Vec2;
}
