//! Configuration types for the particle field.
//!
//! Every type here serializes to camelCase JSON and backfills missing fields
//! from its `Default`, so partial documents load without error. Partial
//! runtime updates go through the patch types in [`patch`], which merge
//! field by field; only [`ConfigManager::apply_preset`] replaces the active
//! configuration wholesale.

mod manager;
mod patch;
mod presets;
mod store;

use serde::{Deserialize, Serialize};

pub use crate::device::QualityLevel;
pub use manager::{ConfigDocument, ConfigManager, ListenerId};
pub use patch::{
    ConfigPatch, EffectsPatch, InteractionPatch, ParticleConfigPatch, ParticleVisualPatch,
    PerformancePatch, PhysicsPatch, PostProcessPatch, RenderConfigPatch,
};
pub use presets::{built_in_presets, quality_profile, ConfigPreset, PresetDraft};
pub use store::{ConfigStore, FileStore, MemoryStore, CONFIG_KEY, PRESETS_KEY};

/// Largest particle population accepted by validation.
pub const MAX_PARTICLE_COUNT: u32 = 100_000;

/// Named color palettes sampled at particle spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// Full hue wheel.
    #[default]
    Rainbow,
    /// Blues and teals.
    Ocean,
    /// Oranges, pinks and purples.
    Sunset,
    /// Greens with a touch of yellow.
    Forest,
    /// Deep purples and blues with occasional white stars.
    Cosmic,
    /// Saturated pink, cyan and violet.
    Neon,
    /// Red through yellow.
    Fire,
    /// Grays.
    Monochrome,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 8] = [
        ColorScheme::Rainbow,
        ColorScheme::Ocean,
        ColorScheme::Sunset,
        ColorScheme::Forest,
        ColorScheme::Cosmic,
        ColorScheme::Neon,
        ColorScheme::Fire,
        ColorScheme::Monochrome,
    ];
}

/// Which post effects the particle look asks for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectsConfig {
    pub bloom: bool,
    pub blur: bool,
    pub contrast: bool,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            bloom: true,
            blur: false,
            contrast: true,
        }
    }
}

/// Forces and integration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsConfig {
    /// Constant acceleration along +Y (screen down), units/s².
    pub gravity: f32,
    /// Fraction of velocity removed per second.
    pub damping: f32,
    /// Strength of the ridged turbulence force.
    pub turbulence: f32,
    /// Strength of the pointer attraction force.
    pub mouse_influence: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.0,
            damping: 0.5,
            turbulence: 0.3,
            mouse_influence: 1.0,
        }
    }
}

/// Per-particle visual ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParticleVisualConfig {
    pub min_size: f32,
    pub max_size: f32,
    pub opacity: f32,
    /// Speed multiplier. Scales spawn velocity and the speed clamp.
    pub speed: f32,
}

impl Default for ParticleVisualConfig {
    fn default() -> Self {
        Self {
            min_size: 1.5,
            max_size: 4.0,
            opacity: 0.85,
            speed: 1.0,
        }
    }
}

/// Particle population and simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParticleSystemConfig {
    pub particle_count: u32,
    pub noise_scale: f32,
    pub color_scheme: ColorScheme,
    pub performance_level: QualityLevel,
    pub effects: EffectsConfig,
    pub physics: PhysicsConfig,
    pub visual: ParticleVisualConfig,
}

impl Default for ParticleSystemConfig {
    fn default() -> Self {
        Self {
            particle_count: 3000,
            noise_scale: 0.005,
            color_scheme: ColorScheme::default(),
            performance_level: QualityLevel::High,
            effects: EffectsConfig::default(),
            physics: PhysicsConfig::default(),
            visual: ParticleVisualConfig::default(),
        }
    }
}

impl ParticleSystemConfig {
    /// Clamp every field into its accepted range.
    pub fn validate(&mut self) {
        self.particle_count = self.particle_count.clamp(1, MAX_PARTICLE_COUNT);
        self.noise_scale = finite_or(self.noise_scale, 0.005).clamp(0.0, 1.0);
        let p = &mut self.physics;
        p.gravity = finite_or(p.gravity, 0.0).clamp(-1000.0, 1000.0);
        p.damping = finite_or(p.damping, 0.5).clamp(0.0, 10.0);
        p.turbulence = finite_or(p.turbulence, 0.0).clamp(0.0, 10.0);
        p.mouse_influence = finite_or(p.mouse_influence, 1.0).clamp(0.0, 10.0);
        let v = &mut self.visual;
        v.min_size = finite_or(v.min_size, 1.5).clamp(0.1, 64.0);
        v.max_size = finite_or(v.max_size, 4.0).clamp(v.min_size, 64.0);
        v.opacity = finite_or(v.opacity, 0.85).clamp(0.0, 1.0);
        v.speed = finite_or(v.speed, 1.0).clamp(0.0, 10.0);
    }
}

/// Post-processing chain settings. Each pass can be switched off on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostProcessConfig {
    /// Master switch for the whole chain.
    pub enabled: bool,
    pub blur_enabled: bool,
    /// Blur radius multiplier in texels.
    pub blur_amount: f32,
    pub bloom_enabled: bool,
    pub bloom_strength: f32,
    pub bloom_threshold: f32,
    /// Number of half-resolution levels in the bloom mip chain.
    pub bloom_levels: u32,
    pub color_correction_enabled: bool,
    pub contrast: f32,
    pub brightness: f32,
    pub saturation: f32,
    pub tint: [f32; 3],
    pub composite_enabled: bool,
    pub vignette: f32,
    pub grain: f32,
    pub chromatic_offset: f32,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blur_enabled: false,
            blur_amount: 1.0,
            bloom_enabled: true,
            bloom_strength: 0.8,
            bloom_threshold: 0.6,
            bloom_levels: 5,
            color_correction_enabled: true,
            contrast: 1.1,
            brightness: 0.0,
            saturation: 1.1,
            tint: [1.0, 1.0, 1.0],
            composite_enabled: true,
            vignette: 0.35,
            grain: 0.03,
            chromatic_offset: 0.0015,
        }
    }
}

impl PostProcessConfig {
    pub fn validate(&mut self) {
        self.blur_amount = finite_or(self.blur_amount, 1.0).clamp(0.0, 8.0);
        self.bloom_strength = finite_or(self.bloom_strength, 0.8).clamp(0.0, 5.0);
        self.bloom_threshold = finite_or(self.bloom_threshold, 0.6).clamp(0.0, 1.0);
        self.bloom_levels = self.bloom_levels.clamp(1, 8);
        self.contrast = finite_or(self.contrast, 1.0).clamp(0.0, 3.0);
        self.brightness = finite_or(self.brightness, 0.0).clamp(-1.0, 1.0);
        self.saturation = finite_or(self.saturation, 1.0).clamp(0.0, 3.0);
        for c in &mut self.tint {
            *c = finite_or(*c, 1.0).clamp(0.0, 2.0);
        }
        self.vignette = finite_or(self.vignette, 0.0).clamp(0.0, 1.0);
        self.grain = finite_or(self.grain, 0.0).clamp(0.0, 1.0);
        self.chromatic_offset = finite_or(self.chromatic_offset, 0.0).clamp(0.0, 0.05);
    }
}

/// Pointer, touch and keyboard settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionConfig {
    pub enabled: bool,
    pub mouse_influence: f32,
    pub touch_influence: f32,
    /// Per-update decay factor applied to the interaction strength.
    pub damping_factor: f32,
    pub interaction_radius: f32,
    pub max_touches: u32,
    pub keyboard_enabled: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mouse_influence: 1.0,
            touch_influence: 0.8,
            damping_factor: 0.95,
            interaction_radius: 200.0,
            max_touches: 10,
            keyboard_enabled: true,
        }
    }
}

impl InteractionConfig {
    pub fn validate(&mut self) {
        self.mouse_influence = finite_or(self.mouse_influence, 1.0).clamp(0.0, 10.0);
        self.touch_influence = finite_or(self.touch_influence, 0.8).clamp(0.0, 10.0);
        self.damping_factor = finite_or(self.damping_factor, 0.95).clamp(0.0, 1.0);
        self.interaction_radius = finite_or(self.interaction_radius, 200.0)
            .clamp(crate::interaction::MIN_RADIUS, crate::interaction::MAX_RADIUS);
        self.max_touches = self.max_touches.clamp(1, 20);
    }
}

/// Frame-rate targets for the adaptive quality loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceConfig {
    pub target_fps: f32,
    /// Floor below which quality is reduced.
    pub min_fps: f32,
    pub adaptive_quality: bool,
    /// Rolling window length in frames.
    pub sample_window: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            min_fps: 30.0,
            adaptive_quality: true,
            sample_window: 60,
        }
    }
}

impl PerformanceConfig {
    pub fn validate(&mut self) {
        self.target_fps = finite_or(self.target_fps, 60.0).clamp(10.0, 240.0);
        self.min_fps = finite_or(self.min_fps, 30.0).clamp(1.0, self.target_fps);
        self.sample_window = self.sample_window.clamp(1, crate::performance::MAX_SAMPLES as u32);
    }
}

/// Renderer-side visual modulation. Never feeds back into the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Multiplier applied to every point size.
    pub global_scale: f32,
    /// `k` in `size × (1 + |velocity| × k)`.
    pub velocity_size_factor: f32,
    /// How much speed brightens a particle.
    pub velocity_intensity: f32,
    /// Amplitude of the time-based flicker.
    pub flicker: f32,
    /// Exponent of the radial glow falloff.
    pub glow_falloff: f32,
    pub background: [f32; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            global_scale: 1.0,
            velocity_size_factor: 0.01,
            velocity_intensity: 0.005,
            flicker: 0.1,
            glow_falloff: 2.0,
            background: [0.01, 0.01, 0.03],
        }
    }
}

impl RenderConfig {
    pub fn validate(&mut self) {
        self.global_scale = finite_or(self.global_scale, 1.0).clamp(0.1, 10.0);
        self.velocity_size_factor = finite_or(self.velocity_size_factor, 0.01).clamp(0.0, 1.0);
        self.velocity_intensity = finite_or(self.velocity_intensity, 0.005).clamp(0.0, 1.0);
        self.flicker = finite_or(self.flicker, 0.1).clamp(0.0, 1.0);
        self.glow_falloff = finite_or(self.glow_falloff, 2.0).clamp(0.1, 8.0);
        for c in &mut self.background {
            *c = finite_or(*c, 0.0).clamp(0.0, 1.0);
        }
    }
}

/// The complete active configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParticleFieldConfig {
    pub particle: ParticleSystemConfig,
    pub post_process: PostProcessConfig,
    pub interaction: InteractionConfig,
    pub performance: PerformanceConfig,
    pub visual: RenderConfig,
}

impl ParticleFieldConfig {
    /// Clamp every sub-config into range.
    pub fn validate(&mut self) {
        self.particle.validate();
        self.post_process.validate();
        self.interaction.validate();
        self.performance.validate();
        self.visual.validate();
    }

    /// Return a validated copy.
    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }

    /// Parse a (possibly partial) JSON document, backfilling from defaults.
    pub fn from_json(json: &str) -> Result<Self, crate::error::ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    pub fn to_json(&self) -> Result<String, crate::error::ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether the blur passes run.
    pub fn blur_active(&self) -> bool {
        self.post_process.blur_enabled && self.particle.effects.blur
    }

    /// Whether the bloom pass runs.
    pub fn bloom_active(&self) -> bool {
        self.post_process.bloom_enabled && self.particle.effects.bloom
    }

    /// Whether color correction runs.
    pub fn color_correction_active(&self) -> bool {
        self.post_process.color_correction_enabled && self.particle.effects.contrast
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_backfills_defaults() {
        let config = ParticleFieldConfig::from_json(r#"{"particle":{"physics":{"gravity":5}}}"#).unwrap();
        assert_eq!(config.particle.physics.gravity, 5.0);
        assert_eq!(config.particle.physics.damping, PhysicsConfig::default().damping);
        assert_eq!(config.particle.particle_count, ParticleSystemConfig::default().particle_count);
        assert_eq!(config.post_process, PostProcessConfig::default());
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json = ParticleFieldConfig::default().to_json().unwrap();
        assert!(json.contains("\"particleCount\""));
        assert!(json.contains("\"postProcess\""));
        assert!(json.contains("\"colorScheme\": \"rainbow\""));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(ParticleFieldConfig::from_json("{\"particle\": ").is_err());
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = ParticleFieldConfig::default();
        config.particle.particle_count = 0;
        config.particle.visual.opacity = 4.0;
        config.interaction.interaction_radius = 10.0;
        config.particle.physics.damping = f32::NAN;
        config.validate();
        assert_eq!(config.particle.particle_count, 1);
        assert_eq!(config.particle.visual.opacity, 1.0);
        assert_eq!(config.interaction.interaction_radius, 50.0);
        assert_eq!(config.particle.physics.damping, 0.5);
    }

    #[test]
    fn test_effect_gating_needs_both_switches() {
        let mut config = ParticleFieldConfig::default();
        config.particle.effects.bloom = false;
        assert!(!config.bloom_active());
        config.particle.effects.bloom = true;
        config.post_process.bloom_enabled = false;
        assert!(!config.bloom_active());
        config.post_process.bloom_enabled = true;
        assert!(config.bloom_active());
    }
}
