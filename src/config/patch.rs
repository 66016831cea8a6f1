//! Partial configuration updates.
//!
//! Each sub-config has a patch type whose fields are all optional. `apply`
//! writes only the fields that are set, so an update to one nested value
//! never disturbs its siblings. Patches deserialize from partial JSON too.

use serde::{Deserialize, Serialize};

use super::{
    ColorScheme, EffectsConfig, InteractionConfig, ParticleFieldConfig, ParticleSystemConfig,
    ParticleVisualConfig, PerformanceConfig, PhysicsConfig, PostProcessConfig, QualityLevel,
    RenderConfig,
};

macro_rules! set_if {
    ($target:expr, $patch:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                $target.$field = value;
            }
        )+
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectsPatch {
    pub bloom: Option<bool>,
    pub blur: Option<bool>,
    pub contrast: Option<bool>,
}

impl EffectsConfig {
    pub fn apply(&mut self, patch: &EffectsPatch) {
        set_if!(self, patch, bloom, blur, contrast);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsPatch {
    pub gravity: Option<f32>,
    pub damping: Option<f32>,
    pub turbulence: Option<f32>,
    pub mouse_influence: Option<f32>,
}

impl PhysicsConfig {
    pub fn apply(&mut self, patch: &PhysicsPatch) {
        set_if!(self, patch, gravity, damping, turbulence, mouse_influence);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParticleVisualPatch {
    pub min_size: Option<f32>,
    pub max_size: Option<f32>,
    pub opacity: Option<f32>,
    pub speed: Option<f32>,
}

impl ParticleVisualConfig {
    pub fn apply(&mut self, patch: &ParticleVisualPatch) {
        set_if!(self, patch, min_size, max_size, opacity, speed);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParticleConfigPatch {
    pub particle_count: Option<u32>,
    pub noise_scale: Option<f32>,
    pub color_scheme: Option<ColorScheme>,
    pub performance_level: Option<QualityLevel>,
    pub effects: Option<EffectsPatch>,
    pub physics: Option<PhysicsPatch>,
    pub visual: Option<ParticleVisualPatch>,
}

impl ParticleConfigPatch {
    /// Patch that only touches physics.
    pub fn physics(physics: PhysicsPatch) -> Self {
        Self {
            physics: Some(physics),
            ..Default::default()
        }
    }
}

impl ParticleSystemConfig {
    pub fn apply(&mut self, patch: &ParticleConfigPatch) {
        set_if!(self, patch, particle_count, noise_scale, color_scheme, performance_level);
        if let Some(effects) = &patch.effects {
            self.effects.apply(effects);
        }
        if let Some(physics) = &patch.physics {
            self.physics.apply(physics);
        }
        if let Some(visual) = &patch.visual {
            self.visual.apply(visual);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostProcessPatch {
    pub enabled: Option<bool>,
    pub blur_enabled: Option<bool>,
    pub blur_amount: Option<f32>,
    pub bloom_enabled: Option<bool>,
    pub bloom_strength: Option<f32>,
    pub bloom_threshold: Option<f32>,
    pub bloom_levels: Option<u32>,
    pub color_correction_enabled: Option<bool>,
    pub contrast: Option<f32>,
    pub brightness: Option<f32>,
    pub saturation: Option<f32>,
    pub tint: Option<[f32; 3]>,
    pub composite_enabled: Option<bool>,
    pub vignette: Option<f32>,
    pub grain: Option<f32>,
    pub chromatic_offset: Option<f32>,
}

impl PostProcessConfig {
    pub fn apply(&mut self, patch: &PostProcessPatch) {
        set_if!(
            self,
            patch,
            enabled,
            blur_enabled,
            blur_amount,
            bloom_enabled,
            bloom_strength,
            bloom_threshold,
            bloom_levels,
            color_correction_enabled,
            contrast,
            brightness,
            saturation,
            tint,
            composite_enabled,
            vignette,
            grain,
            chromatic_offset,
        );
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionPatch {
    pub enabled: Option<bool>,
    pub mouse_influence: Option<f32>,
    pub touch_influence: Option<f32>,
    pub damping_factor: Option<f32>,
    pub interaction_radius: Option<f32>,
    pub max_touches: Option<u32>,
    pub keyboard_enabled: Option<bool>,
}

impl InteractionConfig {
    pub fn apply(&mut self, patch: &InteractionPatch) {
        set_if!(
            self,
            patch,
            enabled,
            mouse_influence,
            touch_influence,
            damping_factor,
            interaction_radius,
            max_touches,
            keyboard_enabled,
        );
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformancePatch {
    pub target_fps: Option<f32>,
    pub min_fps: Option<f32>,
    pub adaptive_quality: Option<bool>,
    pub sample_window: Option<u32>,
}

impl PerformanceConfig {
    pub fn apply(&mut self, patch: &PerformancePatch) {
        set_if!(self, patch, target_fps, min_fps, adaptive_quality, sample_window);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfigPatch {
    pub global_scale: Option<f32>,
    pub velocity_size_factor: Option<f32>,
    pub velocity_intensity: Option<f32>,
    pub flicker: Option<f32>,
    pub glow_falloff: Option<f32>,
    pub background: Option<[f32; 3]>,
}

impl RenderConfig {
    pub fn apply(&mut self, patch: &RenderConfigPatch) {
        set_if!(
            self,
            patch,
            global_scale,
            velocity_size_factor,
            velocity_intensity,
            flicker,
            glow_falloff,
            background,
        );
    }
}

/// Patch for the whole configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigPatch {
    pub particle: Option<ParticleConfigPatch>,
    pub post_process: Option<PostProcessPatch>,
    pub interaction: Option<InteractionPatch>,
    pub performance: Option<PerformancePatch>,
    pub visual: Option<RenderConfigPatch>,
}

impl ConfigPatch {
    /// Parse a partial JSON patch such as `{"particle":{"physics":{"gravity":5}}}`.
    pub fn from_json(json: &str) -> Result<Self, crate::error::ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        *self == ConfigPatch::default()
    }
}

impl ParticleFieldConfig {
    /// Merge `patch` field by field, then clamp into range.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(p) = &patch.particle {
            self.particle.apply(p);
        }
        if let Some(p) = &patch.post_process {
            self.post_process.apply(p);
        }
        if let Some(p) = &patch.interaction {
            self.interaction.apply(p);
        }
        if let Some(p) = &patch.performance {
            self.performance.apply(p);
        }
        if let Some(p) = &patch.visual {
            self.visual.apply(p);
        }
        self.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravity_patch_leaves_siblings_alone() {
        let mut config = ParticleFieldConfig::default();
        config.particle.color_scheme = ColorScheme::Neon;
        config.particle.noise_scale = 0.02;
        let before = config.clone();

        config.apply(&ConfigPatch {
            particle: Some(ParticleConfigPatch::physics(PhysicsPatch {
                gravity: Some(5.0),
                ..Default::default()
            })),
            ..Default::default()
        });

        assert_eq!(config.particle.physics.gravity, 5.0);
        assert_eq!(config.particle.physics.damping, before.particle.physics.damping);
        assert_eq!(config.particle.physics.turbulence, before.particle.physics.turbulence);
        assert_eq!(config.particle.noise_scale, 0.02);
        assert_eq!(config.particle.color_scheme, ColorScheme::Neon);
        assert_eq!(config.particle.visual, before.particle.visual);
        assert_eq!(config.post_process, before.post_process);
        assert_eq!(config.interaction, before.interaction);
    }

    #[test]
    fn test_patch_from_partial_json() {
        let patch = ConfigPatch::from_json(r#"{"postProcess":{"bloomStrength":1.5}}"#).unwrap();
        let mut config = ParticleFieldConfig::default();
        config.apply(&patch);
        assert_eq!(config.post_process.bloom_strength, 1.5);
        assert_eq!(config.post_process.bloom_threshold, PostProcessConfig::default().bloom_threshold);
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let patch = ConfigPatch::default();
        assert!(patch.is_empty());
        let mut config = ParticleFieldConfig::default();
        config.apply(&patch);
        assert_eq!(config, ParticleFieldConfig::default());
    }

    #[test]
    fn test_patch_values_are_clamped() {
        let mut config = ParticleFieldConfig::default();
        config.apply(&ConfigPatch {
            interaction: Some(InteractionPatch {
                interaction_radius: Some(1000.0),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(config.interaction.interaction_radius, 300.0);
    }
}
