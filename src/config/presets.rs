//! Built-in presets and quality profiles.

use serde::{Deserialize, Serialize};

use super::patch::{ConfigPatch, EffectsPatch, ParticleConfigPatch, PostProcessPatch};
use super::{
    ColorScheme, EffectsConfig, ParticleFieldConfig, ParticleSystemConfig, PhysicsConfig,
    PostProcessConfig, QualityLevel,
};

/// A named configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPreset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ParticleFieldConfig,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
    #[serde(default)]
    pub is_built_in: bool,
}

impl ConfigPreset {
    /// Case-insensitive substring match on name or description, plus tag
    /// intersection when `tags` is non-empty.
    pub fn matches(&self, query: &str, tags: &[String]) -> bool {
        let query = query.trim().to_lowercase();
        let text_match = query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query);
        let tag_match = tags.is_empty()
            || tags
                .iter()
                .any(|wanted| self.tags.iter().any(|t| t.eq_ignore_ascii_case(wanted)));
        text_match && tag_match
    }
}

/// Input for creating or updating a custom preset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetDraft {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Snapshot to store. `None` captures the active configuration.
    pub config: Option<ParticleFieldConfig>,
}

fn built_in(id: &str, name: &str, description: &str, tags: &[&str], config: ParticleFieldConfig) -> ConfigPreset {
    ConfigPreset {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        config: config.validated(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        created_at: 0,
        updated_at: 0,
        is_built_in: true,
    }
}

fn with_quality(level: QualityLevel) -> ParticleFieldConfig {
    let mut config = ParticleFieldConfig::default();
    config.apply(&quality_profile(level));
    config
}

/// The immutable presets shipped with the engine.
pub fn built_in_presets() -> Vec<ConfigPreset> {
    vec![
        built_in(
            "default",
            "Default",
            "Balanced look with bloom and gentle noise drift",
            &["balanced"],
            ParticleFieldConfig::default(),
        ),
        built_in(
            "minimal",
            "Minimal",
            "Few particles, no post-processing",
            &["performance", "clean"],
            ParticleFieldConfig {
                particle: ParticleSystemConfig {
                    particle_count: 500,
                    color_scheme: ColorScheme::Monochrome,
                    effects: EffectsConfig {
                        bloom: false,
                        blur: false,
                        contrast: false,
                    },
                    ..Default::default()
                },
                post_process: PostProcessConfig {
                    enabled: false,
                    ..Default::default()
                },
                ..Default::default()
            },
        ),
        built_in(
            "performance-low",
            "Low Quality",
            "For mobile and low-power devices",
            &["performance", "quality"],
            with_quality(QualityLevel::Low),
        ),
        built_in(
            "performance-medium",
            "Medium Quality",
            "For integrated graphics",
            &["performance", "quality"],
            with_quality(QualityLevel::Medium),
        ),
        built_in(
            "performance-high",
            "High Quality",
            "For dedicated graphics",
            &["performance", "quality"],
            with_quality(QualityLevel::High),
        ),
        built_in(
            "performance-ultra",
            "Ultra Quality",
            "Everything on, for high-end GPUs",
            &["performance", "quality"],
            with_quality(QualityLevel::Ultra),
        ),
        built_in(
            "cosmic",
            "Cosmic",
            "Slow purple nebula with strong glow",
            &["space", "calm", "glow"],
            ParticleFieldConfig {
                particle: ParticleSystemConfig {
                    color_scheme: ColorScheme::Cosmic,
                    noise_scale: 0.003,
                    physics: PhysicsConfig {
                        damping: 0.8,
                        turbulence: 0.2,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                post_process: PostProcessConfig {
                    bloom_strength: 1.4,
                    bloom_threshold: 0.4,
                    vignette: 0.5,
                    ..Default::default()
                },
                ..Default::default()
            },
        ),
        built_in(
            "ocean-calm",
            "Ocean Calm",
            "Soft blue currents",
            &["calm", "water"],
            ParticleFieldConfig {
                particle: ParticleSystemConfig {
                    color_scheme: ColorScheme::Ocean,
                    noise_scale: 0.004,
                    effects: EffectsConfig {
                        bloom: true,
                        blur: true,
                        contrast: true,
                    },
                    physics: PhysicsConfig {
                        damping: 0.9,
                        turbulence: 0.1,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                post_process: PostProcessConfig {
                    blur_enabled: true,
                    blur_amount: 0.6,
                    saturation: 1.2,
                    tint: [0.9, 1.0, 1.1],
                    ..Default::default()
                },
                ..Default::default()
            },
        ),
        built_in(
            "fire-storm",
            "Fire Storm",
            "Fast rising embers with heavy turbulence",
            &["energetic", "warm"],
            ParticleFieldConfig {
                particle: ParticleSystemConfig {
                    particle_count: 5000,
                    color_scheme: ColorScheme::Fire,
                    noise_scale: 0.008,
                    physics: PhysicsConfig {
                        gravity: -30.0,
                        damping: 0.3,
                        turbulence: 1.5,
                        mouse_influence: 1.5,
                    },
                    ..Default::default()
                },
                post_process: PostProcessConfig {
                    bloom_strength: 1.2,
                    contrast: 1.3,
                    ..Default::default()
                },
                ..Default::default()
            },
        ),
        built_in(
            "neon-pulse",
            "Neon Pulse",
            "Saturated cyberpunk colors",
            &["energetic", "glow"],
            ParticleFieldConfig {
                particle: ParticleSystemConfig {
                    color_scheme: ColorScheme::Neon,
                    ..Default::default()
                },
                post_process: PostProcessConfig {
                    saturation: 1.5,
                    bloom_strength: 1.0,
                    chromatic_offset: 0.003,
                    ..Default::default()
                },
                ..Default::default()
            },
        ),
    ]
}

/// Fields a quality level controls. Colors and physics are left alone.
pub fn quality_profile(level: QualityLevel) -> ConfigPatch {
    let (count, bloom, blur, contrast, levels, post) = match level {
        QualityLevel::Low => (800, false, false, false, 2, false),
        QualityLevel::Medium => (2000, true, false, true, 3, true),
        QualityLevel::High => (4000, true, false, true, 5, true),
        QualityLevel::Ultra => (8000, true, true, true, 6, true),
    };

    ConfigPatch {
        particle: Some(ParticleConfigPatch {
            particle_count: Some(count),
            performance_level: Some(level),
            effects: Some(EffectsPatch {
                bloom: Some(bloom),
                blur: Some(blur),
                contrast: Some(contrast),
            }),
            ..Default::default()
        }),
        post_process: Some(PostProcessPatch {
            enabled: Some(post),
            bloom_levels: Some(levels),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_ids_are_unique() {
        let presets = built_in_presets();
        let mut ids: Vec<_> = presets.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), presets.len());
        assert!(presets.iter().all(|p| p.is_built_in));
    }

    #[test]
    fn test_quality_profiles_scale_particle_count() {
        let counts: Vec<u32> = QualityLevel::ALL
            .iter()
            .map(|level| with_quality(*level).particle.particle_count)
            .collect();
        assert!(counts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_quality_profile_keeps_colors() {
        let mut config = ParticleFieldConfig::default();
        config.particle.color_scheme = ColorScheme::Forest;
        config.apply(&quality_profile(QualityLevel::Low));
        assert_eq!(config.particle.color_scheme, ColorScheme::Forest);
        assert_eq!(config.particle.performance_level, QualityLevel::Low);
        assert!(!config.post_process.enabled);
    }

    #[test]
    fn test_preset_matching() {
        let preset = built_in_presets().into_iter().find(|p| p.id == "cosmic").unwrap();
        assert!(preset.matches("NEBULA", &[]));
        assert!(preset.matches("", &["glow".into()]));
        assert!(preset.matches("cosm", &["space".into(), "other".into()]));
        assert!(!preset.matches("cosm", &["water".into()]));
        assert!(!preset.matches("ocean", &[]));
    }
}
