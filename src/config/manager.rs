//! The single source of truth for the active configuration.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::patch::{
    ConfigPatch, InteractionPatch, ParticleConfigPatch, PerformancePatch, PostProcessPatch,
    RenderConfigPatch,
};
use super::presets::{built_in_presets, quality_profile, ConfigPreset, PresetDraft};
use super::store::{ConfigStore, MemoryStore, CONFIG_KEY, PRESETS_KEY};
use super::{ParticleFieldConfig, QualityLevel};
use crate::error::ConfigError;

/// Export/import document: the active config plus every custom preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigDocument {
    pub config: ParticleFieldConfig,
    pub custom_presets: Vec<ConfigPreset>,
}

/// Import-side view of [`ConfigDocument`] that keeps presets unparsed, so
/// one malformed preset does not reject the rest.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawDocument {
    config: ParticleFieldConfig,
    custom_presets: Vec<serde_json::Value>,
}

/// Handle returned by [`ConfigManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&ParticleFieldConfig)>;

/// Holds the active configuration, built-in presets and custom presets.
///
/// Every mutation is persisted synchronously through the [`ConfigStore`]
/// and announced to subscribers. Persistence failures are logged; the
/// in-memory state stays authoritative.
pub struct ConfigManager {
    store: Box<dyn ConfigStore>,
    config: ParticleFieldConfig,
    built_in: Vec<ConfigPreset>,
    custom: Vec<ConfigPreset>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    next_preset: u64,
    revision: u64,
}

impl ConfigManager {
    /// Load and revalidate persisted state from `store`.
    ///
    /// Unreadable or malformed documents are logged and replaced by defaults.
    pub fn new(store: Box<dyn ConfigStore>) -> Self {
        let config = match store.load(CONFIG_KEY) {
            Ok(Some(json)) => ParticleFieldConfig::from_json(&json).unwrap_or_else(|e| {
                log::warn!("Discarding stored configuration: {}", e);
                ParticleFieldConfig::default()
            }),
            Ok(None) => ParticleFieldConfig::default(),
            Err(e) => {
                log::warn!("Could not read stored configuration: {}", e);
                ParticleFieldConfig::default()
            }
        };

        let custom = match store.load(PRESETS_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<serde_json::Value>>(&json) {
                Ok(values) => parse_presets(values),
                Err(e) => {
                    log::warn!("Discarding stored presets: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Could not read stored presets: {}", e);
                Vec::new()
            }
        };

        log::debug!("Config manager loaded with {} custom presets", custom.len());

        Self {
            store,
            config,
            built_in: built_in_presets(),
            custom,
            listeners: Vec::new(),
            next_listener: 0,
            next_preset: 0,
            revision: 0,
        }
    }

    /// Manager backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Borrow the active configuration.
    pub fn current(&self) -> &ParticleFieldConfig {
        &self.config
    }

    /// Owned snapshot of the active configuration.
    pub fn get_current_config(&self) -> ParticleFieldConfig {
        self.config.clone()
    }

    /// Incremented on every change to the active configuration.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ========== Active config mutation ==========

    /// Merge a partial update into the active configuration.
    pub fn update_config(&mut self, patch: &ConfigPatch) {
        if patch.is_empty() {
            return;
        }
        self.config.apply(patch);
        self.config_changed();
    }

    pub fn update_particle_config(&mut self, patch: ParticleConfigPatch) {
        self.update_config(&ConfigPatch {
            particle: Some(patch),
            ..Default::default()
        });
    }

    pub fn update_post_process_config(&mut self, patch: PostProcessPatch) {
        self.update_config(&ConfigPatch {
            post_process: Some(patch),
            ..Default::default()
        });
    }

    pub fn update_interaction_config(&mut self, patch: InteractionPatch) {
        self.update_config(&ConfigPatch {
            interaction: Some(patch),
            ..Default::default()
        });
    }

    pub fn update_performance_config(&mut self, patch: PerformancePatch) {
        self.update_config(&ConfigPatch {
            performance: Some(patch),
            ..Default::default()
        });
    }

    pub fn update_visual_config(&mut self, patch: RenderConfigPatch) {
        self.update_config(&ConfigPatch {
            visual: Some(patch),
            ..Default::default()
        });
    }

    /// Replace the active configuration with a preset snapshot.
    ///
    /// Built-in presets shadow custom presets with the same id.
    pub fn apply_preset(&mut self, id: &str) -> Result<(), ConfigError> {
        let config = self
            .get_preset(id)
            .map(|preset| preset.config.clone().validated())
            .ok_or_else(|| ConfigError::UnknownPreset(id.to_string()))?;
        self.config = config;
        log::info!("Applied preset '{}'", id);
        self.config_changed();
        Ok(())
    }

    /// Merge the quality profile for `level`, keeping colors and physics.
    pub fn apply_quality_level(&mut self, level: QualityLevel) {
        self.update_config(&quality_profile(level));
    }

    /// Restore defaults.
    pub fn reset_to_defaults(&mut self) {
        self.config = ParticleFieldConfig::default();
        self.config_changed();
    }

    // ========== Presets ==========

    /// Look a preset up by id, built-ins first.
    pub fn get_preset(&self, id: &str) -> Option<&ConfigPreset> {
        self.built_in
            .iter()
            .find(|p| p.id == id)
            .or_else(|| self.custom.iter().find(|p| p.id == id))
    }

    pub fn built_in_presets(&self) -> &[ConfigPreset] {
        &self.built_in
    }

    pub fn custom_presets(&self) -> &[ConfigPreset] {
        &self.custom
    }

    /// All presets, built-ins first.
    pub fn presets(&self) -> impl Iterator<Item = &ConfigPreset> {
        self.built_in.iter().chain(self.custom.iter())
    }

    /// Presets whose name or description contains `query` (case-insensitive)
    /// and that carry at least one of `tags` when `tags` is non-empty.
    pub fn search_presets(&self, query: &str, tags: &[String]) -> Vec<&ConfigPreset> {
        self.presets().filter(|p| p.matches(query, tags)).collect()
    }

    /// Store a new custom preset and return it.
    pub fn create_preset(&mut self, draft: PresetDraft) -> ConfigPreset {
        let now = now_millis();
        let id = self.generate_preset_id(now);
        let preset = ConfigPreset {
            id,
            name: draft.name,
            description: draft.description,
            config: draft.config.unwrap_or_else(|| self.config.clone()).validated(),
            tags: draft.tags,
            created_at: now,
            updated_at: now,
            is_built_in: false,
        };
        self.custom.push(preset.clone());
        self.persist_presets();
        preset
    }

    /// Overwrite the fields of a custom preset.
    pub fn update_preset(&mut self, id: &str, draft: PresetDraft) -> Result<ConfigPreset, ConfigError> {
        if self.built_in.iter().any(|p| p.id == id) {
            return Err(ConfigError::BuiltInPreset(id.to_string()));
        }
        let preset = self
            .custom
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ConfigError::UnknownPreset(id.to_string()))?;

        preset.name = draft.name;
        preset.description = draft.description;
        preset.tags = draft.tags;
        if let Some(config) = draft.config {
            preset.config = config.validated();
        }
        preset.updated_at = now_millis().max(preset.created_at);
        let updated = preset.clone();
        self.persist_presets();
        Ok(updated)
    }

    pub fn delete_preset(&mut self, id: &str) -> Result<(), ConfigError> {
        if self.built_in.iter().any(|p| p.id == id) {
            return Err(ConfigError::BuiltInPreset(id.to_string()));
        }
        let before = self.custom.len();
        self.custom.retain(|p| p.id != id);
        if self.custom.len() == before {
            return Err(ConfigError::UnknownPreset(id.to_string()));
        }
        self.persist_presets();
        Ok(())
    }

    // ========== Import / export ==========

    /// Serialize `{config, customPresets}` as pretty JSON.
    pub fn export_config(&self) -> Result<String, ConfigError> {
        let document = ConfigDocument {
            config: self.config.clone(),
            custom_presets: self.custom.clone(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Load a document produced by [`export_config`](Self::export_config).
    ///
    /// Missing fields are backfilled from defaults. Imported presets replace
    /// custom presets with the same id; ids that collide with a built-in are
    /// skipped, as is any preset without an id or with mistyped fields.
    /// Only a malformed document is an error, and it leaves state untouched.
    pub fn import_config(&mut self, json: &str) -> Result<(), ConfigError> {
        let document: RawDocument = serde_json::from_str(json)?;

        for preset in parse_presets(document.custom_presets) {
            if self.built_in.iter().any(|p| p.id == preset.id) {
                log::warn!("Skipping imported preset '{}': id belongs to a built-in", preset.id);
                continue;
            }
            match self.custom.iter_mut().find(|p| p.id == preset.id) {
                Some(existing) => *existing = preset,
                None => self.custom.push(preset),
            }
        }
        self.persist_presets();

        self.config = document.config.validated();
        self.config_changed();
        Ok(())
    }

    // ========== Listeners ==========

    /// Call `listener` with the new snapshot after every change.
    pub fn subscribe(&mut self, listener: impl FnMut(&ParticleFieldConfig) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    // ========== Internal ==========

    fn config_changed(&mut self) {
        self.revision += 1;
        self.persist_config();
        for (_, listener) in &mut self.listeners {
            listener(&self.config);
        }
    }

    fn persist_config(&mut self) {
        let result = self
            .config
            .to_json()
            .and_then(|json| self.store.save(CONFIG_KEY, &json));
        if let Err(e) = result {
            log::warn!("Failed to persist configuration: {}", e);
        }
    }

    fn persist_presets(&mut self) {
        let result = serde_json::to_string_pretty(&self.custom)
            .map_err(ConfigError::from)
            .and_then(|json| self.store.save(PRESETS_KEY, &json));
        if let Err(e) = result {
            log::warn!("Failed to persist presets: {}", e);
        }
    }

    fn generate_preset_id(&mut self, now: u64) -> String {
        loop {
            let id = format!("custom-{}-{}", now, self.next_preset);
            self.next_preset += 1;
            if self.get_preset(&id).is_none() {
                return id;
            }
        }
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("config", &self.config)
            .field("custom_presets", &self.custom.len())
            .field("listeners", &self.listeners.len())
            .field("revision", &self.revision)
            .finish()
    }
}

/// Parse each preset on its own, dropping the ones that do not deserialize.
fn parse_presets(values: Vec<serde_json::Value>) -> Vec<ConfigPreset> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<ConfigPreset>(value) {
            Ok(preset) => Some(sanitize_custom(preset)),
            Err(e) => {
                log::warn!("Skipping malformed preset: {}", e);
                None
            }
        })
        .collect()
}

fn sanitize_custom(mut preset: ConfigPreset) -> ConfigPreset {
    preset.is_built_in = false;
    preset.config.validate();
    preset
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
