//! Persistence backends for the configuration manager.
//!
//! The manager stores two independent JSON documents: the active
//! configuration under [`CONFIG_KEY`] and the custom preset list under
//! [`PRESETS_KEY`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_KEY: &str = "config";
pub const PRESETS_KEY: &str = "presets";

/// Key/value storage for JSON documents. Writes are synchronous.
pub trait ConfigStore {
    /// Read a document. `Ok(None)` means it was never written.
    fn load(&self, key: &str) -> Result<Option<String>, ConfigError>;
    fn save(&mut self, key: &str, json: &str) -> Result<(), ConfigError>;
}

/// In-memory store, used headless and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.documents.get(key).map(String::as_str)
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.documents.get(key).cloned())
    }

    fn save(&mut self, key: &str, json: &str) -> Result<(), ConfigError> {
        self.documents.insert(key.to_string(), json.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per document inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl ConfigStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, key: &str, json: &str) -> Result<(), ConfigError> {
        // Atomic replace.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert!(store.load(CONFIG_KEY).unwrap().is_none());
        store.save(CONFIG_KEY, "{}").unwrap();
        assert_eq!(store.load(CONFIG_KEY).unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get(CONFIG_KEY), Some("{}"));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested")).unwrap();
        assert!(store.load(PRESETS_KEY).unwrap().is_none());
        store.save(PRESETS_KEY, "[]").unwrap();
        assert_eq!(store.load(PRESETS_KEY).unwrap().as_deref(), Some("[]"));
        assert!(store.path_for(PRESETS_KEY).exists());
    }
}
