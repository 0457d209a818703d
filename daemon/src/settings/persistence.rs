//! Key-value persistence behind the settings store
//!
//! The store only needs `get/set/delete` over string keys. The file backend
//! keeps a flat TOML table and replaces it atomically on every write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

/// Errors raised by a persistence backend
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid TOML: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Durable string key-value storage
pub trait SettingsPersistence: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn delete(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Settings kept in a TOML file
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl TomlFileStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
            lock: Mutex::new(()),
        }
    }

    fn read_table(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(toml::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_table(&self, table: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let encoded = toml::to_string(table)?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, encoded)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = ?self.path, keys = table.len(), "settings written");
        Ok(())
    }

    fn update<F>(&self, change: F) -> Result<(), PersistenceError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut table = self.read_table()?;
        if change(&mut table) {
            self.write_table(&table)?;
        }
        Ok(())
    }
}

impl SettingsPersistence for TomlFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_table()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.update(|table| {
            table.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        self.update(|table| table.remove(key).is_some())
    }
}

/// Volatile store for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl SettingsPersistence for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let store = TomlFileStore::new(&path);

        assert_eq!(store.get("selected_model").unwrap(), None);

        store.set("selected_model", "llama3:8b").unwrap();
        store.set("system_prompt", "line one\nline \"two\"").unwrap();

        let reopened = TomlFileStore::new(&path);
        assert_eq!(
            reopened.get("selected_model").unwrap().as_deref(),
            Some("llama3:8b")
        );
        assert_eq!(
            reopened.get("system_prompt").unwrap().as_deref(),
            Some("line one\nline \"two\"")
        );

        reopened.delete("system_prompt").unwrap();
        assert_eq!(store.get("system_prompt").unwrap(), None);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let store = TomlFileStore::new(&path);
        assert!(matches!(
            store.get("selected_model"),
            Err(PersistenceError::Decode(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::default();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
