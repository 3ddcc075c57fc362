use std::{collections::BTreeMap, fs, path::PathBuf, sync::RwLock};

use anyhow::{Context, Result};

use super::KeyValueStore;

const ENABLE_LOGS: bool = true;

/// Whole-map JSON document on disk, rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let bytes = fs::read(&path)
                .with_context(|| format!("Failed to read store from {}", path.display()))?;
            match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(err) => {
                    crate::log_warn!(
                        "Store file {} is unreadable, starting empty: {err}",
                        path.display()
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write store to {}", self.path.display()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        let guard = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.to_string(), value);
        self.persist(&guard)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let guard = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut keys: Vec<String> = guard
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.remove(key).is_some() {
            self.persist(&guard)?;
        }
        Ok(())
    }
}
