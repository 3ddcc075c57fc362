use std::{collections::HashMap, sync::RwLock};

use anyhow::Result;

use super::KeyValueStore;

/// Volatile store, for tests and hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        let guard = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.to_string(), value);
        Ok(())
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
        guard.remove(key);
        Ok(())
    }
}
