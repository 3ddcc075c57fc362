//! Device-local key-value persistence.
//!
//! Values are untyped text. Anything that cannot be read back (missing key,
//! unparseable JSON, backend failure) is reported as absent rather than
//! raised, so callers always get either a value or their own default.

mod file;
mod memory;
mod migrations;
mod sqlite;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use tokio::runtime::RuntimeFlavor;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

const ENABLE_LOGS: bool = true;

pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&self, key: &str, value: String) -> Result<()>;
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed JSON access on top of any [`KeyValueStore`].
pub trait JsonStoreExt: KeyValueStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                crate::log_warn!("Ignoring unreadable value under '{key}': {err}");
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        self.set_raw(key, serialized)
    }
}

impl<S: KeyValueStore + ?Sized> JsonStoreExt for S {}

/// Runs a synchronous store call from async code. On a multi-threaded
/// runtime the worker hands its other tasks off first; elsewhere the call
/// runs inline.
pub fn blocking<T>(call: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(call)
        }
        _ => call(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Preferences {
        name: String,
        glasses: u32,
        last_seen: chrono::DateTime<Utc>,
    }

    #[test]
    fn corrupted_json_reads_as_absent() {
        let store = MemoryStore::new();
        store.set_raw("prefs", "{not json".into()).unwrap();

        let value: Option<Preferences> = store.get_json("prefs");
        assert!(value.is_none());
    }

    #[test]
    fn wrong_shape_reads_as_absent() {
        let store = MemoryStore::new();
        store.set_raw("prefs", "[1, 2, 3]".into()).unwrap();

        assert!(store.get_json::<Preferences>("prefs").is_none());
    }

    #[test]
    fn structured_value_round_trips() {
        let store = MemoryStore::new();
        let prefs = Preferences {
            name: "sam".into(),
            glasses: 3,
            last_seen: Utc.with_ymd_and_hms(2026, 1, 5, 7, 30, 0).unwrap(),
        };
        store.set_json("prefs", &prefs).unwrap();

        assert_eq!(store.get_json::<Preferences>("prefs"), Some(prefs));
    }

    #[test]
    fn blocking_runs_inline_outside_a_runtime() {
        assert_eq!(blocking(|| 2 + 2), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_hands_off_on_multi_thread_runtimes() {
        let store = MemoryStore::new();
        blocking(|| store.set_json("n", &3u32)).unwrap();
        assert_eq!(store.get_json::<u32>("n"), Some(3));
    }

    #[test]
    fn works_through_trait_objects() {
        let store: std::sync::Arc<dyn KeyValueStore> = std::sync::Arc::new(MemoryStore::new());
        store.set_json("n", &7u32).unwrap();
        assert_eq!(store.get_json::<u32>("n"), Some(7));
    }
}
