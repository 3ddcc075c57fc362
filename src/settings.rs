use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::RwLock,
};

use crate::daily_flow::FlowKind;
use crate::session::humor::{DEFAULT_HUMOR_COOLDOWN_MINUTES, DEFAULT_STRUGGLE_QUIET_MINUTES};
use crate::session::DEFAULT_HISTORY_CAP;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanionSettings {
    pub humor_cooldown_minutes: i64,
    pub struggle_quiet_minutes: i64,
    pub game_cooldown_minutes: i64,
    pub default_focus_minutes: u64,
    pub history_cap: usize,
    pub enabled_flows: Vec<FlowKind>,
}

impl Default for CompanionSettings {
    fn default() -> Self {
        Self {
            humor_cooldown_minutes: DEFAULT_HUMOR_COOLDOWN_MINUTES,
            struggle_quiet_minutes: DEFAULT_STRUGGLE_QUIET_MINUTES,
            game_cooldown_minutes: 10,
            default_focus_minutes: 25,
            history_cap: DEFAULT_HISTORY_CAP,
            enabled_flows: FlowKind::ALL.to_vec(),
        }
    }
}

impl CompanionSettings {
    pub fn humor_cooldown(&self) -> Duration {
        Duration::minutes(self.humor_cooldown_minutes.max(0))
    }

    pub fn struggle_quiet(&self) -> Duration {
        Duration::minutes(self.struggle_quiet_minutes.max(0))
    }

    pub fn game_cooldown(&self) -> Duration {
        Duration::minutes(self.game_cooldown_minutes.max(0))
    }
}

/// Settings document on disk. Unreadable content falls back to defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<CompanionSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let bytes = fs::read(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_slice(&bytes).unwrap_or_default()
        } else {
            CompanionSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> CompanionSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update(&self, settings: CompanionSettings) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &CompanionSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// Where the companion keeps its files: `COMPANION_DATA_DIR`, else the
/// platform data directory, else the working directory.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("COMPANION_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .map(|dir| dir.join("companion"))
        .unwrap_or_else(|| PathBuf::from(".companion"))
}
