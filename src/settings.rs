use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::poller::{ReleaseConfig, TrackerConfig};

pub const CONFIG_ENV: &str = "ISSWATCH_CONFIG";
pub const DEBUG_ENV: &str = "ISSWATCH_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub position_feed_url: String,
    pub position_interval_secs: u64,
    pub position_timeout_secs: u64,
    pub history_capacity: usize,
    pub release_repo_owner: String,
    pub release_repo_name: String,
    pub release_timeout_secs: u64,
    pub check_updates_on_startup: bool,
    pub track_position_on_startup: bool,
    pub max_recovery_attempts: u32,
    pub frame_interval_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            position_feed_url: "https://api.wheretheiss.at/v1/satellites/25544".into(),
            position_interval_secs: 5,
            position_timeout_secs: 30,
            history_capacity: 100,
            release_repo_owner: "andynicholson".into(),
            release_repo_name: "MetaImGUI".into(),
            release_timeout_secs: 10,
            check_updates_on_startup: true,
            track_position_on_startup: true,
            max_recovery_attempts: crate::render::MAX_RECOVERY_ATTEMPTS,
            frame_interval_ms: 16,
        }
    }
}

impl AppSettings {
    pub fn position_interval(&self) -> Duration {
        Duration::from_secs(self.position_interval_secs)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            url: self.position_feed_url.clone(),
            timeout: Duration::from_secs(self.position_timeout_secs),
            history_capacity: self.history_capacity,
        }
    }

    pub fn release_config(&self) -> ReleaseConfig {
        ReleaseConfig::github(
            &self.release_repo_owner,
            &self.release_repo_name,
            Duration::from_secs(self.release_timeout_secs),
        )
    }
}

/// Settings file location: `$ISSWATCH_CONFIG`, else the platform config dir.
pub fn default_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("isswatch").join("settings.json"))
}

pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings in {}: {}",
                    path.display(),
                    err
                );
                AppSettings::default()
            })
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> AppSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: AppSettings) -> Result<()> {
        {
            let mut guard = self.write();
            *guard = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: AppSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, AppSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
