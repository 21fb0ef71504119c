use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::audio::AlarmSound;

const HOME_ENV: &str = "DROWSY_MONITOR_HOME";
const API_ENV: &str = "DROWSY_MONITOR_API";
pub const DEBUG_ENV: &str = "DROWSY_MONITOR_DEBUG";

/// What to do with stream payloads that do not match the inbound schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPayloadPolicy {
    /// Drop silently.
    Ignore,
    /// Drop with a warning in the log.
    #[default]
    Log,
    /// Drop and surface a payload notice to the operator.
    Report,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorSettings {
    pub api_base_url: String,
    /// Overrides the WebSocket base derived from `api_base_url`.
    pub ws_base_url: Option<String>,
    pub access_token: Option<String>,
    pub alarm_sound: Option<PathBuf>,
    pub alarm_volume: f32,
    pub malformed_payloads: MalformedPayloadPolicy,
    /// When set, the latest frame is written to this PNG file.
    pub frame_output: Option<PathBuf>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".into(),
            ws_base_url: None,
            access_token: None,
            alarm_sound: None,
            alarm_volume: 1.0,
            malformed_payloads: MalformedPayloadPolicy::default(),
            frame_output: None,
        }
    }
}

impl MonitorSettings {
    pub fn alarm_sound(&self) -> AlarmSound {
        match &self.alarm_sound {
            Some(path) => AlarmSound::File(path.clone()),
            None => AlarmSound::Tone,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MonitorSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "settings file {} is invalid ({err}); using defaults",
                    path.display()
                );
                MonitorSettings::default()
            })
        } else {
            MonitorSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// `$DROWSY_MONITOR_HOME/settings.json`, else `~/.drowsiness-monitor/settings.json`.
    pub fn default_path() -> PathBuf {
        let base = env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".drowsiness-monitor")))
            .unwrap_or_else(|| PathBuf::from(".drowsiness-monitor"));
        base.join("settings.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored settings with environment overrides applied.
    pub fn effective(&self) -> MonitorSettings {
        let mut settings = self.read().clone();
        if let Ok(api) = env::var(API_ENV) {
            if !api.trim().is_empty() {
                settings.api_base_url = api;
            }
        }
        settings
    }

    pub fn set_access_token(&self, token: Option<String>) -> Result<()> {
        self.update(|settings| settings.access_token = token)
    }

    pub fn update(&self, apply: impl FnOnce(&mut MonitorSettings)) -> Result<()> {
        let mut guard = self.write();
        apply(&mut *guard);
        self.persist(&*guard)
    }

    fn persist(&self, data: &MonitorSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, MonitorSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, MonitorSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
