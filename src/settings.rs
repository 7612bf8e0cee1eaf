use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::scoring::ScorePolicy;

pub const DEFAULT_HEARTBEAT_EVERY_SECS: u64 = 30;
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_PER_QUESTION_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// How a negative net score is displayed.
    pub score_policy: ScorePolicy,
    pub heartbeat_every_secs: u64,
    pub autosave_debounce_ms: u64,
    /// Allotment for exams missing from the timing table.
    pub default_per_question_secs: u64,
    pub app_version: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            score_policy: ScorePolicy::default(),
            heartbeat_every_secs: DEFAULT_HEARTBEAT_EVERY_SECS,
            autosave_debounce_ms: DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            default_per_question_secs: DEFAULT_PER_QUESTION_SECS,
            app_version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// Settings that live only in memory; updates are never written out.
    pub fn ephemeral(settings: AppSettings) -> Self {
        Self {
            path: None,
            data: RwLock::new(settings),
        }
    }

    pub fn get(&self) -> AppSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: AppSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fill_in_defaults() {
        let parsed: AppSettings = serde_json::from_str(r#"{"scorePolicy":"clampToZero"}"#).unwrap();
        assert_eq!(parsed.score_policy, ScorePolicy::ClampToZero);
        assert_eq!(parsed.heartbeat_every_secs, DEFAULT_HEARTBEAT_EVERY_SECS);
        assert_eq!(parsed.autosave_debounce_ms, DEFAULT_AUTOSAVE_DEBOUNCE_MS);
    }

    #[test]
    fn settings_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("testarena-settings-{}.json", uuid::Uuid::new_v4()));
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.get(), AppSettings::default());

        let mut updated = store.get();
        updated.score_policy = ScorePolicy::ClampToZero;
        store.update(updated.clone()).unwrap();

        let reloaded = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(reloaded.get(), updated);
        let _ = fs::remove_file(path);
    }
}
