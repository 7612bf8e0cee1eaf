//! Commands for reading and changing `settings.json`.

use crate::{settings::AppSettings, AppState};

pub async fn get_settings(state: &AppState) -> Result<AppSettings, String> {
    Ok(state.settings.get())
}

/// Score policy and the default allotment apply immediately. The heartbeat
/// cadence and auto-save delay are only read at startup.
pub async fn update_settings(state: &AppState, settings: AppSettings) -> Result<AppSettings, String> {
    if settings.heartbeat_every_secs == 0 {
        return Err("Heartbeat interval must be at least one second".to_string());
    }
    if settings.default_per_question_secs == 0 {
        return Err("Default time per question must be at least one second".to_string());
    }
    state
        .settings
        .update(settings.clone())
        .map_err(|e| e.to_string())?;
    Ok(settings)
}
