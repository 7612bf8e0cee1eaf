use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    storage::{backup, BackupInfo, RestoreOutcome},
    AppState,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedBackup {
    pub path: PathBuf,
    pub info: BackupInfo,
}

fn backup_dir(state: &AppState) -> PathBuf {
    state.data_dir.join("backups")
}

/// Writes every tracked key to a new backup file under the data directory.
pub async fn export_backup(state: &AppState) -> Result<ExportedBackup, String> {
    // Productivity writes may still be waiting out the debounce.
    state.productivity.flush().await;
    let doc = backup::export_backup(&state.storage, &state.settings.get().app_version)
        .await
        .map_err(|e| e.to_string())?;
    let path = backup::write_backup_file(&doc, &backup_dir(state)).map_err(|e| e.to_string())?;
    Ok(ExportedBackup {
        info: BackupInfo::from(&doc),
        path,
    })
}

pub async fn preview_backup(path: String) -> Result<BackupInfo, String> {
    let doc = backup::read_backup_file(Path::new(&path)).map_err(|e| e.to_string())?;
    Ok(BackupInfo::from(&doc))
}

/// Overwrites stored data with the backup at `path`. Without `confirmed`
/// nothing is touched.
pub async fn restore_backup(state: &AppState, path: String, confirmed: bool) -> Result<RestoreOutcome, String> {
    let doc = backup::read_backup_file(Path::new(&path)).map_err(|e| e.to_string())?;
    if !confirmed {
        return Ok(RestoreOutcome::Cancelled);
    }

    state.productivity.suspend().await;
    let outcome = backup::restore_backup(&state.storage, &doc, true).await;
    // Reload either way: a failed restore left the old data in place.
    if let Err(err) = state.productivity.reload().await {
        log_warn!("failed to reload productivity state: {err:?}");
    }
    outcome.map_err(|e| e.to_string())
}

/// Wipes every tracked key, ending any running test or focus session.
pub async fn reset_all_data(state: &AppState) -> Result<usize, String> {
    if state.session.snapshot().await.is_some() {
        state.session.cancel().await.map_err(|e| e.to_string())?;
    }
    state.productivity.suspend().await;

    let removed = state.storage.reset_all().await;
    if let Err(err) = state.productivity.reload().await {
        log_warn!("failed to reload productivity state: {err:?}");
    }

    let removed = removed.map_err(|e| e.to_string())?;
    log_info!("reset removed {removed} stored keys");
    Ok(removed)
}

pub async fn get_selected_exam(state: &AppState) -> Result<String, String> {
    state.storage.selected_exam().await.map_err(|e| e.to_string())
}

pub async fn select_exam(state: &AppState, exam: String) -> Result<(), String> {
    let exam = exam.trim();
    if exam.is_empty() {
        return Err("Exam name cannot be empty".to_string());
    }
    state
        .storage
        .set_selected_exam(exam)
        .await
        .map_err(|e| e.to_string())
}
