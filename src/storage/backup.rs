use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::KvWrite;

use super::{gateway::Storage, keys::StorageKey};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const BACKUP_VERSION: u64 = 1;

fn default_version() -> u64 {
    BACKUP_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    pub payload: Map<String, Value>,
}

/// Summary shown to the user before they confirm a restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub version: u64,
    pub exported_at: Option<String>,
    pub app_version: Option<String>,
    pub restorable_keys: usize,
}

impl From<&BackupDocument> for BackupInfo {
    fn from(doc: &BackupDocument) -> Self {
        Self {
            version: doc.version,
            exported_at: doc.exported_at.clone(),
            app_version: doc.app_version.clone(),
            restorable_keys: restorable_writes(doc).len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RestoreOutcome {
    Cancelled,
    Restored { keys: Vec<String> },
}

/// Collects every tracked key. A stored value goes into the payload as
/// parsed JSON only when serialising it again yields the stored bytes and it
/// is not itself a JSON string; anything else is carried as the raw string.
/// That keeps export followed by restore byte-for-byte lossless.
pub async fn export_backup(storage: &Storage, app_version: &str) -> Result<BackupDocument> {
    let keys = StorageKey::ALL
        .iter()
        .map(|key| key.as_str().to_string())
        .collect();
    let values = storage.database().get_many_raw(keys).await?;

    let mut payload = Map::new();
    for (key, raw) in values {
        payload.insert(key, export_value(raw));
    }

    Ok(BackupDocument {
        version: BACKUP_VERSION,
        exported_at: Some(Utc::now().to_rfc3339()),
        app_version: Some(app_version.to_string()),
        payload,
    })
}

fn export_value(raw: Option<String>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::String(_)) | Err(_) => Value::String(raw),
        Ok(parsed) => match serde_json::to_string(&parsed) {
            Ok(canonical) if canonical == raw => parsed,
            _ => Value::String(raw),
        },
    }
}

fn restore_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(raw) => Some(raw.clone()),
        other => Some(other.to_string()),
    }
}

fn restorable_writes(doc: &BackupDocument) -> Vec<KvWrite> {
    StorageKey::ALL
        .iter()
        .filter_map(|key| {
            let value = doc.payload.get(key.as_str())?;
            restore_value(value).map(|raw| KvWrite::set(key.as_str(), raw))
        })
        .collect()
}

pub fn backup_file_name() -> String {
    format!(
        "test_arena_backup_{}.json",
        Utc::now().format("%Y-%m-%dT%H-%M-%S")
    )
}

pub fn write_backup_file(doc: &BackupDocument, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create backup directory {}", dir.display()))?;

    let path = dir.join(backup_file_name());
    let serialized = serde_json::to_string_pretty(doc)?;
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write backup to {}", path.display()))?;

    log_info!("Backup written to {}", path.display());
    Ok(path)
}

/// Validates structure and version without touching stored data.
pub fn parse_backup(contents: &str) -> Result<BackupDocument> {
    let value: Value = serde_json::from_str(contents)
        .map_err(|_| anyhow!("Invalid backup file format. File may be corrupted."))?;

    if !value.get("payload").is_some_and(Value::is_object) {
        bail!("Invalid backup file structure");
    }

    let doc: BackupDocument =
        serde_json::from_value(value).map_err(|err| anyhow!("Invalid backup file structure: {err}"))?;

    if doc.version > BACKUP_VERSION {
        bail!(
            "Version Mismatch: this backup was created with a newer version of the app (backup version {}). Please update the app to restore this backup.",
            doc.version
        );
    }

    Ok(doc)
}

pub fn read_backup_file(path: &Path) -> Result<BackupDocument> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown");
    if !file_name.to_lowercase().contains("backup") && !file_name.ends_with(".json") {
        bail!("Invalid File: please select a valid Test Arena backup file (.json)");
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read backup from {}", path.display()))?;
    parse_backup(&contents)
}

/// Overwrites every tracked key present (and non-null) in the backup. All
/// writes go through one transaction, so a failure leaves the pre-restore
/// data in place.
pub async fn restore_backup(
    storage: &Storage,
    doc: &BackupDocument,
    confirmed: bool,
) -> Result<RestoreOutcome> {
    if !confirmed {
        return Ok(RestoreOutcome::Cancelled);
    }

    for key in doc.payload.keys() {
        if StorageKey::parse(key).is_none() {
            log_warn!("Ignoring unknown backup key {key}");
        }
    }

    let writes = restorable_writes(doc);
    let keys: Vec<String> = writes.iter().map(|write| write.key.clone()).collect();

    match storage.apply(writes).await {
        Ok(count) => {
            log_info!("Restored {count} data items from backup");
            Ok(RestoreOutcome::Restored { keys })
        }
        Err(err) => {
            log_warn!("Restore failed, original data preserved: {err:?}");
            Err(err.context("Restore failed. Original data has been preserved."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn export_keeps_non_canonical_values_raw() {
        assert_eq!(export_value(None), Value::Null);
        assert_eq!(export_value(Some("[1,2]".into())), serde_json::json!([1, 2]));
        assert_eq!(
            export_value(Some("[1, 2]".into())),
            Value::String("[1, 2]".into())
        );
        assert_eq!(
            export_value(Some("\"NEET\"".into())),
            Value::String("\"NEET\"".into())
        );
        assert_eq!(export_value(Some("NEET".into())), Value::String("NEET".into()));
    }

    #[test]
    fn newer_versions_are_rejected() {
        let err = parse_backup(r#"{"version":2,"payload":{}}"#).unwrap_err();
        assert!(err.to_string().contains("Version Mismatch"));
    }

    #[test]
    fn payload_must_be_an_object() {
        assert!(parse_backup(r#"{"version":1,"payload":[]}"#).is_err());
        assert!(parse_backup(r#"{"version":1}"#).is_err());
        assert!(parse_backup("{not json").is_err());

        let doc = parse_backup(r#"{"payload":{"xp":"10"}}"#).unwrap();
        assert_eq!(doc.version, BACKUP_VERSION);
        assert_eq!(BackupInfo::from(&doc).restorable_keys, 1);
    }

    #[tokio::test]
    async fn unconfirmed_restore_changes_nothing() {
        let storage = Storage::new(Database::in_memory().unwrap());
        storage.write_text(StorageKey::Xp, "5").await.unwrap();

        let doc = parse_backup(r#"{"version":1,"payload":{"xp":"900"}}"#).unwrap();
        let outcome = restore_backup(&storage, &doc, false).await.unwrap();

        assert_eq!(outcome, RestoreOutcome::Cancelled);
        assert_eq!(
            storage.read_text(StorageKey::Xp).await.unwrap().as_deref(),
            Some("5")
        );
    }

    #[tokio::test]
    async fn failed_restore_rolls_back_every_key() {
        let storage = Storage::new(Database::in_memory().unwrap());
        storage.set_selected_exam("NEET").await.unwrap();
        storage.write_text(StorageKey::Xp, "5").await.unwrap();
        storage
            .database()
            .execute(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER refuse_xp BEFORE INSERT ON kv WHEN NEW.key = 'xp'
                     BEGIN SELECT RAISE(ABORT, 'boom'); END;",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let doc = parse_backup(r#"{"version":1,"payload":{"@selectedExam1":"IIT JEE","xp":"900"}}"#).unwrap();
        let err = restore_backup(&storage, &doc, true).await.unwrap_err();

        assert!(err.to_string().contains("Original data has been preserved"));
        assert_eq!(storage.selected_exam().await.unwrap(), "NEET");
        assert_eq!(
            storage.read_text(StorageKey::Xp).await.unwrap().as_deref(),
            Some("5")
        );
    }
}
