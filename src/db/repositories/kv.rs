use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::connection::Database;

/// One entry of a batched write. `value: None` deletes the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvWrite {
    pub key: String,
    pub value: Option<String>,
}

impl KvWrite {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

fn apply_write(conn: &rusqlite::Connection, write: &KvWrite) -> Result<()> {
    match &write.value {
        Some(value) => {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![write.key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write key {}", write.key))?;
        }
        None => {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![write.key])
                .with_context(|| format!("failed to remove key {}", write.key))?;
        }
    }
    Ok(())
}

impl Database {
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            Ok(value)
        })
        .await
    }

    pub async fn get_many_raw(&self, keys: Vec<String>) -> Result<Vec<(String, Option<String>)>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
            let mut values = Vec::with_capacity(keys.len());
            for key in keys {
                let value = stmt
                    .query_row(params![key], |row| row.get::<_, String>(0))
                    .optional()?;
                values.push((key, value));
            }
            Ok(values)
        })
        .await
    }

    pub async fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let write = KvWrite::set(key, value);
        self.execute(move |conn| apply_write(conn, &write)).await
    }

    pub async fn remove_key(&self, key: &str) -> Result<()> {
        let write = KvWrite::remove(key);
        self.execute(move |conn| apply_write(conn, &write)).await
    }

    /// Applies every write or none of them.
    pub async fn apply_writes(&self, writes: Vec<KvWrite>) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for write in &writes {
                apply_write(&tx, write)?;
            }
            tx.commit().context("failed to commit batched writes")?;
            Ok(writes.len())
        })
        .await
    }
}
