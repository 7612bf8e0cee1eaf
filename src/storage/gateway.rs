use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

use crate::db::{Database, KvWrite};

use super::keys::StorageKey;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const DEFAULT_EXAM: &str = "NEET";

/// Typed access to the key-value store. Every write replaces the whole value
/// under its key; reads of absent or unparsable values fall back to the
/// type's default.
#[derive(Clone)]
pub struct Storage {
    db: Database,
}

impl Storage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn read_text(&self, key: StorageKey) -> Result<Option<String>> {
        self.db.get_raw(key.as_str()).await
    }

    pub async fn write_text(&self, key: StorageKey, value: impl Into<String>) -> Result<()> {
        self.db.set_raw(key.as_str(), value.into()).await
    }

    pub async fn read_json<T>(&self, key: StorageKey) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let raw = self.read_text(key).await?;
        Ok(decode_or_default(key, raw.as_deref()))
    }

    pub async fn write_json<T>(&self, key: StorageKey, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_string(value)?;
        self.write_text(key, encoded).await
    }

    /// Read-modify-write of a list value. The list is rewritten whole.
    pub async fn append<T>(&self, key: StorageKey, items: Vec<T>) -> Result<usize>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut list: Vec<T> = self.read_json(key).await?;
        list.extend(items);
        self.write_json(key, &list).await?;
        Ok(list.len())
    }

    pub async fn remove(&self, key: StorageKey) -> Result<()> {
        self.db.remove_key(key.as_str()).await
    }

    pub async fn apply(&self, writes: Vec<KvWrite>) -> Result<usize> {
        self.db.apply_writes(writes).await
    }

    /// Full data reset: drops every tracked key.
    pub async fn reset_all(&self) -> Result<usize> {
        let writes = StorageKey::ALL
            .iter()
            .map(|key| KvWrite::remove(key.as_str()))
            .collect();
        self.apply(writes).await
    }

    pub async fn selected_exam(&self) -> Result<String> {
        let exam = self
            .read_text(StorageKey::SelectedExam)
            .await?
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXAM.to_string());
        Ok(exam)
    }

    pub async fn set_selected_exam(&self, exam: &str) -> Result<()> {
        self.write_text(StorageKey::SelectedExam, exam.trim()).await
    }
}

pub fn decode_or_default<T>(key: StorageKey, raw: Option<&str>) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = raw else {
        return T::default();
    };

    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            log_warn!("Failed to parse stored {}: {err}; using default", key.as_str());
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_values_fall_back_to_default() {
        let list: Vec<u32> = decode_or_default(StorageKey::XpHistory, Some("not json"));
        assert!(list.is_empty());

        let xp: u64 = decode_or_default(StorageKey::Xp, Some("120"));
        assert_eq!(xp, 120);

        let missing: u64 = decode_or_default(StorageKey::Level, None);
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn append_rewrites_the_whole_list() {
        let storage = Storage::new(Database::in_memory().unwrap());
        storage
            .append(StorageKey::XpHistory, vec![1u32, 2])
            .await
            .unwrap();
        let len = storage.append(StorageKey::XpHistory, vec![3u32]).await.unwrap();
        assert_eq!(len, 3);

        let raw = storage.read_text(StorageKey::XpHistory).await.unwrap();
        assert_eq!(raw.as_deref(), Some("[1,2,3]"));
    }

    #[tokio::test]
    async fn selected_exam_defaults_to_neet() {
        let storage = Storage::new(Database::in_memory().unwrap());
        assert_eq!(storage.selected_exam().await.unwrap(), "NEET");

        storage.set_selected_exam("SSC CGL").await.unwrap();
        assert_eq!(storage.selected_exam().await.unwrap(), "SSC CGL");
    }

    #[tokio::test]
    async fn reset_all_clears_tracked_keys() {
        let storage = Storage::new(Database::in_memory().unwrap());
        storage.write_text(StorageKey::Xp, "40").await.unwrap();
        storage
            .write_json(StorageKey::Bookmarks, &Vec::<u8>::new())
            .await
            .unwrap();

        storage.reset_all().await.unwrap();
        assert_eq!(storage.read_text(StorageKey::Xp).await.unwrap(), None);
        assert_eq!(storage.read_text(StorageKey::Bookmarks).await.unwrap(), None);
    }
}
