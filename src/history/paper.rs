use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    session::SessionState,
    storage::{Storage, StorageKey},
    utils::lenient,
};

/// A submitted paper. Entries are appended once and never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperHistoryEntry {
    /// Session id; entries written before ids existed get a positional id
    /// when loaded.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub question_ids: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings_from_any")]
    pub answers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::u64_list_from_any")]
    pub timestamps: Vec<u64>,
    /// Budget left on the clock at submit.
    #[serde(default, deserialize_with = "lenient::u64_from_any")]
    pub total_time: u64,
    #[serde(default)]
    pub exam: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub chapter: String,
    #[serde(default, deserialize_with = "lenient::u32_from_any")]
    pub chapter_number: u32,
    #[serde(default, deserialize_with = "lenient::u32_from_any")]
    pub first_q: u32,
    #[serde(default, deserialize_with = "lenient::u32_from_any")]
    pub last_q: u32,
    #[serde(default, deserialize_with = "lenient::u64_from_any")]
    pub per_question_secs: u64,
    #[serde(default)]
    pub date: String,
}

impl PaperHistoryEntry {
    pub fn from_session(state: &SessionState, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: state.id.clone(),
            question_ids: state.question_ids(),
            answers: state.answers(),
            timestamps: state.timestamps(),
            total_time: state.remaining_secs,
            exam: state.setup.exam.clone(),
            subject: state.setup.subject.clone(),
            chapter: state.setup.chapter.clone(),
            chapter_number: state.setup.chapter_number,
            first_q: state.setup.first_q,
            last_q: state.setup.last_q,
            per_question_secs: state.setup.per_question_secs,
            date: iso_timestamp(submitted_at),
        }
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.date)
            .ok()
            .map(|date| date.with_timezone(&Utc))
    }

    pub fn question_count(&self) -> usize {
        self.answers.len()
    }
}

/// Millisecond ISO-8601 in UTC, the format every stored date uses.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// History in storage order (oldest first), with positional ids filled in.
pub async fn load_history(storage: &Storage) -> Result<Vec<PaperHistoryEntry>> {
    let mut papers: Vec<PaperHistoryEntry> = storage.read_json(StorageKey::PaperHistory).await?;
    for (index, paper) in papers.iter_mut().enumerate() {
        if paper.id.is_empty() {
            paper.id = format!("paper-{}", index + 1);
        }
    }
    Ok(papers)
}

pub async fn append_paper(storage: &Storage, paper: PaperHistoryEntry) -> Result<usize> {
    storage.append(StorageKey::PaperHistory, vec![paper]).await
}

pub async fn list_history(storage: &Storage) -> Result<Vec<PaperHistoryEntry>> {
    let mut papers = load_history(storage).await?;
    papers.reverse();
    Ok(papers)
}

pub async fn get_paper(storage: &Storage, id: &str) -> Result<PaperHistoryEntry> {
    load_history(storage)
        .await?
        .into_iter()
        .find(|paper| paper.id == id)
        .ok_or_else(|| anyhow!("No paper found with id {id}"))
}
