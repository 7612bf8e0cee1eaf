use anyhow::{bail, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    session::question::OPTION_LABELS,
    storage::{Storage, StorageKey},
    utils::lenient,
};

use super::paper::{iso_timestamp, PaperHistoryEntry};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectAnswerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    /// 1-based position in the paper.
    #[serde(default, deserialize_with = "lenient::u32_from_any")]
    pub q_index: u32,
    #[serde(default)]
    pub your_answer: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default, deserialize_with = "lenient::u64_from_any")]
    pub time_taken: u64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub exam: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub chapter: String,
    #[serde(default, deserialize_with = "lenient::u32_from_any")]
    pub chapter_number: u32,
}

impl CorrectAnswerRecord {
    pub fn correct(&self) -> &str {
        self.correct_answer.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeySource {
    /// Records tagged with the paper's session id.
    Session,
    /// The newest untagged records, assumed to belong to this paper.
    Legacy,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredKey {
    pub corrects: Vec<String>,
    pub source: KeySource,
}

/// Finds the answer key for `paper` among stored records.
///
/// Records carrying the paper's session id win; when a key was entered more
/// than once the latest `n` of them count. Otherwise the newest `n` untagged
/// records are taken, which is only right when nothing else was recorded
/// after this paper; with fewer than `n` available the key is left blank.
pub fn recover_key(paper: &PaperHistoryEntry, records: &[CorrectAnswerRecord]) -> RecoveredKey {
    let total = paper.question_count();

    let tagged: Vec<&CorrectAnswerRecord> = records
        .iter()
        .filter(|record| record.session_id.as_deref() == Some(paper.id.as_str()))
        .collect();
    if total > 0 && tagged.len() >= total {
        let mut tagged = tagged[tagged.len() - total..].to_vec();
        tagged.sort_by_key(|record| record.q_index);
        return RecoveredKey {
            corrects: tagged.iter().map(|record| record.correct().to_string()).collect(),
            source: KeySource::Session,
        };
    }

    let untagged: Vec<&CorrectAnswerRecord> = records
        .iter()
        .filter(|record| record.session_id.is_none())
        .collect();
    if total > 0 && untagged.len() >= total {
        let recent = &untagged[untagged.len() - total..];
        return RecoveredKey {
            corrects: recent.iter().map(|record| record.correct().to_string()).collect(),
            source: KeySource::Legacy,
        };
    }

    RecoveredKey {
        corrects: vec![String::new(); total],
        source: KeySource::None,
    }
}

pub async fn load_records(storage: &Storage) -> Result<Vec<CorrectAnswerRecord>> {
    storage.read_json(StorageKey::CorrectAnswers).await
}

pub async fn recover_key_for(storage: &Storage, paper: &PaperHistoryEntry) -> Result<RecoveredKey> {
    let records = load_records(storage).await?;
    let recovered = recover_key(paper, &records);
    if recovered.source == KeySource::Legacy {
        log_warn!("paper {} matched by recency; its key may belong to another paper", paper.id);
    }
    Ok(recovered)
}

/// Stores one record per question of `paper` with the entered key,
/// replacing any key entered for the same paper before.
pub async fn record_correct_answers(
    storage: &Storage,
    paper: &PaperHistoryEntry,
    corrects: &[String],
) -> Result<Vec<CorrectAnswerRecord>> {
    if corrects.len() != paper.question_count() {
        bail!(
            "Expected {} correct answers, got {}",
            paper.question_count(),
            corrects.len()
        );
    }
    if let Some(bad) = corrects
        .iter()
        .find(|answer| !answer.is_empty() && !OPTION_LABELS.contains(&answer.as_str()))
    {
        bail!("Unknown option {bad}");
    }

    let date = iso_timestamp(Utc::now());
    let records: Vec<CorrectAnswerRecord> = corrects
        .iter()
        .enumerate()
        .map(|(index, correct)| CorrectAnswerRecord {
            session_id: Some(paper.id.clone()),
            question_id: paper.question_ids.get(index).cloned(),
            q_index: index as u32 + 1,
            your_answer: Some(paper.answers.get(index).cloned().unwrap_or_default()),
            correct_answer: Some(correct.clone()),
            time_taken: paper.timestamps.get(index).copied().unwrap_or(0),
            date: date.clone(),
            exam: paper.exam.clone(),
            subject: paper.subject.clone(),
            chapter: paper.chapter.clone(),
            chapter_number: paper.chapter_number,
        })
        .collect();

    let mut stored = load_records(storage).await?;
    stored.retain(|record| record.session_id.as_deref() != Some(paper.id.as_str()));
    stored.extend(records.iter().cloned());
    storage
        .write_json(StorageKey::CorrectAnswers, &stored)
        .await?;
    Ok(records)
}
