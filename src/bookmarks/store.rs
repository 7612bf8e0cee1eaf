use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    history::{answers, paper::iso_timestamp, PaperHistoryEntry},
    scoring::{classify, Outcome},
    storage::{Storage, StorageKey},
    utils::lenient,
};

const UNKNOWN_SUBJECT: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    /// 0-based position in the paper.
    #[serde(default, deserialize_with = "lenient::u32_from_any")]
    pub question_index: u32,
    #[serde(default)]
    pub exam: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub chapter: String,
    #[serde(default, deserialize_with = "lenient::u32_from_any")]
    pub chapter_number: u32,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub your_answer: String,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default, deserialize_with = "lenient::u64_from_any")]
    pub time_taken: u64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub question_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_image: Option<String>,
    /// Fields this version does not model are carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bookmark {
    pub fn outcome(&self) -> Outcome {
        classify(&self.your_answer, &self.correct_answer)
    }

    /// Trimmed, lowercased subject used for grouping.
    pub fn subject_key(&self) -> String {
        let subject = self.subject.trim().to_lowercase();
        if subject.is_empty() {
            UNKNOWN_SUBJECT.to_string()
        } else {
            subject
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookmarkFilter {
    #[default]
    All,
    Correct,
    Wrong,
}

impl BookmarkFilter {
    fn admits(self, bookmark: &Bookmark) -> bool {
        match self {
            BookmarkFilter::All => true,
            BookmarkFilter::Correct => bookmark.outcome() == Outcome::Correct,
            BookmarkFilter::Wrong => bookmark.outcome() == Outcome::Wrong,
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Bookmarks in storage order with positional ids filled in for entries
/// written before ids existed.
pub async fn load_bookmarks(storage: &Storage) -> Result<Vec<Bookmark>> {
    let mut bookmarks: Vec<Bookmark> = storage.read_json(StorageKey::Bookmarks).await?;
    for (index, bookmark) in bookmarks.iter_mut().enumerate() {
        if bookmark.id.is_empty() {
            bookmark.id = format!("bookmark-{}", index + 1);
        }
    }
    Ok(bookmarks)
}

async fn save_bookmarks(storage: &Storage, bookmarks: &[Bookmark]) -> Result<()> {
    storage.write_json(StorageKey::Bookmarks, bookmarks).await
}

/// Newest first, narrowed by outcome and subject (`None` or `"All"` keeps
/// every subject; matching ignores case and surrounding spaces).
pub fn filter_bookmarks(bookmarks: &[Bookmark], filter: BookmarkFilter, subject: Option<&str>) -> Vec<Bookmark> {
    let subject = subject
        .map(|subject| subject.trim().to_lowercase())
        .filter(|subject| subject != "all");

    bookmarks
        .iter()
        .rev()
        .filter(|bookmark| filter.admits(bookmark))
        .filter(|bookmark| match &subject {
            Some(subject) => bookmark.subject_key() == *subject,
            None => true,
        })
        .cloned()
        .collect()
}

/// `"All"` followed by each distinct subject, capitalised, newest first.
pub fn bookmark_subjects(bookmarks: &[Bookmark]) -> Vec<String> {
    let mut subjects = vec!["All".to_string()];
    for bookmark in bookmarks.iter().rev() {
        let subject = capitalize(&bookmark.subject_key());
        if !subjects.contains(&subject) {
            subjects.push(subject);
        }
    }
    subjects
}

pub async fn list_bookmarks(
    storage: &Storage,
    filter: BookmarkFilter,
    subject: Option<&str>,
) -> Result<Vec<Bookmark>> {
    let bookmarks = load_bookmarks(storage).await?;
    Ok(filter_bookmarks(&bookmarks, filter, subject))
}

/// Bookmarks question `question_index` of `paper`. A question photo is
/// required; the answer key is taken from whatever was recorded for the
/// paper.
pub async fn add_bookmark(
    storage: &Storage,
    paper: &PaperHistoryEntry,
    question_index: u32,
    question_image: &str,
) -> Result<Bookmark> {
    if question_image.trim().is_empty() {
        bail!("Question image is required to bookmark");
    }
    let index = question_index as usize;
    if index >= paper.question_count() {
        bail!("Question {} is not part of this paper", index + 1);
    }

    let mut bookmarks = load_bookmarks(storage).await?;
    if bookmarks
        .iter()
        .any(|bookmark| bookmark.session_id.as_deref() == Some(paper.id.as_str()) && bookmark.question_index == question_index)
    {
        bail!("Q{} is already bookmarked", index + 1);
    }

    let key = answers::recover_key_for(storage, paper).await?;
    let bookmark = Bookmark {
        id: Uuid::new_v4().to_string(),
        session_id: Some(paper.id.clone()),
        question_id: paper.question_ids.get(index).cloned(),
        question_index,
        exam: paper.exam.clone(),
        subject: paper.subject.clone(),
        chapter: paper.chapter.clone(),
        chapter_number: paper.chapter_number,
        question_text: String::new(),
        your_answer: paper.answers.get(index).cloned().unwrap_or_default(),
        correct_answer: key.corrects.get(index).cloned().unwrap_or_default(),
        time_taken: paper.timestamps.get(index).copied().unwrap_or(0),
        date: iso_timestamp(Utc::now()),
        question_image: question_image.to_string(),
        solution_image: None,
        extra: Map::new(),
    };

    bookmarks.push(bookmark.clone());
    save_bookmarks(storage, &bookmarks).await?;
    Ok(bookmark)
}

pub async fn attach_solution(
    storage: &Storage,
    session_id: &str,
    question_index: u32,
    solution_image: &str,
) -> Result<Bookmark> {
    let mut bookmarks = load_bookmarks(storage).await?;
    let bookmark = bookmarks
        .iter_mut()
        .find(|bookmark| bookmark.session_id.as_deref() == Some(session_id) && bookmark.question_index == question_index)
        .ok_or_else(|| anyhow!("Bookmark not found. Upload question first."))?;
    bookmark.solution_image = Some(solution_image.to_string());
    let updated = bookmark.clone();

    save_bookmarks(storage, &bookmarks).await?;
    Ok(updated)
}

pub async fn remove_bookmark(storage: &Storage, id: &str) -> Result<()> {
    let mut bookmarks = load_bookmarks(storage).await?;
    let before = bookmarks.len();
    bookmarks.retain(|bookmark| bookmark.id != id);
    if bookmarks.len() == before {
        bail!("No bookmark with id {id}");
    }
    save_bookmarks(storage, &bookmarks).await
}

/// Looks bookmarks up by id, keeping the order of `ids`.
pub async fn bookmarks_by_ids(storage: &Storage, ids: &[String]) -> Result<Vec<Bookmark>> {
    let bookmarks = load_bookmarks(storage).await?;
    ids.iter()
        .map(|id| {
            bookmarks
                .iter()
                .find(|bookmark| bookmark.id == *id)
                .cloned()
                .ok_or_else(|| anyhow!("No bookmark with id {id}"))
        })
        .collect()
}
