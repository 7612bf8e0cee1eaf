use anyhow::{bail, Result};
use serde::Serialize;

use crate::{
    history::PaperHistoryEntry,
    scoring::{score, MarkingScheme, Outcome, ScorePolicy, ScoreReport},
    session::{Question, TestSetup},
};

use super::store::Bookmark;

const PRACTICE_SUBJECT: &str = "Bookmarks";

/// One numbered question per bookmark; the question id is the bookmark id
/// so answers can be matched back after the run.
pub fn practice_questions(bookmarks: &[Bookmark]) -> Vec<Question> {
    bookmarks
        .iter()
        .enumerate()
        .map(|(position, bookmark)| {
            let text = if bookmark.question_text.is_empty() {
                format!("Q{} of {}", bookmark.question_index + 1, bookmark.chapter)
            } else {
                bookmark.question_text.clone()
            };
            Question::new(bookmark.id.clone(), position as u32 + 1, text)
        })
        .collect()
}

pub fn practice_setup(bookmarks: &[Bookmark], per_question_secs: u64) -> Result<TestSetup> {
    let Some(first) = bookmarks.first() else {
        bail!("Select at least one bookmark to reattempt");
    };
    let count = bookmarks.len() as u32;
    Ok(TestSetup {
        exam: first.exam.clone(),
        subject: PRACTICE_SUBJECT.to_string(),
        chapter: first.chapter.clone(),
        chapter_number: first.chapter_number.max(1),
        first_q: 1,
        last_q: count,
        per_question_secs,
        total_secs: 0,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeItem {
    pub bookmark_id: String,
    pub your_answer: String,
    pub correct_answer: String,
    pub time_secs: u64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeResult {
    pub items: Vec<PracticeItem>,
    pub report: ScoreReport,
}

/// Grades a finished practice run against the keys stored on the
/// bookmarks it was built from.
pub fn grade_practice(run: &PaperHistoryEntry, bookmarks: &[Bookmark], policy: ScorePolicy) -> PracticeResult {
    let corrects: Vec<String> = run
        .question_ids
        .iter()
        .map(|id| {
            bookmarks
                .iter()
                .find(|bookmark| bookmark.id == *id)
                .map(|bookmark| bookmark.correct_answer.clone())
                .unwrap_or_default()
        })
        .collect();

    let items = run
        .question_ids
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let your_answer = run.answers.get(index).cloned().unwrap_or_default();
            let correct_answer = corrects.get(index).cloned().unwrap_or_default();
            PracticeItem {
                bookmark_id: id.clone(),
                outcome: crate::scoring::classify(&your_answer, &correct_answer),
                your_answer,
                correct_answer,
                time_secs: run.timestamps.get(index).copied().unwrap_or(0),
            }
        })
        .collect();

    let report = score(
        &run.answers,
        &corrects,
        &run.timestamps,
        MarkingScheme::for_exam(&run.exam),
        policy,
    );

    PracticeResult { items, report }
}
