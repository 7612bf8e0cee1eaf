pub mod answers;
pub mod commands;
pub mod paper;

use anyhow::Result;
use serde::Serialize;

use crate::{
    scoring::{self, MarkingScheme, ScorePolicy, ScoreReport},
    storage::Storage,
};

pub use answers::{CorrectAnswerRecord, KeySource, RecoveredKey};
pub use paper::{get_paper, list_history, load_history, PaperHistoryEntry};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperReview {
    pub paper: PaperHistoryEntry,
    pub corrects: Vec<String>,
    pub key_source: KeySource,
    pub report: ScoreReport,
}

pub fn grade(paper: &PaperHistoryEntry, corrects: &[String], policy: ScorePolicy) -> ScoreReport {
    scoring::score(
        &paper.answers,
        corrects,
        &paper.timestamps,
        MarkingScheme::for_exam(&paper.exam),
        policy,
    )
}

pub async fn review_paper(storage: &Storage, id: &str, policy: ScorePolicy) -> Result<PaperReview> {
    let paper = get_paper(storage, id).await?;
    let recovered = answers::recover_key_for(storage, &paper).await?;
    let report = grade(&paper, &recovered.corrects, policy);

    Ok(PaperReview {
        paper,
        corrects: recovered.corrects,
        key_source: recovered.source,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn review_grades_against_recorded_key() {
        let storage = Storage::new(Database::in_memory().unwrap());
        let paper = PaperHistoryEntry {
            id: "s-9".into(),
            question_ids: vec!["2.1".into(), "2.2".into(), "2.3".into(), "2.4".into()],
            answers: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            timestamps: vec![10, 10, 10, 10],
            total_time: 0,
            exam: "NEET".into(),
            subject: "Chemistry".into(),
            chapter: "Bonding".into(),
            chapter_number: 2,
            first_q: 1,
            last_q: 4,
            per_question_secs: 144,
            date: "2025-02-01T00:00:00.000Z".into(),
        };
        paper::append_paper(&storage, paper.clone()).await.unwrap();
        let key: Vec<String> = ["A", "B", "C", "A"].iter().map(|s| s.to_string()).collect();
        answers::record_correct_answers(&storage, &paper, &key).await.unwrap();

        let review = review_paper(&storage, "s-9", ScorePolicy::Raw).await.unwrap();
        assert_eq!(review.key_source, KeySource::Session);
        assert_eq!(review.report.score, 11.0);
        assert_eq!(review.report.accuracy, 75);
    }
}
