use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::PaperHistoryEntry;

pub const RECENT_PAPERS: usize = 10;
pub const TOP_CHAPTERS: usize = 5;
const WEEK_BIN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeWindow {
    #[default]
    AllTime,
    Last3Days,
    LastWeek,
    LastMonth,
}

impl TimeWindow {
    pub fn max_age_days(self) -> Option<i64> {
        match self {
            TimeWindow::AllTime => None,
            TimeWindow::Last3Days => Some(3),
            TimeWindow::LastWeek => Some(7),
            TimeWindow::LastMonth => Some(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardFilter {
    /// `None` or `"All"` covers every subject.
    pub subject: Option<String>,
    pub window: TimeWindow,
}

impl DashboardFilter {
    fn admits_subject(&self, subject: &str) -> bool {
        match self.subject.as_deref() {
            None | Some("All") => true,
            Some(wanted) => wanted == subject,
        }
    }
}

/// A paper together with whatever key could be recovered for it.
#[derive(Debug, Clone)]
pub struct GradedPaper {
    pub paper: PaperHistoryEntry,
    pub corrects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAccuracy {
    pub subject: String,
    pub chapter: String,
    pub attempted: usize,
    pub correct_pct: u32,
    pub wrong_pct: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub subjects: Vec<String>,
    pub papers: usize,
    pub attempted: usize,
    pub correct: usize,
    pub accuracy: u32,
    pub avg_time_secs: u64,
    pub chapters: Vec<ChapterAccuracy>,
    /// Attempts in each of the most recent papers, newest first.
    pub daily: Vec<usize>,
    /// `daily` summed in bins of seven.
    pub weekly: Vec<usize>,
}

fn subject_of(paper: &PaperHistoryEntry) -> String {
    if paper.subject.trim().is_empty() {
        "Unknown".to_string()
    } else {
        paper.subject.clone()
    }
}

fn chapter_of(paper: &PaperHistoryEntry) -> String {
    if paper.chapter.trim().is_empty() {
        "Unknown".to_string()
    } else {
        paper.chapter.clone()
    }
}

fn age_in_days(paper: &PaperHistoryEntry, now: DateTime<Utc>) -> Option<i64> {
    paper
        .submitted_at()
        .map(|submitted| (now - submitted).num_days())
}

/// Aggregates `papers` (storage order, oldest first) under `filter`.
pub fn summarize(papers: &[GradedPaper], filter: &DashboardFilter, now: DateTime<Utc>) -> DashboardStats {
    let mut subjects: Vec<String> = Vec::new();
    for graded in papers {
        let subject = subject_of(&graded.paper);
        if !subjects.contains(&subject) {
            subjects.push(subject);
        }
    }

    let selected: Vec<&GradedPaper> = papers
        .iter()
        .filter(|graded| filter.admits_subject(&subject_of(&graded.paper)))
        .filter(|graded| match filter.window.max_age_days() {
            None => true,
            Some(max_age) => matches!(age_in_days(&graded.paper, now), Some(age) if age <= max_age),
        })
        .collect();

    let mut attempted = 0;
    let mut correct = 0;
    let mut total_time: u64 = 0;
    // (subject, chapter, attempted, correct) in first-seen order.
    let mut chapters: Vec<(String, String, usize, usize)> = Vec::new();

    for graded in &selected {
        let subject = subject_of(&graded.paper);
        let chapter = chapter_of(&graded.paper);
        let position = match chapters
            .iter()
            .position(|(s, c, _, _)| *s == subject && *c == chapter)
        {
            Some(position) => position,
            None => {
                chapters.push((subject, chapter, 0, 0));
                chapters.len() - 1
            }
        };

        for (index, answer) in graded.paper.answers.iter().enumerate() {
            if answer.is_empty() {
                continue;
            }
            attempted += 1;
            total_time += graded.paper.timestamps.get(index).copied().unwrap_or(0);
            chapters[position].2 += 1;
            if graded.corrects.get(index) == Some(answer) {
                correct += 1;
                chapters[position].3 += 1;
            }
        }
    }

    let chapters: Vec<ChapterAccuracy> = chapters
        .into_iter()
        .filter(|(_, _, total, _)| *total > 0)
        .take(TOP_CHAPTERS)
        .map(|(subject, chapter, total, right)| {
            let correct_pct = (right as f64 / total as f64 * 100.0).round() as u32;
            ChapterAccuracy {
                subject,
                chapter,
                attempted: total,
                correct_pct,
                wrong_pct: 100 - correct_pct,
            }
        })
        .collect();

    let mut daily = vec![0; RECENT_PAPERS];
    for (slot, graded) in daily.iter_mut().zip(selected.iter().rev()) {
        *slot = graded.paper.answers.iter().filter(|answer| !answer.is_empty()).count();
    }
    let weekly = daily.chunks(WEEK_BIN).map(|bin| bin.iter().sum()).collect();

    DashboardStats {
        subjects,
        papers: selected.len(),
        attempted,
        correct,
        accuracy: if attempted == 0 {
            0
        } else {
            (correct as f64 / attempted as f64 * 100.0).round() as u32
        },
        avg_time_secs: if attempted == 0 { 0 } else { total_time / attempted as u64 },
        chapters,
        daily,
        weekly,
    }
}
