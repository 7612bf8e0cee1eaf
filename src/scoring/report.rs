use serde::{Deserialize, Serialize};

use super::scheme::{MarkingScheme, ScorePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Correct,
    Wrong,
    Unattempted,
    /// Answered, but no key is known for the question.
    Ungraded,
}

pub fn classify(answer: &str, correct: &str) -> Outcome {
    if answer.is_empty() {
        Outcome::Unattempted
    } else if correct.is_empty() {
        Outcome::Ungraded
    } else if answer == correct {
        Outcome::Correct
    } else {
        Outcome::Wrong
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewFilter {
    #[default]
    All,
    Correct,
    Wrong,
    Unattempted,
}

/// Indices of the questions a review screen shows under `filter`.
pub fn filter_indices(answers: &[String], corrects: &[String], filter: ReviewFilter) -> Vec<usize> {
    answers
        .iter()
        .enumerate()
        .filter(|(index, answer)| {
            let correct = corrects.get(*index).map(String::as_str).unwrap_or("");
            let outcome = classify(answer, correct);
            match filter {
                ReviewFilter::All => true,
                ReviewFilter::Correct => outcome == Outcome::Correct,
                ReviewFilter::Wrong => outcome == Outcome::Wrong,
                ReviewFilter::Unattempted => outcome == Outcome::Unattempted,
            }
        })
        .map(|(index, _)| index)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Badge {
    Excellent,
    GoodJob,
    KeepImproving,
    NeedsPractice,
}

impl Badge {
    pub fn for_accuracy(accuracy: u32) -> Badge {
        match accuracy {
            90.. => Badge::Excellent,
            70..=89 => Badge::GoodJob,
            50..=69 => Badge::KeepImproving,
            _ => Badge::NeedsPractice,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Badge::Excellent => "Excellent!",
            Badge::GoodJob => "Good Job",
            Badge::KeepImproving => "Keep Improving",
            Badge::NeedsPractice => "Needs Practice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
    pub unattempted: usize,
    pub attempted: usize,
    pub scheme: MarkingScheme,
    pub raw_score: f64,
    pub score: f64,
    pub accuracy: u32,
    pub avg_time_secs: u64,
    pub badge: Badge,
}

/// Grades a submitted paper. Missing keys count as ungraded: the answer is
/// attempted but neither correct nor wrong.
pub fn score(
    answers: &[String],
    corrects: &[String],
    timestamps: &[u64],
    scheme: MarkingScheme,
    policy: ScorePolicy,
) -> ScoreReport {
    let mut correct = 0;
    let mut wrong = 0;
    let mut unattempted = 0;

    for (index, answer) in answers.iter().enumerate() {
        let key = corrects.get(index).map(String::as_str).unwrap_or("");
        match classify(answer, key) {
            Outcome::Correct => correct += 1,
            Outcome::Wrong => wrong += 1,
            Outcome::Unattempted => unattempted += 1,
            Outcome::Ungraded => {}
        }
    }

    let attempted = answers.len() - unattempted;
    let raw_score = correct as f64 * scheme.correct + wrong as f64 * scheme.wrong;
    let graded = correct + wrong;
    let accuracy = if graded == 0 {
        0
    } else {
        (correct as f64 / graded as f64 * 100.0).round() as u32
    };
    let total_time: u64 = timestamps.iter().sum();
    let avg_time_secs = if attempted == 0 {
        0
    } else {
        (total_time as f64 / attempted as f64).round() as u64
    };

    ScoreReport {
        total: answers.len(),
        correct,
        wrong,
        unattempted,
        attempted,
        scheme,
        raw_score,
        score: policy.apply(raw_score),
        accuracy,
        avg_time_secs,
        badge: Badge::for_accuracy(accuracy),
    }
}
